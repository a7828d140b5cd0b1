//! Background delivery of queued webhook tasks.
//!
//! A single [`DeliveryWorker`] drains the task queue: it pops a task, sends
//! it, and then acknowledges, requeues or dead-letters it depending on the
//! result. One task is in flight at a time.
//!
//! # Module Structure
//!
//! - [`worker`]: the worker, its per-task state machine and its run loop

#[allow(clippy::module_inception)]
pub mod worker;


pub use worker::{
    DEFAULT_MAX_RETRIES, DeliveryWorker, Iteration, TaskOutcome, WorkerConfig, WorkerError,
};

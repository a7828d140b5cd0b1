//! Request-path logic: checking a location and handing matches off to the
//! delivery pipeline.
//!
//! ```text
//! check_location ──► TaskDispatcher::submit ──(bounded channel)──► enqueue loop ──► TaskStore
//! ```
//!
//! The request never waits on the queue. When the channel is full the task is
//! dropped and logged.

pub mod dispatch;
pub mod location;

pub use dispatch::{
    DEFAULT_DISPATCH_BUFFER, ENQUEUE_TIMEOUT, Submission, TaskDispatcher, spawn_enqueue_loop,
};
pub use location::{LocationError, LocationService};

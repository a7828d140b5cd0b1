//! Durable delivery queue.
//!
//! Tasks live as JSON blobs keyed by id, and their ids move through two
//! lists: `pending` (waiting for the worker) and `dead` (given up on). A task
//! being processed is in neither list; there is no in-flight record, so a
//! crash between dequeue and acknowledgement loses that task.

pub mod task_store;

pub use task_store::{
    DEAD_LETTER_LIST, PENDING_LIST, QueueError, QueueStats, TASK_TTL, TaskStore, task_key,
};

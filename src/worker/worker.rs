//! The delivery worker.
//!
//! # Task State Machine
//!
//! ```text
//! dequeue ──► send ──ok──► ack                              (Delivered)
//!               │
//!               └─fail──► retry_count += 1
//!                           ├─ > max_retries ──► dead-letter   (DeadLettered)
//!                           └─ otherwise ──► update + enqueue  (Requeued)
//! ```
//!
//! Failures of the store calls after a send are logged and surface as a
//! faulted iteration; the loop keeps going. A panic while processing one task
//! is caught and logged the same way, and that task is lost.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::queue::{QueueError, TaskStore};
use crate::store::Backend;
use crate::types::DeliveryTask;
use crate::webhook::WebhookSender;

/// Pause after a faulted iteration, so a broken backend is not hammered.
const FAULT_BACKOFF: Duration = Duration::from_millis(500);

/// Default number of queue-level retries before a task is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Where every task is delivered.
    pub webhook_url: String,

    /// A task is dead-lettered once its retry count exceeds this.
    pub max_retries: u32,
}

impl WorkerConfig {
    pub fn new(webhook_url: impl Into<String>, max_retries: u32) -> Self {
        WorkerConfig {
            webhook_url: webhook_url.into(),
            max_retries,
        }
    }
}

/// What happened to one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Sent and acknowledged.
    Delivered,
    /// Send failed; the task is back in the pending list.
    Requeued { retry_count: u32 },
    /// Send failed too often; the task is in the dead-letter list.
    DeadLettered { retry_count: u32 },
}

/// Result of one pass of the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// The shutdown token fired; no task was taken.
    Shutdown,
    /// A task was taken and processed.
    Completed(TaskOutcome),
    /// Dequeue or processing failed, or processing panicked. Already logged.
    Faulted,
}

pub struct DeliveryWorker<B, S> {
    store: TaskStore<B>,
    sender: S,
    config: WorkerConfig,
}

impl<B: Backend, S: WebhookSender> DeliveryWorker<B, S> {
    pub fn new(store: TaskStore<B>, sender: S, config: WorkerConfig) -> Self {
        DeliveryWorker {
            store,
            sender,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Sends one task and records the result in the store.
    #[instrument(skip(self, task), fields(task_id = %task.id, retry_count = task.retry_count))]
    pub async fn process_task(&self, mut task: DeliveryTask) -> Result<TaskOutcome> {
        let send_error = match self.sender.send(&task, &self.config.webhook_url).await {
            Ok(()) => {
                self.store.ack(task.id).await?;
                info!("Task delivered");
                return Ok(TaskOutcome::Delivered);
            }
            Err(e) => e,
        };

        task.retry_count = task.retry_count.saturating_add(1);
        warn!(
            error = %send_error,
            attempt = task.retry_count,
            max_retries = self.config.max_retries,
            "Webhook delivery failed"
        );

        if task.retry_count > self.config.max_retries {
            self.store.move_to_dead_letter(&task).await?;
            return Ok(TaskOutcome::DeadLettered {
                retry_count: task.retry_count,
            });
        }

        if let Err(e) = self.store.update(&task).await {
            error!(error = %e, "Failed to persist retry count; requeueing anyway");
        }
        self.store.enqueue(&task).await?;
        debug!("Task requeued");
        Ok(TaskOutcome::Requeued {
            retry_count: task.retry_count,
        })
    }

    /// Takes one task (waiting for it if necessary) and processes it.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> Iteration {
        if shutdown.is_cancelled() {
            return Iteration::Shutdown;
        }

        let task = match self.store.dequeue(shutdown).await {
            Ok(Some(task)) => task,
            Ok(None) => return Iteration::Shutdown,
            Err(e) => {
                error!(error = %e, "Failed to dequeue task");
                return Iteration::Faulted;
            }
        };

        let task_id = task.id;
        match AssertUnwindSafe(self.process_task(task)).catch_unwind().await {
            Ok(Ok(outcome)) => Iteration::Completed(outcome),
            Ok(Err(e)) => {
                error!(task_id = %task_id, error = %e, "Failed to process task");
                Iteration::Faulted
            }
            Err(panic) => {
                error!(
                    task_id = %task_id,
                    panic = panic_message(panic.as_ref()),
                    "Panic while processing task; task dropped"
                );
                Iteration::Faulted
            }
        }
    }

    /// Processes tasks until `shutdown` fires.
    ///
    /// An empty queue never delays shutdown: the blocking dequeue observes
    /// the same token.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(max_retries = self.config.max_retries, "Delivery worker started");

        loop {
            match self.run_once(&shutdown).await {
                Iteration::Shutdown => break,
                Iteration::Completed(_) => {}
                Iteration::Faulted => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(FAULT_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Delivery worker stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "<non-string panic payload>");
    }

    #[test]
    fn config_new() {
        let config = WorkerConfig::new("http://example.test/hook", DEFAULT_MAX_RETRIES);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.webhook_url, "http://example.test/hook");
    }
}

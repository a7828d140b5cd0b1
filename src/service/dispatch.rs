//! Hand-off between request handlers and the task store.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::queue::TaskStore;
use crate::store::Backend;
use crate::types::DeliveryTask;

/// Default capacity of the dispatch channel.
pub const DEFAULT_DISPATCH_BUFFER: usize = 1024;

/// Deadline for a single enqueue.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// What became of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// The channel was full; the task was dropped.
    DroppedFull,
    /// The enqueue loop has stopped; the task was dropped.
    DroppedClosed,
}

/// Sending half of the dispatch channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    tx: mpsc::Sender<DeliveryTask>,
}

impl TaskDispatcher {
    /// Creates a dispatcher and the receiver to pass to [`spawn_enqueue_loop`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeliveryTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (TaskDispatcher { tx }, rx)
    }

    /// Queues a task for enqueueing without waiting.
    pub fn submit(&self, task: DeliveryTask) -> Submission {
        match self.tx.try_send(task) {
            Ok(()) => Submission::Accepted,
            Err(TrySendError::Full(task)) => {
                warn!(
                    task_id = %task.id,
                    incident_id = %task.incident_id,
                    "Dispatch buffer full, delivery task dropped"
                );
                Submission::DroppedFull
            }
            Err(TrySendError::Closed(task)) => {
                error!(
                    task_id = %task.id,
                    incident_id = %task.incident_id,
                    "Enqueue loop stopped, delivery task dropped"
                );
                Submission::DroppedClosed
            }
        }
    }
}

/// Spawns the loop that moves submitted tasks into the store.
///
/// On shutdown the channel is closed and whatever is already buffered is
/// still enqueued before the task exits.
pub fn spawn_enqueue_loop<B: Backend>(
    store: TaskStore<B>,
    rx: mpsc::Receiver<DeliveryTask>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(enqueue_loop(store, rx, shutdown))
}

#[instrument(skip_all)]
async fn enqueue_loop<B: Backend>(
    store: TaskStore<B>,
    mut rx: mpsc::Receiver<DeliveryTask>,
    shutdown: CancellationToken,
) {
    info!("Enqueue loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Some(task) => enqueue_one(&store, task).await,
                None => {
                    info!("Dispatch channel closed, enqueue loop stopped");
                    return;
                }
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(task) = rx.recv().await {
        enqueue_one(&store, task).await;
        drained += 1;
    }
    info!(drained, "Enqueue loop stopped");
}

async fn enqueue_one<B: Backend>(store: &TaskStore<B>, task: DeliveryTask) {
    match tokio::time::timeout(ENQUEUE_TIMEOUT, store.enqueue(&task)).await {
        Ok(Ok(())) => debug!(task_id = %task.id, "Delivery task stored"),
        Ok(Err(e)) => error!(task_id = %task.id, error = %e, "Failed to enqueue delivery task"),
        Err(_) => error!(task_id = %task.id, "Timed out enqueueing delivery task"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use crate::types::ZoneId;

    fn task() -> DeliveryTask {
        DeliveryTask::new("Flood", "user-1", ZoneId::generate())
    }

    async fn wait_for_pending(store: &TaskStore<MemoryBackend>, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.pending_ids().await.unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tasks did not reach the store");
    }

    #[tokio::test]
    async fn submitted_tasks_reach_the_store() {
        let store = TaskStore::new(MemoryBackend::new());
        let (dispatcher, rx) = TaskDispatcher::channel(8);
        let shutdown = CancellationToken::new();
        let handle = spawn_enqueue_loop(store.clone(), rx, shutdown.clone());

        let t = task();
        assert_eq!(dispatcher.submit(t.clone()), Submission::Accepted);
        wait_for_pending(&store, 1).await;
        assert_eq!(store.load(t.id).await.unwrap(), Some(t));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_channel_drops_task() {
        let (dispatcher, _rx) = TaskDispatcher::channel(1);
        assert_eq!(dispatcher.submit(task()), Submission::Accepted);
        assert_eq!(dispatcher.submit(task()), Submission::DroppedFull);
    }

    #[tokio::test]
    async fn closed_channel_drops_task() {
        let (dispatcher, rx) = TaskDispatcher::channel(4);
        drop(rx);
        assert_eq!(dispatcher.submit(task()), Submission::DroppedClosed);
    }

    #[tokio::test]
    async fn shutdown_drains_buffered_tasks() {
        let store = TaskStore::new(MemoryBackend::new());
        let (dispatcher, rx) = TaskDispatcher::channel(8);
        for _ in 0..3 {
            dispatcher.submit(task());
        }

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        spawn_enqueue_loop(store.clone(), rx, shutdown).await.unwrap();

        assert_eq!(store.pending_ids().await.unwrap().len(), 3);
        assert_eq!(dispatcher.submit(task()), Submission::DroppedClosed);
    }

    #[tokio::test]
    async fn submissions_during_drain_are_kept_until_loop_stops() {
        let store = TaskStore::new(MemoryBackend::new());
        let (dispatcher, rx) = TaskDispatcher::channel(8);
        let worker_shutdown = CancellationToken::new();
        let enqueue_shutdown = CancellationToken::new();
        let handle = spawn_enqueue_loop(store.clone(), rx, enqueue_shutdown.clone());

        // The worker stops first; requests still in flight keep submitting.
        worker_shutdown.cancel();
        assert_eq!(dispatcher.submit(task()), Submission::Accepted);
        assert_eq!(dispatcher.submit(task()), Submission::Accepted);

        enqueue_shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(store.pending_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn store_failure_is_logged_and_loop_continues() {
        let backend = MemoryBackend::new();
        let store = TaskStore::new(backend.clone());
        let (dispatcher, rx) = TaskDispatcher::channel(8);
        let shutdown = CancellationToken::new();
        let handle = spawn_enqueue_loop(store.clone(), rx, shutdown.clone());

        backend.fail_writes(true);
        dispatcher.submit(task());
        tokio::time::sleep(Duration::from_millis(50)).await;
        backend.fail_writes(false);

        dispatcher.submit(task());
        wait_for_pending(&store, 1).await;

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(store.pending_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn loop_exits_when_all_dispatchers_drop() {
        let store = TaskStore::new(MemoryBackend::new());
        let (dispatcher, rx) = TaskDispatcher::channel(8);
        let handle = spawn_enqueue_loop(store, rx, CancellationToken::new());

        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not exit")
            .unwrap();
    }
}

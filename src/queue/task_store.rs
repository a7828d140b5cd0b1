//! The task store: blob and list bookkeeping over a [`Backend`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::store::{Backend, Batch, StoreError};
use crate::types::{DeliveryTask, TaskId};

/// List of task ids waiting for delivery. New ids go on the front; the worker
/// pops from the back.
pub const PENDING_LIST: &str = "webhook:pending";

/// List of task ids that exhausted their retries.
pub const DEAD_LETTER_LIST: &str = "webhook:queue:dead";

/// Lifetime of a live task blob. Refreshed on every rewrite.
pub const TASK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const TASK_KEY_PREFIX: &str = "webhook:task:";

/// Storage key of a task blob.
pub fn task_key(id: TaskId) -> String {
    key_for_raw_id(&id.to_string())
}

/// Storage key for an id as it appears in a list.
fn key_for_raw_id(id: &str) -> String {
    format!("{TASK_KEY_PREFIX}{id}")
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to encode task {id}: {source}")]
    Encode {
        id: TaskId,
        #[source]
        source: serde_json::Error,
    },

    /// The id was popped but its blob is gone (expired or deleted).
    #[error("task {id} was dequeued but its record is missing")]
    MissingTask { id: String },

    /// The id was popped but its blob does not decode.
    #[error("task {id} was dequeued but its record is corrupt: {source}")]
    CorruptTask {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Queue depth, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub dead: usize,
}

/// Durable FIFO of [`DeliveryTask`]s with a dead-letter list.
#[derive(Debug, Clone)]
pub struct TaskStore<B> {
    backend: B,
}

impl<B: Backend> TaskStore<B> {
    pub fn new(backend: B) -> Self {
        TaskStore { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn encode(task: &DeliveryTask) -> Result<String> {
        serde_json::to_string(task).map_err(|source| QueueError::Encode {
            id: task.id,
            source,
        })
    }

    /// Stores the task blob with a fresh TTL and appends its id to the
    /// pending list, in one batch.
    ///
    /// Used both for new tasks and for retries; a retried task joins the same
    /// end of the list as new work.
    #[instrument(skip(self, task), fields(task_id = %task.id, retry_count = task.retry_count))]
    pub async fn enqueue(&self, task: &DeliveryTask) -> Result<()> {
        let blob = Self::encode(task)?;
        let batch = Batch::new()
            .set(task_key(task.id), blob, Some(TASK_TTL))
            .push_front(PENDING_LIST, task.id.to_string());
        self.backend.execute(batch).await?;
        debug!("Task enqueued");
        Ok(())
    }

    /// Waits for the next pending task.
    ///
    /// Returns `Ok(None)` when `cancel` fires. Once an id has been popped it
    /// is no longer pending: if its blob is missing or corrupt the task is
    /// gone and the error says which.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<DeliveryTask>> {
        let Some(id) = self.backend.pop_back_blocking(PENDING_LIST, cancel).await? else {
            return Ok(None);
        };

        let blob = self
            .backend
            .get(&key_for_raw_id(&id))
            .await?
            .ok_or_else(|| QueueError::MissingTask { id: id.clone() })?;

        let task = serde_json::from_str(&blob)
            .map_err(|source| QueueError::CorruptTask { id, source })?;
        Ok(Some(task))
    }

    /// Deletes the task blob. Acknowledging an unknown id is not an error.
    #[instrument(skip(self, id), fields(task_id = %id))]
    pub async fn ack(&self, id: TaskId) -> Result<()> {
        if !self.backend.delete(&task_key(id)).await? {
            debug!("Acknowledged task had no record");
        }
        Ok(())
    }

    /// Rewrites the task blob with a fresh TTL. Does not touch any list.
    pub async fn update(&self, task: &DeliveryTask) -> Result<()> {
        let blob = Self::encode(task)?;
        self.backend
            .set(&task_key(task.id), &blob, Some(TASK_TTL))
            .await?;
        Ok(())
    }

    /// Parks the task in the dead-letter list.
    ///
    /// The blob is rewritten without a TTL so it keeps the final retry count
    /// and stays around for manual inspection.
    #[instrument(skip(self, task), fields(task_id = %task.id, retry_count = task.retry_count))]
    pub async fn move_to_dead_letter(&self, task: &DeliveryTask) -> Result<()> {
        let blob = Self::encode(task)?;
        let batch = Batch::new()
            .set(task_key(task.id), blob, None)
            .push_front(DEAD_LETTER_LIST, task.id.to_string());
        self.backend.execute(batch).await?;
        warn!("Task moved to dead-letter list");
        Ok(())
    }

    /// Reads a task blob without touching any list.
    pub async fn load(&self, id: TaskId) -> Result<Option<DeliveryTask>> {
        let Some(blob) = self.backend.get(&task_key(id)).await? else {
            return Ok(None);
        };
        let task = serde_json::from_str(&blob).map_err(|source| QueueError::CorruptTask {
            id: id.to_string(),
            source,
        })?;
        Ok(Some(task))
    }

    /// Pending ids, newest first.
    pub async fn pending_ids(&self) -> Result<Vec<String>> {
        Ok(self.backend.list_range(PENDING_LIST).await?)
    }

    /// Dead-lettered ids, newest first.
    pub async fn dead_letter_ids(&self) -> Result<Vec<String>> {
        Ok(self.backend.list_range(DEAD_LETTER_LIST).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.backend.list_len(PENDING_LIST).await?,
            dead: self.backend.list_len(DEAD_LETTER_LIST).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyTtl, MemoryBackend};
    use crate::test_utils::arb_delivery_task;
    use crate::types::ZoneId;
    use proptest::prelude::*;

    fn store() -> TaskStore<MemoryBackend> {
        TaskStore::new(MemoryBackend::new())
    }

    fn task(name: &str) -> DeliveryTask {
        DeliveryTask::new(name, "user-1", ZoneId::generate())
    }

    #[test]
    fn listed_ids_map_to_the_same_key() {
        let id = TaskId::generate();
        assert_eq!(key_for_raw_id(&id.to_string()), task_key(id));
        assert_eq!(task_key(id), format!("webhook:task:{id}"));
    }

    // ─── Enqueue / Dequeue ────────────────────────────────────────────────────

    #[tokio::test]
    async fn enqueue_writes_blob_with_ttl_and_pending_id() {
        let store = store();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();

        assert_eq!(store.pending_ids().await.unwrap(), vec![t.id.to_string()]);
        assert_eq!(store.load(t.id).await.unwrap(), Some(t.clone()));
        assert!(matches!(
            store.backend().ttl(&task_key(t.id)).await.unwrap(),
            KeyTtl::Expires(_)
        ));
    }

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let store = store();
        let cancel = CancellationToken::new();
        let first = task("first");
        let second = task("second");
        store.enqueue(&first).await.unwrap();
        store.enqueue(&second).await.unwrap();

        assert_eq!(store.dequeue(&cancel).await.unwrap(), Some(first));
        assert_eq!(store.dequeue(&cancel).await.unwrap(), Some(second));
        assert_eq!(store.stats().await.unwrap().pending, 0);
    }

    #[tokio::test]
    async fn dequeue_removes_id_but_keeps_blob() {
        let store = store();
        let cancel = CancellationToken::new();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();

        store.dequeue(&cancel).await.unwrap();
        assert!(store.pending_ids().await.unwrap().is_empty());
        assert!(store.load(t.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dequeue_on_cancelled_token_returns_none() {
        let store = store();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(store.dequeue(&cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn dequeue_reports_missing_blob() {
        let store = store();
        let cancel = CancellationToken::new();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();
        store.backend().delete(&task_key(t.id)).await.unwrap();

        let err = store.dequeue(&cancel).await.unwrap_err();
        assert!(matches!(err, QueueError::MissingTask { id } if id == t.id.to_string()));
        assert!(store.pending_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dequeue_reports_corrupt_blob() {
        let store = store();
        let cancel = CancellationToken::new();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();
        store
            .backend()
            .set(&task_key(t.id), "{not json", None)
            .await
            .unwrap();

        let err = store.dequeue(&cancel).await.unwrap_err();
        assert!(matches!(err, QueueError::CorruptTask { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_blob_is_missing_on_dequeue() {
        let store = store();
        let cancel = CancellationToken::new();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();

        tokio::time::advance(TASK_TTL + Duration::from_secs(1)).await;
        assert!(matches!(
            store.dequeue(&cancel).await,
            Err(QueueError::MissingTask { .. })
        ));
    }

    // ─── Ack / Update / Dead Letter ───────────────────────────────────────────

    #[tokio::test]
    async fn ack_deletes_blob_and_is_idempotent() {
        let store = store();
        let t = task("Flood");
        store.enqueue(&t).await.unwrap();

        store.ack(t.id).await.unwrap();
        assert_eq!(store.load(t.id).await.unwrap(), None);
        store.ack(t.id).await.unwrap();
    }

    #[tokio::test]
    async fn update_rewrites_blob_without_touching_lists() {
        let store = store();
        let mut t = task("Flood");
        store.enqueue(&t).await.unwrap();

        t.retry_count = 2;
        store.update(&t).await.unwrap();

        assert_eq!(store.load(t.id).await.unwrap().unwrap().retry_count, 2);
        assert_eq!(store.pending_ids().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dead_letter_persists_blob_without_expiry() {
        let store = store();
        let mut t = task("Flood");
        store.enqueue(&t).await.unwrap();

        t.retry_count = 6;
        store.move_to_dead_letter(&t).await.unwrap();

        assert_eq!(store.dead_letter_ids().await.unwrap(), vec![t.id.to_string()]);
        assert_eq!(
            store.backend().ttl(&task_key(t.id)).await.unwrap(),
            KeyTtl::Persistent
        );
        assert_eq!(store.load(t.id).await.unwrap().unwrap().retry_count, 6);
        assert_eq!(store.stats().await.unwrap(), QueueStats { pending: 1, dead: 1 });
    }

    #[tokio::test]
    async fn enqueue_failure_leaves_nothing_behind() {
        let store = store();
        store.backend().fail_writes(true);
        let t = task("Flood");
        assert!(matches!(store.enqueue(&t).await, Err(QueueError::Store(_))));

        store.backend().fail_writes(false);
        assert!(store.pending_ids().await.unwrap().is_empty());
        assert_eq!(store.load(t.id).await.unwrap(), None);
    }

    proptest! {
        #[test]
        fn tasks_survive_a_trip_through_the_queue(t in arb_delivery_task()) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let out = rt.block_on(async {
                let store = store();
                store.enqueue(&t).await.unwrap();
                store.dequeue(&CancellationToken::new()).await.unwrap()
            });
            prop_assert_eq!(out, Some(t));
        }
    }
}

//! Key-value and list storage shared by the zone cache and the task store.
//!
//! The [`Backend`] trait covers the handful of Redis-shaped operations the
//! service needs: string keys with optional expiry, lists pushed at the front
//! and popped from the back, and batches that apply several writes in one
//! round trip. [`MemoryBackend`] is the default; [`RedisBackend`] is available
//! with the `redis` feature.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend refused or could not serve the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the given duration.
    Expires(Duration),
}

/// One write inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Overwrite `key`. `ttl: None` stores it without expiry, clearing any
    /// expiry it had.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    /// Push `value` onto the front of `list`.
    PushFront { list: String, value: String },
}

/// An ordered group of writes applied together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        });
        self
    }

    pub fn push_front(mut self, list: impl Into<String>, value: impl Into<String>) -> Self {
        self.commands.push(Command::PushFront {
            list: list.into(),
            value: value.into(),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// Storage operations used by the cache and the task queue.
///
/// Implementations are cheap to clone and share one underlying connection
/// pool or map.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Reads a string key. Expired keys read as `None`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Writes a string key, replacing its value and expiry.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Deletes a key. Returns whether it existed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Reports the remaining lifetime of a key.
    fn ttl(&self, key: &str) -> impl Future<Output = Result<KeyTtl>> + Send;

    /// Returns the whole list, front first.
    fn list_range(&self, list: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Returns the length of a list; a missing list is empty.
    fn list_len(&self, list: &str) -> impl Future<Output = Result<usize>> + Send;

    /// Pops from the back of `list`, waiting until an element is available.
    ///
    /// Returns `Ok(None)` once `cancel` fires. An element is never lost to
    /// cancellation: either it is returned or it stays in the list.
    fn pop_back_blocking(
        &self,
        list: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Applies every command in the batch, in order, as one unit.
    fn execute(&self, batch: Batch) -> impl Future<Output = Result<()>> + Send;

    /// Checks that the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_command_order() {
        let batch = Batch::new()
            .set("k", "v", Some(Duration::from_secs(5)))
            .push_front("list", "k");

        assert_eq!(
            batch.commands(),
            &[
                Command::Set {
                    key: "k".into(),
                    value: "v".into(),
                    ttl: Some(Duration::from_secs(5)),
                },
                Command::PushFront {
                    list: "list".into(),
                    value: "k".into(),
                },
            ]
        );
    }

    #[test]
    fn empty_batch() {
        assert!(Batch::new().is_empty());
    }
}

//! In-process backend.
//!
//! All state lives behind one async mutex, so a [`Batch`] is applied
//! atomically with respect to every other operation. Expiry is lazy: an
//! expired key is dropped the next time anything touches it. Blocked pops
//! are woken through a [`Notify`] whenever a list grows.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::{Backend, Batch, Command, KeyTtl, Result, StoreError};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<String>>,
}

impl State {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.keys.get(key).is_some_and(|e| e.is_expired(now)) {
            self.keys.remove(key);
        }
        self.keys.get(key)
    }

    fn set(&mut self, key: String, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.keys.insert(key, Entry { value, expires_at });
    }

    fn push_front(&mut self, list: String, value: String) {
        self.lists.entry(list).or_default().push_front(value);
    }

    fn pop_back(&mut self, list: &str) -> Option<String> {
        let items = self.lists.get_mut(list)?;
        let value = items.pop_back();
        if items.is_empty() {
            self.lists.remove(list);
        }
        value
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    list_grew: Notify,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// A [`Backend`] kept entirely in memory.
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read operation (including pops and pings) fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write operation fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_read()?;
        let mut state = self.inner.state.lock().await;
        Ok(state.live(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.check_write()?;
        let mut state = self.inner.state.lock().await;
        state.set(key.to_string(), value.to_string(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check_write()?;
        let mut state = self.inner.state.lock().await;
        let existed = state.live(key).is_some();
        state.keys.remove(key);
        Ok(existed)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.check_read()?;
        let mut state = self.inner.state.lock().await;
        Ok(match state.live(key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(Instant::now())),
        })
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        self.check_read()?;
        let state = self.inner.state.lock().await;
        Ok(state
            .lists
            .get(list)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_len(&self, list: &str) -> Result<usize> {
        self.check_read()?;
        let state = self.inner.state.lock().await;
        Ok(state.lists.get(list).map_or(0, VecDeque::len))
    }

    async fn pop_back_blocking(
        &self,
        list: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        loop {
            self.check_read()?;

            // Register interest before looking, so a push between the check
            // and the wait still wakes us.
            let notified = self.inner.list_grew.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.inner.state.lock().await.pop_back(list) {
                return Ok(Some(value));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(list, "Blocking pop cancelled");
                    return Ok(None);
                }
                _ = &mut notified => {}
            }
        }
    }

    async fn execute(&self, batch: Batch) -> Result<()> {
        self.check_write()?;
        let mut pushed = false;
        {
            let mut state = self.inner.state.lock().await;
            for command in batch.into_commands() {
                match command {
                    Command::Set { key, value, ttl } => state.set(key, value, ttl),
                    Command::PushFront { list, value } => {
                        state.push_front(list, value);
                        pushed = true;
                    }
                }
            }
        }
        if pushed {
            self.inner.list_grew.notify_waiters();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_read()
    }
}

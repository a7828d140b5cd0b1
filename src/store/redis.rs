//! Redis backend.
//!
//! Commands go through a [`ConnectionManager`], which reconnects on its own.
//! Blocking pops use a second manager so a parked `BRPOP` never delays other
//! traffic, and poll with a short server-side timeout so cancellation is
//! noticed between polls.

use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{Client, Pipeline};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Backend, Batch, Command, KeyTtl, Result};

/// How long one `BRPOP` waits server-side before the token is re-checked.
const POP_POLL_SECS: f64 = 1.0;

/// Client-side response deadline on the blocking connection. Must outlast a
/// full `BRPOP` poll.
const BLOCKING_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisBackend {
    commands: ConnectionManager,
    blocking: ConnectionManager,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connects to the server at `url` (for example `redis://localhost:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let commands = ConnectionManager::new(client.clone()).await?;
        let blocking = ConnectionManager::new_with_config(
            client,
            ConnectionManagerConfig::new().set_response_timeout(BLOCKING_RESPONSE_TIMEOUT),
        )
        .await?;
        info!("Connected to Redis");
        Ok(RedisBackend { commands, blocking })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // SET PX rejects zero.
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn build_pipeline(batch: Batch) -> Pipeline {
    let mut pipe = ::redis::pipe();
    pipe.atomic();
    for command in batch.into_commands() {
        match command {
            Command::Set {
                key,
                value,
                ttl: Some(ttl),
            } => {
                pipe.cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .ignore();
            }
            Command::Set {
                key,
                value,
                ttl: None,
            } => {
                pipe.cmd("SET").arg(key).arg(value).ignore();
            }
            Command::PushFront { list, value } => {
                pipe.cmd("LPUSH").arg(list).arg(value).ignore();
            }
        }
    }
    pipe
}

impl Backend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.commands.clone();
        let value: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.commands.clone();
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.commands.clone();
        let removed: i64 = ::redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.commands.clone();
        let millis: i64 = ::redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(match millis {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::Expires(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let mut conn = self.commands.clone();
        let items: Vec<String> = ::redis::cmd("LRANGE")
            .arg(list)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn list_len(&self, list: &str) -> Result<usize> {
        let mut conn = self.commands.clone();
        let len: usize = ::redis::cmd("LLEN").arg(list).query_async(&mut conn).await?;
        Ok(len)
    }

    async fn pop_back_blocking(
        &self,
        list: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let mut conn = self.blocking.clone();
        // Cancellation never abandons a pop mid-flight: dropping a BRPOP
        // future after the server has popped would lose the element.
        while !cancel.is_cancelled() {
            let popped: Option<(String, String)> = ::redis::cmd("BRPOP")
                .arg(list)
                .arg(POP_POLL_SECS)
                .query_async(&mut conn)
                .await?;
            if let Some((_, value)) = popped {
                return Ok(Some(value));
            }
        }
        debug!(list, "Blocking pop cancelled");
        Ok(None)
    }

    async fn execute(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.commands.clone();
        let _: () = build_pipeline(batch).query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.commands.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

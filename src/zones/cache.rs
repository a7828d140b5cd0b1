//! Read-through cache of the active zone list.
//!
//! The whole list lives under one key with a short TTL. Any trouble with the
//! cache (miss, backend error, undecodable payload) falls back to the
//! repository; only a repository failure is reported to the caller.
//! Concurrent misses may each reload and rewrite the entry.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::repository::{RepositoryError, ZoneRepository};
use crate::store::Backend;
use crate::types::HazardZone;

/// Cache key holding the JSON-encoded active zone list.
pub const ACTIVE_ZONES_KEY: &str = "incidents:active";

pub const ACTIVE_ZONES_TTL: Duration = Duration::from_secs(60);

/// Upper bound on zones loaded into the cache.
const ACTIVE_ZONES_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ZoneCacheError {
    #[error("failed to load zones: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, ZoneCacheError>;

pub struct ZoneCache<B, R> {
    backend: B,
    repository: R,
}

impl<B: Backend, R: ZoneRepository> ZoneCache<B, R> {
    pub fn new(backend: B, repository: R) -> Self {
        ZoneCache {
            backend,
            repository,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the active zones, from the cache when possible.
    pub async fn active_zones(&self) -> Result<Vec<HazardZone>> {
        match self.backend.get(ACTIVE_ZONES_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<HazardZone>>(&raw) {
                Ok(zones) => {
                    debug!(count = zones.len(), "Zone cache hit");
                    return Ok(zones);
                }
                Err(e) => warn!(error = %e, "Cached zone list is undecodable, reloading"),
            },
            Ok(None) => debug!("Zone cache miss"),
            Err(e) => warn!(error = %e, "Zone cache read failed, loading from repository"),
        }

        let zones = self.repository.find_all(ACTIVE_ZONES_LIMIT, 0).await?;
        self.store(&zones).await;
        Ok(zones)
    }

    async fn store(&self, zones: &[HazardZone]) {
        let raw = match serde_json::to_string(zones) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to encode zone list for cache");
                return;
            }
        };
        if let Err(e) = self
            .backend
            .set(ACTIVE_ZONES_KEY, &raw, Some(ACTIVE_ZONES_TTL))
            .await
        {
            warn!(error = %e, "Failed to write zone cache");
        }
    }

    /// Drops the cached list so the next read reloads it.
    pub async fn invalidate(&self) {
        match self.backend.delete(ACTIVE_ZONES_KEY).await {
            Ok(_) => debug!("Zone cache invalidated"),
            Err(e) => warn!(error = %e, "Failed to invalidate zone cache"),
        }
    }
}

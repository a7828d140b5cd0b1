//! Zone persistence and the location-check log.
//!
//! Both are traits so the service can run against a database or, as here by
//! default, an in-process store.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::types::{HazardZone, LocationCheck, ZoneId, ZoneStats, ZoneUpdate};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("zone not found: {0}")]
    NotFound(ZoneId),

    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Durable storage of hazard zones.
pub trait ZoneRepository: Send + Sync + 'static {
    /// Active zones, newest first, paginated.
    fn find_all(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<HazardZone>>> + Send;

    /// Any zone by id, active or not.
    fn find_by_id(&self, id: ZoneId) -> impl Future<Output = Result<HazardZone>> + Send;

    fn create(&self, zone: HazardZone) -> impl Future<Output = Result<HazardZone>> + Send;

    fn update(
        &self,
        id: ZoneId,
        update: ZoneUpdate,
    ) -> impl Future<Output = Result<HazardZone>> + Send;

    /// Deactivates the zone. It stays readable by id.
    fn delete(&self, id: ZoneId) -> impl Future<Output = Result<HazardZone>> + Send;

    /// Distinct users found inside each active zone during the last
    /// `window`, busiest first. Zones with no users are omitted.
    fn stats(&self, window: Duration) -> impl Future<Output = Result<Vec<ZoneStats>>> + Send;

    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Append-only log of location checks.
pub trait LocationCheckSink: Send + Sync + 'static {
    fn record(&self, check: LocationCheck) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct Tables {
    /// Insertion order, oldest first.
    zones: Vec<HazardZone>,
    checks: Vec<LocationCheck>,
}

impl Tables {
    fn zone_mut(&mut self, id: ZoneId) -> Result<&mut HazardZone> {
        self.zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or(RepositoryError::NotFound(id))
    }
}

/// In-process [`ZoneRepository`] and [`LocationCheckSink`].
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneRepository {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryZoneRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository with existing zones, kept in the given order.
    pub fn with_zones(zones: impl IntoIterator<Item = HazardZone>) -> Self {
        MemoryZoneRepository {
            tables: Arc::new(RwLock::new(Tables {
                zones: zones.into_iter().collect(),
                checks: Vec::new(),
            })),
            unavailable: Arc::default(),
        }
    }

    /// Makes every operation fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every recorded check, oldest first.
    pub async fn checks(&self) -> Vec<LocationCheck> {
        self.tables.read().await.checks.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "repository disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl ZoneRepository for MemoryZoneRepository {
    async fn find_all(&self, limit: usize, offset: usize) -> Result<Vec<HazardZone>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .zones
            .iter()
            .rev()
            .filter(|z| z.is_active)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ZoneId) -> Result<HazardZone> {
        self.check_available()?;
        let tables = self.tables.read().await;
        tables
            .zones
            .iter()
            .find(|z| z.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn create(&self, zone: HazardZone) -> Result<HazardZone> {
        self.check_available()?;
        self.tables.write().await.zones.push(zone.clone());
        info!(zone_id = %zone.id, name = %zone.name, "Zone created");
        Ok(zone)
    }

    async fn update(&self, id: ZoneId, update: ZoneUpdate) -> Result<HazardZone> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let zone = tables.zone_mut(id)?;
        update.apply(zone);
        Ok(zone.clone())
    }

    async fn delete(&self, id: ZoneId) -> Result<HazardZone> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let zone = tables.zone_mut(id)?;
        zone.is_active = false;
        zone.updated_at = Utc::now();
        info!(zone_id = %id, "Zone deactivated");
        Ok(zone.clone())
    }

    async fn stats(&self, window: Duration) -> Result<Vec<ZoneStats>> {
        self.check_available()?;
        let since = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let tables = self.tables.read().await;

        let mut stats: Vec<ZoneStats> = tables
            .zones
            .iter()
            .filter(|z| z.is_active)
            .filter_map(|zone| {
                let users: HashSet<&str> = tables
                    .checks
                    .iter()
                    .filter(|c| c.is_danger && c.zone_id == Some(zone.id) && c.created_at > since)
                    .map(|c| c.user_id.as_str())
                    .collect();
                (!users.is_empty()).then(|| ZoneStats {
                    incident_id: zone.id,
                    name: zone.name.clone(),
                    user_count: users.len(),
                })
            })
            .collect();
        stats.sort_by(|a, b| b.user_count.cmp(&a.user_count));
        Ok(stats)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

impl LocationCheckSink for MemoryZoneRepository {
    async fn record(&self, check: LocationCheck) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.checks.push(check);
        Ok(())
    }
}

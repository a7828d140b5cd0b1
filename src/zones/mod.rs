//! Hazard zone storage and the cached view the location check reads.

pub mod cache;
pub mod repository;

pub use cache::{ACTIVE_ZONES_KEY, ACTIVE_ZONES_TTL, ZoneCache, ZoneCacheError};
pub use repository::{
    LocationCheckSink, MemoryZoneRepository, RepositoryError, ZoneRepository,
};

//! The location check.

use thiserror::Error;
use tracing::{debug, info, instrument};

use super::dispatch::TaskDispatcher;
use crate::geofence::{GeometryError, match_zones, validate_location};
use crate::store::Backend;
use crate::types::{CheckLocationRequest, CheckLocationResponse, DeliveryTask, LocationCheck};
use crate::zones::{LocationCheckSink, RepositoryError, ZoneCache, ZoneCacheError, ZoneRepository};

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid location: {0}")]
    InvalidLocation(#[from] GeometryError),

    #[error(transparent)]
    Zones(#[from] ZoneCacheError),

    #[error("failed to record location check: {0}")]
    Record(#[source] RepositoryError),
}

pub type Result<T> = std::result::Result<T, LocationError>;

/// Answers "is this user in danger?" and triggers a webhook when they are.
pub struct LocationService<B, R> {
    zones: ZoneCache<B, R>,
    dispatcher: TaskDispatcher,
}

impl<B, R> LocationService<B, R>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    pub fn new(zones: ZoneCache<B, R>, dispatcher: TaskDispatcher) -> Self {
        LocationService { zones, dispatcher }
    }

    pub fn zones(&self) -> &ZoneCache<B, R> {
        &self.zones
    }

    /// Validates the location, matches it against the active zones, records
    /// the check and, on a match, submits a delivery task for the primary
    /// zone.
    ///
    /// The response does not depend on whether the task is delivered, or
    /// even accepted by the dispatcher.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn check_location(
        &self,
        request: CheckLocationRequest,
    ) -> Result<CheckLocationResponse> {
        let location = request.user_location;
        validate_location(&location)?;

        let zones = self.zones.active_zones().await?;
        debug!(zones = zones.len(), "Matching location");
        let matches = match_zones(location, &zones);
        let primary = matches.first();

        let check = LocationCheck::new(&*request.user_id, location, primary.map(|z| z.id));
        self.zones
            .repository()
            .record(check)
            .await
            .map_err(LocationError::Record)?;

        if let Some(zone) = primary {
            info!(incident_id = %zone.id, matched = matches.len(), "User is inside a hazard zone");
            let task = DeliveryTask::new(zone.name.clone(), request.user_id, zone.id);
            self.dispatcher.submit(task);
        }

        Ok(CheckLocationResponse {
            is_danger: !matches.is_empty(),
            incidents: matches,
        })
    }
}

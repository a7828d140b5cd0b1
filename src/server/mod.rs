//! HTTP server for the hazard zone service.
//!
//! # Endpoints
//!
//! - `POST /api/v1/location/check` - Checks a user location against the active zones
//! - `GET /api/v1/system/health` - Pings the backend and the repository
//! - `GET /api/v1/system/queue` - Queue depth and dead-lettered task ids
//! - `POST|GET /api/v1/incidents` - Creates or lists incidents
//! - `GET /api/v1/incidents/stats` - Distinct users per zone within the stats window
//! - `GET|PUT|DELETE /api/v1/incidents/{id}` - Reads, updates or deactivates one incident
//!
//! Everything except the location check requires the `X-API-Key` header.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::queue::TaskStore;
use crate::service::LocationService;
use crate::store::Backend;
use crate::zones::{LocationCheckSink, ZoneCache, ZoneRepository};

pub mod auth;
pub mod error;
pub mod health;
pub mod incidents;
pub mod location;
pub mod queue;

pub use auth::{API_KEY_HEADER, require_api_key};
pub use error::{ApiError, ErrorBody};
pub use health::{HealthResponse, health_handler};
pub use incidents::{StatsResponse, ZoneListResponse};
pub use location::check_location_handler;
pub use queue::{QueueResponse, queue_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<B, R> {
    inner: Arc<AppStateInner<B, R>>,
}

struct AppStateInner<B, R> {
    location: LocationService<B, R>,

    /// Same backend as the zone cache; used for queue inspection and health.
    tasks: TaskStore<B>,

    api_key: String,

    /// Look-back window for `GET /api/v1/incidents/stats`.
    stats_window: Duration,

    started_at: Instant,
}

impl<B, R> Clone for AppState<B, R> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B, R> AppState<B, R> {
    pub fn new(
        location: LocationService<B, R>,
        tasks: TaskStore<B>,
        api_key: impl Into<String>,
        stats_window: Duration,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                location,
                tasks,
                api_key: api_key.into(),
                stats_window,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn location(&self) -> &LocationService<B, R> {
        &self.inner.location
    }

    pub fn tasks(&self) -> &TaskStore<B> {
        &self.inner.tasks
    }

    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    pub fn stats_window(&self) -> Duration {
        self.inner.stats_window
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }
}

impl<B, R> AppState<B, R>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    pub fn zones(&self) -> &ZoneCache<B, R> {
        self.inner.location.zones()
    }

    pub fn repository(&self) -> &R {
        self.zones().repository()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<B, R>(app_state: AppState<B, R>) -> axum::Router
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let protected = axum::Router::new()
        .route("/api/v1/system/health", get(health_handler::<B, R>))
        .route("/api/v1/system/queue", get(queue_handler::<B, R>))
        .route(
            "/api/v1/incidents",
            post(incidents::create_incident::<B, R>).get(incidents::list_incidents::<B, R>),
        )
        .route(
            "/api/v1/incidents/stats",
            get(incidents::incident_stats::<B, R>),
        )
        .route(
            "/api/v1/incidents/{id}",
            get(incidents::get_incident::<B, R>)
                .put(incidents::update_incident::<B, R>)
                .delete(incidents::delete_incident::<B, R>),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_api_key::<B, R>,
        ));

    axum::Router::new()
        .route(
            "/api/v1/location/check",
            post(check_location_handler::<B, R>),
        )
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

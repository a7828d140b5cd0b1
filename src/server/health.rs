//! Health check endpoint.
//!
//! Pings the storage backend and the zone repository concurrently. Returns
//! 200 when both answer and 503 otherwise, with per-component detail.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;
use crate::store::Backend;
use crate::zones::{LocationCheckSink, ZoneRepository};

/// How long each component gets to answer.
const COMPONENT_TIMEOUT: Duration = Duration::from_secs(5);

const STATUS_OK: &str = "ok";
const STATUS_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub uptime: String,
    pub timestamp: DateTime<Utc>,
}

async fn probe<E: Display>(check: impl Future<Output = Result<(), E>>) -> String {
    match tokio::time::timeout(COMPONENT_TIMEOUT, check).await {
        Ok(Ok(())) => STATUS_OK.to_string(),
        Ok(Err(e)) => format!("{STATUS_ERROR}: {e}"),
        Err(_) => format!("{STATUS_ERROR}: timed out"),
    }
}

/// Formats an uptime as `1h2m3s`, dropping leading zero units.
fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{s}s"),
        (0, _) => format!("{m}m{s}s"),
        _ => format!("{h}h{m}m{s}s"),
    }
}

pub async fn health_handler<B, R>(
    State(state): State<AppState<B, R>>,
) -> (StatusCode, Json<HealthResponse>)
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let (store, repository) = tokio::join!(
        probe(state.tasks().backend().ping()),
        probe(state.repository().ping()),
    );

    let components = BTreeMap::from([
        ("repository".to_string(), repository),
        ("store".to_string(), store),
    ]);
    let healthy = components.values().all(|v| v == STATUS_OK);
    if !healthy {
        warn!(?components, "Health check failed");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if healthy { STATUS_OK } else { STATUS_ERROR }.to_string(),
        components,
        uptime: format_uptime(state.uptime()),
        timestamp: Utc::now(),
    };
    (status, Json(body))
}

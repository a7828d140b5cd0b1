//! `POST /api/v1/location/check`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use super::AppState;
use super::error::ApiError;
use crate::store::Backend;
use crate::types::{CheckLocationRequest, CheckLocationResponse};
use crate::zones::{LocationCheckSink, ZoneRepository};

/// Checks whether the user's location is inside any active hazard zone.
///
/// # Example
///
/// ```ignore
/// POST /api/v1/location/check HTTP/1.1
/// Content-Type: application/json
///
/// {"user_id": "u-1", "user_location": {"lat": 55.5, "lon": 37.5}}
///
/// HTTP/1.1 200 OK
///
/// {"is_danger": true, "incidents": [{"id": "...", "name": "Flood", "description": "..."}]}
/// ```
pub async fn check_location_handler<B, R>(
    State(state): State<AppState<B, R>>,
    payload: Result<Json<CheckLocationRequest>, JsonRejection>,
) -> Result<Json<CheckLocationResponse>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let Json(request) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    if request.user_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("user_id is required".to_string()));
    }

    let response = state.location().check_location(request).await?;
    Ok(Json(response))
}

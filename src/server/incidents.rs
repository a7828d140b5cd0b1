//! Incident (hazard zone) management endpoints.
//!
//! Writes go straight to the repository and then invalidate the zone cache,
//! so location checks see the change without waiting out the cache TTL.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::geofence::validate_polygon;
use crate::store::Backend;
use crate::types::{HazardZone, NewZone, ZoneId, ZoneStats, ZoneUpdate};
use crate::zones::{LocationCheckSink, ZoneRepository};

const DEFAULT_LIMIT: usize = 10;
const MAX_NAME_CHARS: usize = 255;
const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Raw pagination parameters. Unparsable values fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListParams {
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LIMIT)
    }

    fn offset(&self) -> usize {
        self.offset
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneListResponse {
    pub incidents: Vec<HazardZone>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Vec<ZoneStats>,
    pub window_minutes: u64,
}

fn parse_id(raw: &str) -> Result<ZoneId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidInput(format!("invalid incident id: {raw}")))
}

fn check_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "name must be 1 to {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), ApiError> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(())
}

/// `POST /api/v1/incidents`
pub async fn create_incident<B, R>(
    State(state): State<AppState<B, R>>,
    payload: Result<Json<NewZone>, JsonRejection>,
) -> Result<(StatusCode, Json<HazardZone>), ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let Json(new_zone) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    check_name(&new_zone.name)?;
    check_description(&new_zone.description)?;
    validate_polygon(&new_zone.area)?;

    let zone = state.repository().create(new_zone.into_zone()).await?;
    state.zones().invalidate().await;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// `GET /api/v1/incidents?limit=&offset=`: active incidents, newest first.
pub async fn list_incidents<B, R>(
    State(state): State<AppState<B, R>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ZoneListResponse>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let incidents = state
        .repository()
        .find_all(params.limit(), params.offset())
        .await?;
    Ok(Json(ZoneListResponse {
        total: incidents.len(),
        incidents,
    }))
}

/// `GET /api/v1/incidents/{id}`
pub async fn get_incident<B, R>(
    State(state): State<AppState<B, R>>,
    Path(id): Path<String>,
) -> Result<Json<HazardZone>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let id = parse_id(&id)?;
    Ok(Json(state.repository().find_by_id(id).await?))
}

/// `PUT /api/v1/incidents/{id}`: partial update of name, description or area.
pub async fn update_incident<B, R>(
    State(state): State<AppState<B, R>>,
    Path(id): Path<String>,
    payload: Result<Json<ZoneUpdate>, JsonRejection>,
) -> Result<Json<HazardZone>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let id = parse_id(&id)?;
    let Json(update) = payload.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    if let Some(name) = &update.name {
        check_name(name)?;
    }
    if let Some(description) = &update.description {
        check_description(description)?;
    }
    if let Some(area) = &update.area {
        validate_polygon(area)?;
    }

    let zone = state.repository().update(id, update).await?;
    state.zones().invalidate().await;
    Ok(Json(zone))
}

/// `DELETE /api/v1/incidents/{id}`: deactivates the incident.
pub async fn delete_incident<B, R>(
    State(state): State<AppState<B, R>>,
    Path(id): Path<String>,
) -> Result<Json<HazardZone>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let id = parse_id(&id)?;
    let zone = state.repository().delete(id).await?;
    state.zones().invalidate().await;
    Ok(Json(zone))
}

/// `GET /api/v1/incidents/stats`
pub async fn incident_stats<B, R>(
    State(state): State<AppState<B, R>>,
) -> Result<Json<StatsResponse>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let window = state.stats_window();
    let stats = state.repository().stats(window).await?;
    Ok(Json(StatsResponse {
        stats,
        window_minutes: window.as_secs() / 60,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_fall_back_to_defaults() {
        let params = ListParams {
            limit: Some("abc".into()),
            offset: Some("-3".into()),
        };
        assert_eq!(params.limit(), DEFAULT_LIMIT);
        assert_eq!(params.offset(), 0);

        let params = ListParams {
            limit: Some("25".into()),
            offset: Some("5".into()),
        };
        assert_eq!((params.limit(), params.offset()), (25, 5));
        assert_eq!(ListParams::default().limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn name_bounds() {
        assert!(check_name("Flood").is_ok());
        assert!(check_name("   ").is_err());
        assert!(check_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn description_bounds() {
        assert!(check_description("").is_ok());
        assert!(check_description(&"x".repeat(MAX_DESCRIPTION_CHARS + 1)).is_err());
    }

    #[test]
    fn bad_id_is_invalid_input() {
        assert!(matches!(parse_id("nope"), Err(ApiError::InvalidInput(_))));
    }
}

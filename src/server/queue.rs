//! `GET /api/v1/system/queue`: queue depth and dead-lettered task ids.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::store::Backend;
use crate::zones::{LocationCheckSink, ZoneRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueResponse {
    pub pending: usize,
    pub dead: usize,
    /// Newest first.
    pub dead_letter_ids: Vec<String>,
}

pub async fn queue_handler<B, R>(
    State(state): State<AppState<B, R>>,
) -> Result<Json<QueueResponse>, ApiError>
where
    B: Backend,
    R: ZoneRepository + LocationCheckSink,
{
    let stats = state.tasks().stats().await?;
    let dead_letter_ids = state.tasks().dead_letter_ids().await?;
    Ok(Json(QueueResponse {
        pending: stats.pending,
        dead: stats.dead,
        dead_letter_ids,
    }))
}

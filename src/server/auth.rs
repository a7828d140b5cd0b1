//! API key check for protected routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{trace, warn};

use super::AppState;
use super::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `X-API-Key` header is missing or wrong.
pub async fn require_api_key<B, R>(
    State(state): State<AppState<B, R>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    B: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let verdict = match presented {
        None => Err(ApiError::MissingApiKey),
        Some(key) if !keys_match(key.as_bytes(), state.api_key().as_bytes()) => {
            Err(ApiError::InvalidApiKey)
        }
        Some(_) => Ok(()),
    };

    if let Err(e) = verdict {
        warn!(path = %request.uri().path(), error = %e, "Rejected request");
        return Err(e);
    }
    trace!("API key accepted");
    Ok(next.run(request).await)
}

/// Compares keys without short-circuiting on the first differing byte.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    presented.len() == expected.len()
        && presented
            .iter()
            .zip(expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

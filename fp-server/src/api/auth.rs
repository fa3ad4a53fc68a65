//! Bearer authentication middleware
//!
//! Resolves `Authorization: Bearer <token>` to a viewer identity and stores
//! it as a request extension. Two flavors:
//! - `require_viewer`: missing or invalid credential is rejected with 401
//! - `optional_viewer`: missing credential passes anonymously, but a
//!   credential that is present and invalid is still rejected

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use fp_common::auth::{parse_bearer, verify_token};
use fp_common::ViewerId;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Identity of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer(pub ViewerId);

fn resolve(state: &AppState, request: &Request) -> Result<Option<Viewer>, ApiError> {
    let Some(value) = request.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };

    let header = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Authorization header is not valid text".to_string()))?;

    let viewer_id = parse_bearer(header)
        .and_then(|token| verify_token(token, state.shared_secret))
        .map_err(|e| {
            warn!("Rejected bearer credential: {}", e);
            ApiError::from(e)
        })?;

    Ok(Some(Viewer(viewer_id)))
}

/// Reject requests without a valid bearer credential
pub async fn require_viewer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = resolve(&state, &request)?
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}

/// Attach the viewer when a credential is supplied
pub async fn optional_viewer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(viewer) = resolve(&state, &request)? {
        request.extensions_mut().insert(viewer);
    }
    Ok(next.run(request).await)
}

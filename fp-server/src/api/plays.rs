//! Play attribution and like toggle endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    Extension, Json,
};
use fp_common::events::FeedEvent;
use fp_common::models::{LikeAction, LikeResponse, PlayRequest, PlayResponse};
use fp_common::{time, TrackId};

use super::auth::Viewer;
use crate::db::likes;
use crate::error::ApiError;
use crate::AppState;

/// Parse the optional play body; an empty body means all defaults
fn parse_play_request(body: &[u8]) -> Result<PlayRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PlayRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid play request body: {}", e)))
}

/// POST /publications/:id/play
///
/// A play inside the dedup window is a success with `accepted: false`.
pub async fn record_play(
    State(state): State<AppState>,
    Extension(Viewer(viewer_id)): Extension<Viewer>,
    Path(track_id): Path<TrackId>,
    body: Bytes,
) -> Result<Json<PlayResponse>, ApiError> {
    let request = parse_play_request(&body)?;
    let weight = request.weight.unwrap_or(1.0);
    let is_manual = request.is_manual.unwrap_or(false);

    let receipt = state
        .ledger
        .record_play(viewer_id, track_id, weight, is_manual)
        .await?;

    state.events.emit_lossy(FeedEvent::PlayRecorded {
        track_id,
        viewer_id,
        accepted: receipt.outcome.accepted,
        author_play: receipt.author_play,
        timestamp: time::now(),
    });

    let message = if receipt.outcome.accepted {
        "Play recorded"
    } else {
        "Play already counted within the dedup window"
    };

    Ok(Json(PlayResponse {
        message: message.to_string(),
        accepted: receipt.outcome.accepted,
    }))
}

/// POST /publications/:id/like
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(Viewer(viewer_id)): Extension<Viewer>,
    Path(track_id): Path<TrackId>,
) -> Result<Json<LikeResponse>, ApiError> {
    let (action, like_count) =
        likes::toggle_like(&state.db, viewer_id, track_id, state.ledger.max_attempts()).await?;

    state.events.emit_lossy(FeedEvent::LikeToggled {
        track_id,
        viewer_id,
        action,
        like_count,
        timestamp: time::now(),
    });

    let message = match action {
        LikeAction::Like => "Publication liked",
        LikeAction::Unlike => "Publication unliked",
    };

    Ok(Json(LikeResponse {
        message: message.to_string(),
        action,
    }))
}

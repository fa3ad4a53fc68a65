//! Resume position endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fp_common::events::FeedEvent;
use fp_common::models::{MessageResponse, PlaybackPositionBody};
use fp_common::{time, TrackId};

use super::auth::Viewer;
use crate::db::positions;
use crate::error::ApiError;
use crate::AppState;

/// POST /playback/:pubId
pub async fn save_position(
    State(state): State<AppState>,
    Extension(Viewer(viewer_id)): Extension<Viewer>,
    Path(track_id): Path<TrackId>,
    Json(body): Json<PlaybackPositionBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    positions::set_position(&state.db, viewer_id, track_id, body.last_position).await?;

    state.events.emit_lossy(FeedEvent::PositionSaved {
        track_id,
        viewer_id,
        last_position: body.last_position,
        timestamp: time::now(),
    });

    Ok(Json(MessageResponse {
        message: "Playback position saved".to_string(),
    }))
}

/// GET /playback/:pubId
///
/// Returns 0 when nothing is stored, including for unknown tracks.
pub async fn get_position(
    State(state): State<AppState>,
    Extension(Viewer(viewer_id)): Extension<Viewer>,
    Path(track_id): Path<TrackId>,
) -> Result<Json<PlaybackPositionBody>, ApiError> {
    let last_position = positions::get_position(&state.db, viewer_id, track_id).await?;
    Ok(Json(PlaybackPositionBody { last_position }))
}

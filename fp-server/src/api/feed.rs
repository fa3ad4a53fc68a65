//! Feed endpoints

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use fp_common::ranking::matches_query;
use fp_common::{FeedOrdering, FeedTrack, TrackId};
use serde::Deserialize;

use super::auth::Viewer;
use crate::error::ApiError;
use crate::{ranker, AppState};

/// Query parameters for GET /publications
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
    /// Title or username filter
    pub q: Option<String>,
}

/// GET /publications?sort=alphabetical|engagement&q=text
///
/// Anonymous callers get the same feed with `likedByUser` false.
pub async fn list_publications(
    State(state): State<AppState>,
    viewer: Option<Extension<Viewer>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedTrack>>, ApiError> {
    let ordering = match query.sort.as_deref() {
        Some(sort) => sort.parse::<FeedOrdering>()?,
        None => FeedOrdering::default(),
    };

    let viewer_id = viewer.map(|Extension(Viewer(id))| id);
    let mut feed = ranker::list_feed(&state.db, ordering, viewer_id).await?;
    if let Some(q) = query.q.as_deref() {
        feed.retain(|track| matches_query(track, q));
    }
    Ok(Json(feed))
}

/// GET /publications/:id
pub async fn get_publication(
    State(state): State<AppState>,
    viewer: Option<Extension<Viewer>>,
    Path(id): Path<TrackId>,
) -> Result<Json<FeedTrack>, ApiError> {
    let viewer_id = viewer.map(|Extension(Viewer(id))| id);
    let track = ranker::get_feed_track(&state.db, id, viewer_id).await?;
    Ok(Json(track))
}

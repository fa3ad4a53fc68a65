//! Engagement ranker
//!
//! Scores are derived per request from the counters stored on each track;
//! nothing is cached between requests.

use fp_common::ranking::sort_feed;
use fp_common::{FeedOrdering, FeedTrack, Result, TrackId, ViewerId};
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::tracks;

/// All tracks in the requested order, with viewer-derived fields filled in
pub async fn list_feed(
    db: &SqlitePool,
    ordering: FeedOrdering,
    viewer: Option<ViewerId>,
) -> Result<Vec<FeedTrack>> {
    let mut feed = tracks::list_feed_tracks(db, viewer).await?;
    sort_feed(&mut feed, ordering);
    debug!(count = feed.len(), %ordering, "Feed ranked");
    Ok(feed)
}

/// A single track projection
pub async fn get_feed_track(
    db: &SqlitePool,
    id: TrackId,
    viewer: Option<ViewerId>,
) -> Result<FeedTrack> {
    tracks::get_feed_track(db, id, viewer).await
}

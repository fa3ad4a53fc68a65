//! Track queries
//!
//! Counters are only ever changed with single-statement `col = col + ?`
//! updates; see `play_events` and `likes`.

use fp_common::models::{FeedTrack, NewTrack, Track};
use fp_common::{time, Error, Result, TrackId, ViewerId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

const TRACK_COLUMNS: &str = "t.guid, t.owner_id, t.title, t.content, t.audio_url, t.image_url, \
     t.video_url, t.created_at, t.like_count, t.play_count, t.author_play_count";

fn track_from_row(row: &SqliteRow) -> Result<Track> {
    Ok(Track {
        id: parse_uuid(&row.try_get::<String, _>("guid")?)?,
        owner_id: parse_uuid(&row.try_get::<String, _>("owner_id")?)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        audio_url: row.try_get("audio_url")?,
        image_url: row.try_get("image_url")?,
        video_url: row.try_get("video_url")?,
        created_at: row.try_get("created_at")?,
        like_count: row.try_get("like_count")?,
        play_count: row.try_get("play_count")?,
        author_play_count: row.try_get("author_play_count")?,
    })
}

fn validate_new_track(track: &NewTrack) -> Result<()> {
    if track.title.trim().is_empty() {
        return Err(Error::InvalidInput("Track title is required".to_string()));
    }
    if track.audio_url.trim().is_empty() {
        return Err(Error::InvalidInput("Track audio URL is required".to_string()));
    }
    if track.image_url.trim().is_empty() {
        return Err(Error::InvalidInput("Track image URL is required".to_string()));
    }
    Ok(())
}

/// Publish a track created now
pub async fn insert_track(db: &SqlitePool, track: &NewTrack) -> Result<Track> {
    insert_track_at(db, track, time::now_ms()).await
}

/// Publish a track with an explicit creation timestamp (epoch ms)
pub async fn insert_track_at(db: &SqlitePool, track: &NewTrack, created_at: i64) -> Result<Track> {
    validate_new_track(track)?;

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO tracks (guid, owner_id, title, content, audio_url, image_url, video_url, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(track.owner_id.to_string())
    .bind(&track.title)
    .bind(&track.content)
    .bind(&track.audio_url)
    .bind(&track.image_url)
    .bind(&track.video_url)
    .bind(created_at)
    .execute(db)
    .await?;

    Ok(Track {
        id,
        owner_id: track.owner_id,
        title: track.title.clone(),
        content: track.content.clone(),
        audio_url: track.audio_url.clone(),
        image_url: track.image_url.clone(),
        video_url: track.video_url.clone(),
        created_at,
        like_count: 0,
        play_count: 0,
        author_play_count: 0,
    })
}

/// Load a track, `NotFound` if absent
pub async fn get_track(db: &SqlitePool, id: TrackId) -> Result<Track> {
    let sql = format!("SELECT {} FROM tracks t WHERE t.guid = ?", TRACK_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Track {} not found", id)))?;

    track_from_row(&row)
}

/// Delete a track; likes, play events and playback positions cascade
///
/// Returns false when the track did not exist.
pub async fn delete_track(db: &SqlitePool, id: TrackId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tracks WHERE guid = ?")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Unordered feed projection: every track with owner name and the viewer's like flag
///
/// Ordering is applied by the ranker.
pub async fn list_feed_tracks(db: &SqlitePool, viewer: Option<ViewerId>) -> Result<Vec<FeedTrack>> {
    let sql = format!(
        r#"
        SELECT {},
               COALESCE(u.username, 'unknown') AS username,
               EXISTS(SELECT 1 FROM likes l WHERE l.track_id = t.guid AND l.viewer_id = ?) AS liked
        FROM tracks t
        LEFT JOIN users u ON u.guid = t.owner_id
        "#,
        TRACK_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(viewer.map(|v| v.to_string()))
        .fetch_all(db)
        .await?;

    rows.iter().map(feed_track_from_row).collect()
}

/// Feed projection of a single track
pub async fn get_feed_track(
    db: &SqlitePool,
    id: TrackId,
    viewer: Option<ViewerId>,
) -> Result<FeedTrack> {
    let sql = format!(
        r#"
        SELECT {},
               COALESCE(u.username, 'unknown') AS username,
               EXISTS(SELECT 1 FROM likes l WHERE l.track_id = t.guid AND l.viewer_id = ?) AS liked
        FROM tracks t
        LEFT JOIN users u ON u.guid = t.owner_id
        WHERE t.guid = ?
        "#,
        TRACK_COLUMNS
    );

    let row = sqlx::query(&sql)
        .bind(viewer.map(|v| v.to_string()))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Track {} not found", id)))?;

    feed_track_from_row(&row)
}

fn feed_track_from_row(row: &SqliteRow) -> Result<FeedTrack> {
    let track = track_from_row(row)?;
    let username: String = row.try_get("username")?;
    let liked: bool = row.try_get("liked")?;
    Ok(FeedTrack::from_track(track, username, liked))
}

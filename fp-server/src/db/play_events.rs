//! Play-event ledger rows and counter increments
//!
//! These functions take a connection so the ledger can run the dedup check,
//! the append and the increment inside one transaction.

use fp_common::models::PlayEvent;
use fp_common::{Error, Result, TrackId, ViewerId};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::parse_uuid;

/// True when a counted event for (viewer, track) exists strictly after `since_ms`
pub async fn has_counted_since(
    conn: &mut SqliteConnection,
    viewer_id: ViewerId,
    track_id: TrackId,
    since_ms: i64,
) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM play_events
        WHERE viewer_id = ? AND track_id = ? AND counted = 1 AND played_at > ?
        LIMIT 1
        "#,
    )
    .bind(viewer_id.to_string())
    .bind(track_id.to_string())
    .bind(since_ms)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(found.is_some())
}

/// Append an event to the ledger
pub async fn append_event(conn: &mut SqliteConnection, event: &PlayEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO play_events (guid, viewer_id, track_id, played_at, weight, counted, is_manual)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.id.to_string())
    .bind(event.viewer_id.to_string())
    .bind(event.track_id.to_string())
    .bind(event.played_at)
    .bind(event.weight)
    .bind(event.counted)
    .bind(event.is_manual)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Which counter a counted play increments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayBucket {
    Public,
    Author,
}

/// Atomically add `by` to one of the track's play counters
///
/// Single `col = col + ?` statement guarded against integer overflow, which
/// SQLite would otherwise turn into a REAL value. `NotFound` when the track
/// is gone, `InvalidInput` when the counter cannot take the increment.
pub async fn increment_counter(
    conn: &mut SqliteConnection,
    track_id: TrackId,
    bucket: PlayBucket,
    by: i64,
) -> Result<()> {
    let sql = match bucket {
        PlayBucket::Public => {
            "UPDATE tracks SET play_count = play_count + ?1 \
             WHERE guid = ?2 AND play_count <= 9223372036854775807 - ?1"
        }
        PlayBucket::Author => {
            "UPDATE tracks SET author_play_count = author_play_count + ?1 \
             WHERE guid = ?2 AND author_play_count <= 9223372036854775807 - ?1"
        }
    };

    let result = sqlx::query(sql)
        .bind(by)
        .bind(track_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tracks WHERE guid = ?")
            .bind(track_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => Error::InvalidInput(format!("Play counter of track {} is saturated", track_id)),
            None => Error::NotFound(format!("Track {} not found", track_id)),
        });
    }
    Ok(())
}

/// Owner of a track, `NotFound` when absent
pub async fn track_owner(conn: &mut SqliteConnection, track_id: TrackId) -> Result<ViewerId> {
    let owner: String = sqlx::query_scalar("SELECT owner_id FROM tracks WHERE guid = ?")
        .bind(track_id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Track {} not found", track_id)))?;

    parse_uuid(&owner)
}

/// All ledger entries for a track, oldest first
pub async fn list_events(db: &SqlitePool, track_id: TrackId) -> Result<Vec<PlayEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, viewer_id, track_id, played_at, weight, counted, is_manual
        FROM play_events
        WHERE track_id = ?
        ORDER BY played_at ASC
        "#,
    )
    .bind(track_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(PlayEvent {
                id: parse_uuid(&row.try_get::<String, _>("guid")?)?,
                viewer_id: parse_uuid(&row.try_get::<String, _>("viewer_id")?)?,
                track_id: parse_uuid(&row.try_get::<String, _>("track_id")?)?,
                played_at: row.try_get("played_at")?,
                weight: row.try_get("weight")?,
                counted: row.try_get("counted")?,
                is_manual: row.try_get("is_manual")?,
            })
        })
        .collect()
}

//! Like toggles

use fp_common::models::LikeAction;
use fp_common::{time, Error, Result, TrackId, ViewerId};
use sqlx::SqlitePool;

use crate::retry::retry_transient;

/// Flip the viewer's like on a track
///
/// Returns the action taken and the track's new like count. Lock contention
/// re-runs the whole toggle up to `max_attempts` times.
pub async fn toggle_like(
    db: &SqlitePool,
    viewer_id: ViewerId,
    track_id: TrackId,
    max_attempts: u32,
) -> Result<(LikeAction, i64)> {
    retry_transient("toggle like", max_attempts, || {
        toggle_once(db, viewer_id, track_id)
    })
    .await
}

async fn toggle_once(
    db: &SqlitePool,
    viewer_id: ViewerId,
    track_id: TrackId,
) -> Result<(LikeAction, i64)> {
    let mut tx = db.begin().await?;

    let removed = sqlx::query("DELETE FROM likes WHERE track_id = ? AND viewer_id = ?")
        .bind(track_id.to_string())
        .bind(viewer_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected()
        > 0;

    let (action, delta) = if removed {
        (LikeAction::Unlike, -1)
    } else {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tracks WHERE guid = ?")
            .bind(track_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("Track {} not found", track_id)));
        }

        // A concurrent toggle may have inserted the row first; count it once
        let inserted = sqlx::query(
            "INSERT INTO likes (track_id, viewer_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT(track_id, viewer_id) DO NOTHING",
        )
        .bind(track_id.to_string())
        .bind(viewer_id.to_string())
        .bind(time::now_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        (LikeAction::Like, inserted as i64)
    };

    let like_count: i64 = sqlx::query_scalar(
        "UPDATE tracks SET like_count = MAX(like_count + ?, 0) WHERE guid = ? RETURNING like_count",
    )
    .bind(delta)
    .bind(track_id.to_string())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((action, like_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tracks::{get_track, insert_track};
    use fp_common::db::{init_database, init_in_memory};
    use fp_common::models::NewTrack;
    use uuid::Uuid;

    async fn heart(db: &SqlitePool) -> TrackId {
        insert_track(
            db,
            &NewTrack {
                owner_id: Uuid::new_v4(),
                title: "Heart".to_string(),
                content: String::new(),
                audio_url: "/media/heart.mp3".to_string(),
                image_url: "/media/heart.jpg".to_string(),
                video_url: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_toggle_twice_restores() {
        let db = init_in_memory().await.unwrap();
        let track = heart(&db).await;
        let viewer = Uuid::new_v4();

        assert_eq!(toggle_like(&db, viewer, track, 3).await.unwrap(), (LikeAction::Like, 1));
        assert_eq!(toggle_like(&db, viewer, track, 3).await.unwrap(), (LikeAction::Unlike, 0));
        assert_eq!(get_track(&db, track).await.unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn test_like_missing_track() {
        let db = init_in_memory().await.unwrap();
        let result = toggle_like(&db, Uuid::new_v4(), Uuid::new_v4(), 3).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_toggles_keep_count_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_database(&dir.path().join("likes.db")).await.unwrap();
        let track = heart(&db).await;
        let viewer = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                toggle_like(&db, viewer, track, 5).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE track_id = ?")
            .bind(track.to_string())
            .fetch_one(&db)
            .await
            .unwrap();
        assert!(rows <= 1);
        assert_eq!(get_track(&db, track).await.unwrap().like_count, rows);
    }
}

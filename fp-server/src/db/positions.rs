//! Resume store: last playback offset per (viewer, track)

use fp_common::models::validate_offset;
use fp_common::{time, Error, Result, TrackId, ViewerId};
use sqlx::SqlitePool;

/// Store the viewer's offset for a track, replacing any previous value
///
/// Last write wins; the track must exist.
pub async fn set_position(
    db: &SqlitePool,
    viewer_id: ViewerId,
    track_id: TrackId,
    offset_seconds: f64,
) -> Result<()> {
    let offset = validate_offset(offset_seconds)?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tracks WHERE guid = ?")
        .bind(track_id.to_string())
        .fetch_optional(db)
        .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("Track {} not found", track_id)));
    }

    sqlx::query(
        r#"
        INSERT INTO playback_positions (viewer_id, track_id, last_position, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(viewer_id, track_id) DO UPDATE SET
            last_position = excluded.last_position,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(viewer_id.to_string())
    .bind(track_id.to_string())
    .bind(offset)
    .bind(time::now_ms())
    .execute(db)
    .await?;

    Ok(())
}

/// Last stored offset, 0 when nothing was stored
pub async fn get_position(db: &SqlitePool, viewer_id: ViewerId, track_id: TrackId) -> Result<f64> {
    let position: Option<f64> = sqlx::query_scalar(
        "SELECT last_position FROM playback_positions WHERE viewer_id = ? AND track_id = ?",
    )
    .bind(viewer_id.to_string())
    .bind(track_id.to_string())
    .fetch_optional(db)
    .await?;

    Ok(position.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tracks::{delete_track, insert_track};
    use fp_common::db::init_in_memory;
    use fp_common::models::NewTrack;
    use uuid::Uuid;

    async fn setup() -> (SqlitePool, TrackId) {
        let db = init_in_memory().await.unwrap();
        let track = insert_track(
            &db,
            &NewTrack {
                owner_id: Uuid::new_v4(),
                title: "Long Mix".to_string(),
                content: String::new(),
                audio_url: "/media/mix.mp3".to_string(),
                image_url: "/media/mix.jpg".to_string(),
                video_url: None,
            },
        )
        .await
        .unwrap();
        (db, track.id)
    }

    #[tokio::test]
    async fn test_default_is_zero() {
        let (db, track) = setup().await;
        assert_eq!(get_position(&db, Uuid::new_v4(), track).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (db, track) = setup().await;
        let viewer = Uuid::new_v4();

        set_position(&db, viewer, track, 42.5).await.unwrap();
        assert_eq!(get_position(&db, viewer, track).await.unwrap(), 42.5);

        set_position(&db, viewer, track, 10.0).await.unwrap();
        assert_eq!(get_position(&db, viewer, track).await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_positions_are_per_viewer() {
        let (db, track) = setup().await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        set_position(&db, a, track, 30.0).await.unwrap();
        assert_eq!(get_position(&db, b, track).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_invalid_offset_and_missing_track() {
        let (db, track) = setup().await;
        let viewer = Uuid::new_v4();

        assert!(matches!(
            set_position(&db, viewer, track, -1.0).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            set_position(&db, viewer, Uuid::new_v4(), 1.0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_track_cascades() {
        let (db, track) = setup().await;
        let viewer = Uuid::new_v4();
        set_position(&db, viewer, track, 12.0).await.unwrap();

        delete_track(&db, track).await.unwrap();
        assert_eq!(get_position(&db, viewer, track).await.unwrap(), 0.0);
    }
}

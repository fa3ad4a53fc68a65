//! JSON seed import for users and tracks
//!
//! Publishing and registration belong to other services; the seed file lets
//! an operator or a test fixture populate the feed directly.
//!
//! ```json
//! {
//!   "users": [{"id": "…", "username": "alice"}],
//!   "tracks": [{"ownerId": "…", "title": "Dawn", "audioUrl": "/a.mp3", "imageUrl": "/a.jpg"}]
//! }
//! ```

use std::path::Path;

use fp_common::models::NewTrack;
use fp_common::{Error, Result, ViewerId};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::{tracks, users};

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub id: ViewerId,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedTrack {
    pub owner_id: ViewerId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub audio_url: String,
    pub image_url: String,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub tracks: Vec<SeedTrack>,
}

impl SeedFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid seed file {}: {}", path.display(), e)))
    }
}

/// Insert every user and track of the seed; returns (users, tracks) written
pub async fn apply_seed(db: &SqlitePool, seed: SeedFile) -> Result<(usize, usize)> {
    for user in &seed.users {
        users::upsert_user(db, user.id, &user.username).await?;
    }

    for track in &seed.tracks {
        tracks::insert_track(
            db,
            &NewTrack {
                owner_id: track.owner_id,
                title: track.title.clone(),
                content: track.content.clone(),
                audio_url: track.audio_url.clone(),
                image_url: track.image_url.clone(),
                video_url: track.video_url.clone(),
            },
        )
        .await?;
    }

    info!(
        users = seed.users.len(),
        tracks = seed.tracks.len(),
        "Seed applied"
    );
    Ok((seed.users.len(), seed.tracks.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_common::db::init_in_memory;
    use fp_common::FeedOrdering;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_apply_seed_from_json() {
        let owner = Uuid::new_v4();
        let json = format!(
            r#"{{
                "users": [{{"id": "{owner}", "username": "alice"}}],
                "tracks": [
                    {{"ownerId": "{owner}", "title": "b-side", "audioUrl": "/b.mp3", "imageUrl": "/b.jpg"}},
                    {{"ownerId": "{owner}", "title": "A-side", "audioUrl": "/a.mp3", "imageUrl": "/a.jpg", "videoUrl": "/a.mp4"}}
                ]
            }}"#
        );
        let seed: SeedFile = serde_json::from_str(&json).unwrap();

        let db = init_in_memory().await.unwrap();
        assert_eq!(apply_seed(&db, seed).await.unwrap(), (1, 2));

        let feed = crate::ranker::list_feed(&db, FeedOrdering::Alphabetical, None)
            .await
            .unwrap();
        assert_eq!(feed[0].title, "A-side");
        assert_eq!(feed[0].video_url.as_deref(), Some("/a.mp4"));
        assert_eq!(feed[1].username, "alice");
    }

    #[test]
    fn test_load_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(SeedFile::load(&path), Err(Error::Config(_))));
    }
}

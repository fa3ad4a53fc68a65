//! Database initialization
//!
//! Creates the SQLite database on first run and applies the schema
//! idempotently (`CREATE TABLE IF NOT EXISTS`) on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys are a per-connection pragma, so they live in the connect options
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every connection to `sqlite::memory:` is a separate database, so the pool
/// is capped at one connection.
pub async fn init_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Apply all table definitions (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_settings_table(pool).await?;
    create_tracks_table(pool).await?;
    create_likes_table(pool).await?;
    create_play_events_table(pool).await?;
    create_playback_positions_table(pool).await?;
    Ok(())
}

/// Viewer identities and display names (owned by the credential service)
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tracks_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            guid TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            audio_url TEXT NOT NULL,
            image_url TEXT NOT NULL,
            video_url TEXT,
            created_at INTEGER NOT NULL,
            like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
            play_count INTEGER NOT NULL DEFAULT 0 CHECK (play_count >= 0),
            author_play_count INTEGER NOT NULL DEFAULT 0 CHECK (author_play_count >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_likes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS likes (
            track_id TEXT NOT NULL REFERENCES tracks(guid) ON DELETE CASCADE,
            viewer_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (track_id, viewer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_play_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS play_events (
            guid TEXT PRIMARY KEY,
            viewer_id TEXT NOT NULL,
            track_id TEXT NOT NULL REFERENCES tracks(guid) ON DELETE CASCADE,
            played_at INTEGER NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            counted INTEGER NOT NULL,
            is_manual INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Dedup lookups filter on (viewer, track, counted) over a time range
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_play_events_dedup
        ON play_events (viewer_id, track_id, counted, played_at)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playback_positions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playback_positions (
            viewer_id TEXT NOT NULL,
            track_id TEXT NOT NULL REFERENCES tracks(guid) ON DELETE CASCADE,
            last_position REAL NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (viewer_id, track_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_schema_created() {
        let pool = init_in_memory().await.unwrap();
        let names = table_names(&pool).await;
        for expected in ["likes", "play_events", "playback_positions", "settings", "tracks", "users"] {
            assert!(names.iter().any(|n| n == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = init_in_memory().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_counter_rejected() {
        let pool = init_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO tracks (guid, owner_id, title, audio_url, image_url, created_at, play_count)
             VALUES ('t', 'o', 'x', 'a', 'i', 0, -1)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}

//! Viewer display names
//!
//! Registration is handled by the credential service; this module only
//! writes the rows the feed projection joins against.

use fp_common::{time, Result, ViewerId};
use sqlx::SqlitePool;

/// Insert or rename a user
pub async fn upsert_user(db: &SqlitePool, id: ViewerId, username: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (guid, username, created_at) VALUES (?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET username = excluded.username
        "#,
    )
    .bind(id.to_string())
    .bind(username)
    .bind(time::now_ms())
    .execute(db)
    .await?;

    Ok(())
}

/// Display name of a user, if registered
pub async fn get_username(db: &SqlitePool, id: ViewerId) -> Result<Option<String>> {
    let name = sqlx::query_scalar("SELECT username FROM users WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    Ok(name)
}

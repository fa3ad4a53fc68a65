//! Bearer credential verification
//!
//! A bearer token is `<viewer-uuid>.<digest>` where the digest is the
//! SHA-256 of the viewer UUID followed by the shared secret (decimal i64),
//! rendered as 64 lowercase hex characters.
//!
//! The shared secret lives in the `settings` table under
//! `api_shared_secret` and is generated on first start. Issuing tokens on
//! login belongs to the credential service; `issue_token` is exposed for that
//! collaborator and for tests.
//!
//! This module is framework-free. The server calls `verify_token` from its
//! auth middleware.

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

use crate::models::ViewerId;
use crate::{Error, Result};

/// Settings key holding the token signing secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Load the shared secret, generating and storing one if absent
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64> {
    let result: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(db)
        .await?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| Error::Config(format!("Invalid {}: {}", SHARED_SECRET_KEY, e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and persist it
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64> {
    let secret = generate_secret();

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await?;

    tracing::info!("Generated new API shared secret");
    Ok(secret)
}

/// Random non-zero i64
pub fn generate_secret() -> i64 {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    }
}

/// SHA-256 over viewer id and secret, as 64 hex chars
pub fn token_digest(viewer_id: &ViewerId, shared_secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(viewer_id.to_string().as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the bearer token for a viewer
pub fn issue_token(viewer_id: &ViewerId, shared_secret: i64) -> String {
    format!("{}.{}", viewer_id, token_digest(viewer_id, shared_secret))
}

/// Resolve a bearer token to its viewer identity
pub fn verify_token(token: &str, shared_secret: i64) -> Result<ViewerId> {
    let (id_part, digest) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| Error::Unauthorized("Malformed bearer token".to_string()))?;

    let viewer_id = Uuid::parse_str(id_part)
        .map_err(|_| Error::Unauthorized("Malformed viewer identity in token".to_string()))?;

    if token_digest(&viewer_id, shared_secret) != digest {
        return Err(Error::Unauthorized("Invalid token signature".to_string()));
    }

    Ok(viewer_id)
}

/// Extract the token from an `Authorization` header value
pub fn parse_bearer(header_value: &str) -> Result<&str> {
    let value = header_value.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| Error::Unauthorized("Expected Bearer credential".to_string()))?;

    if token.trim().is_empty() {
        return Err(Error::Unauthorized("Empty bearer token".to_string()));
    }
    Ok(token.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_verify() {
        let viewer = Uuid::new_v4();
        let token = issue_token(&viewer, 123456789);
        assert_eq!(verify_token(&token, 123456789).unwrap(), viewer);
    }

    #[test]
    fn test_digest_shape() {
        let digest = token_digest(&Uuid::nil(), 42);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(digest, token_digest(&Uuid::nil(), 43));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let viewer = Uuid::new_v4();
        let token = issue_token(&viewer, 1);
        assert!(matches!(verify_token(&token, 2), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_tampered_identity_rejected() {
        let viewer = Uuid::new_v4();
        let token = issue_token(&viewer, 7);
        let digest = token.split_once('.').unwrap().1;
        let forged = format!("{}.{}", Uuid::new_v4(), digest);
        assert!(verify_token(&forged, 7).is_err());
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        assert!(verify_token("no-dot-here", 7).is_err());
        assert!(verify_token("not-a-uuid.abc", 7).is_err());
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def").unwrap(), "abc.def");
        assert_eq!(parse_bearer("bearer   abc ").unwrap(), "abc");
        assert!(parse_bearer("Basic abc").is_err());
        assert!(parse_bearer("Bearer   ").is_err());
    }

    #[test]
    fn test_generated_secret_nonzero() {
        for _ in 0..32 {
            assert_ne!(generate_secret(), 0);
        }
    }
}

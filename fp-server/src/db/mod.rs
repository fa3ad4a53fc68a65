//! Database access layer for fp-server
//!
//! One module per table family. Identifiers are stored as TEXT UUIDs and
//! timestamps as epoch milliseconds.

use fp_common::{Error, Result};
use uuid::Uuid;

pub mod likes;
pub mod play_events;
pub mod positions;
pub mod tracks;
pub mod users;

/// Parse a TEXT column holding a UUID
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_uuid("garbage"), Err(Error::Internal(_))));
    }
}

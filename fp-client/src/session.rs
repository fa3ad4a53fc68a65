//! Explicit client session
//!
//! The session carries the bearer token issued at login. It is shared
//! between the API client and the scheduler and is invalidated on logout or
//! when the server answers 401; an invalid session never sends its token.

use std::sync::atomic::{AtomicBool, Ordering};

use fp_common::ViewerId;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct Session {
    token: Option<String>,
    viewer_id: Option<ViewerId>,
    valid: AtomicBool,
}

impl Session {
    /// Session for an issued bearer token (`<viewer-uuid>.<digest>`)
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let viewer_id = token
            .split_once('.')
            .and_then(|(id, _)| Uuid::parse_str(id).ok());
        Self {
            token: Some(token),
            viewer_id,
            valid: AtomicBool::new(true),
        }
    }

    /// Session without credentials; only anonymous endpoints work
    pub fn anonymous() -> Self {
        Self {
            token: None,
            viewer_id: None,
            valid: AtomicBool::new(false),
        }
    }

    /// Token to send, if the session is still valid
    pub fn bearer(&self) -> Option<&str> {
        if self.is_valid() {
            self.token.as_deref()
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Viewer identity encoded in the token
    pub fn viewer_id(&self) -> Option<ViewerId> {
        self.viewer_id
    }

    pub fn logout(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            info!("Session logged out");
        }
    }

    /// Called when the server rejects the credential
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            warn!("Session invalidated by server (401)");
        }
    }
}

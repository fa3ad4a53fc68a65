//! HTTP API handlers for fp-server

pub mod auth;
pub mod buildinfo;
pub mod feed;
pub mod health;
pub mod playback;
pub mod plays;
pub mod sse;

pub use auth::{optional_viewer, require_viewer, Viewer};
pub use buildinfo::get_build_info;
pub use feed::{get_publication, list_publications};
pub use health::health_routes;
pub use playback::{get_position, save_position};
pub use plays::{record_play, toggle_like};
pub use sse::event_stream;

//! # Feedplay Common Library
//!
//! Shared code for the Feedplay server and client engine:
//! - Domain models and wire types (Track, FeedTrack, PlayEvent)
//! - Engagement score and feed ordering comparators
//! - Bearer token issue/verify
//! - Configuration loading
//! - Database schema
//! - Feed event types and the broadcast bus

pub mod auth;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod ranking;
pub mod time;

pub use error::{Error, Result};
pub use models::{FeedOrdering, FeedTrack, PlayOutcome, TrackId, ViewerId};

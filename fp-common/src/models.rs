//! Domain models shared by the server and the client engine
//!
//! Wire types use camelCase field names to match the public HTTP contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ranking::engagement_score;
use crate::{Error, Result};

/// Stable identity of a track
pub type TrackId = Uuid;

/// Stable identity of a viewer (the resolved bearer identity)
pub type ViewerId = Uuid;

/// A published track with its server-owned counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub owner_id: ViewerId,
    pub title: String,
    pub content: String,
    pub audio_url: String,
    pub image_url: String,
    pub video_url: Option<String>,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    pub like_count: i64,
    pub play_count: i64,
    pub author_play_count: i64,
}

/// Fields required to publish a track
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub owner_id: ViewerId,
    pub title: String,
    pub content: String,
    pub audio_url: String,
    pub image_url: String,
    pub video_url: Option<String>,
}

/// A play attribution as stored in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub id: Uuid,
    pub viewer_id: ViewerId,
    pub track_id: TrackId,
    /// Epoch milliseconds
    pub played_at: i64,
    pub weight: f64,
    /// False when the event fell inside the dedup window
    pub counted: bool,
    pub is_manual: bool,
}

/// Result of a ledger attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayOutcome {
    pub accepted: bool,
}

/// Feed ordering chosen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrdering {
    #[default]
    Alphabetical,
    Engagement,
}

impl fmt::Display for FeedOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedOrdering::Alphabetical => write!(f, "alphabetical"),
            FeedOrdering::Engagement => write!(f, "engagement"),
        }
    }
}

impl FromStr for FeedOrdering {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alphabetical" | "title" => Ok(FeedOrdering::Alphabetical),
            "engagement" | "score" => Ok(FeedOrdering::Engagement),
            other => Err(Error::InvalidInput(format!("Unknown feed ordering: {}", other))),
        }
    }
}

/// One element of a served feed: the track projection plus viewer-derived fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedTrack {
    pub id: TrackId,
    pub title: String,
    pub content: String,
    pub audio_url: String,
    pub image_url: String,
    pub video_url: Option<String>,
    pub username: String,
    pub user_uuid: ViewerId,
    /// Epoch milliseconds
    pub created_at: i64,
    pub likes: i64,
    pub play_count: i64,
    pub author_play_count: i64,
    pub liked_by_user: bool,
    /// Derived engagement score, recomputed per request
    pub score: f64,
}

impl FeedTrack {
    /// Build the projection for a track, its owner's display name and the viewer flag
    pub fn from_track(track: Track, username: String, liked_by_user: bool) -> Self {
        let score = engagement_score(track.like_count, track.play_count);
        Self {
            id: track.id,
            title: track.title,
            content: track.content,
            audio_url: track.audio_url,
            image_url: track.image_url,
            video_url: track.video_url,
            username,
            user_uuid: track.owner_id,
            created_at: track.created_at,
            likes: track.like_count,
            play_count: track.play_count,
            author_play_count: track.author_play_count,
            liked_by_user,
            score,
        }
    }
}

/// Body of `POST /publications/:id/play`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    #[serde(default)]
    pub is_manual: Option<bool>,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Response of `POST /publications/:id/play`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayResponse {
    pub message: String,
    pub accepted: bool,
}

/// Body of `POST /playback/:pubId` and response of `GET /playback/:pubId`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPositionBody {
    pub last_position: f64,
}

/// Whether a like toggle added or removed the viewer's like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

/// Response of `POST /publications/:id/like`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub message: String,
    pub action: LikeAction,
}

/// Generic `{message}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Largest weight a single play may carry unless configured otherwise
pub const DEFAULT_MAX_PLAY_WEIGHT: f64 = 10.0;

/// Validate a play weight and convert it to the counter increment
///
/// Counters are integers; fractional weights round half away from zero and
/// never apply less than 1. Weights above `max_weight` are rejected.
pub fn play_increment(weight: f64, max_weight: f64) -> Result<i64> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "Play weight must be a positive number, got {}",
            weight
        )));
    }
    if weight > max_weight {
        return Err(Error::InvalidInput(format!(
            "Play weight must not exceed {}, got {}",
            max_weight, weight
        )));
    }
    Ok((weight.round() as i64).max(1))
}

/// Validate a resume offset in seconds
pub fn validate_offset(offset_seconds: f64) -> Result<f64> {
    if !offset_seconds.is_finite() || offset_seconds < 0.0 {
        return Err(Error::InvalidInput(format!(
            "Playback position must be a non-negative number of seconds, got {}",
            offset_seconds
        )));
    }
    Ok(offset_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_track() -> Track {
        Track {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "Night Drive".to_string(),
            content: "<p>synth</p>".to_string(),
            audio_url: "/media/a.mp3".to_string(),
            image_url: "/media/a.jpg".to_string(),
            video_url: None,
            created_at: 1_000,
            like_count: 10,
            play_count: 5,
            author_play_count: 3,
        }
    }

    #[test]
    fn test_feed_track_serializes_camel_case() {
        let track = sample_track();
        let owner = track.owner_id;
        let feed = FeedTrack::from_track(track, "alice".to_string(), true);
        let value = serde_json::to_value(&feed).unwrap();

        assert_eq!(value["audioUrl"], "/media/a.mp3");
        assert_eq!(value["userUuid"], json!(owner));
        assert_eq!(value["likes"], 10);
        assert_eq!(value["playCount"], 5);
        assert_eq!(value["authorPlayCount"], 3);
        assert_eq!(value["likedByUser"], true);
        assert!(value["videoUrl"].is_null());
    }

    #[test]
    fn test_feed_track_score_excludes_author_plays() {
        let feed = FeedTrack::from_track(sample_track(), "alice".to_string(), false);
        assert!((feed.score - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_feed_ordering_parse() {
        assert_eq!("engagement".parse::<FeedOrdering>().unwrap(), FeedOrdering::Engagement);
        assert_eq!("Alphabetical".parse::<FeedOrdering>().unwrap(), FeedOrdering::Alphabetical);
        assert!("random".parse::<FeedOrdering>().is_err());
        assert_eq!(FeedOrdering::default(), FeedOrdering::Alphabetical);
    }

    #[test]
    fn test_play_request_defaults() {
        let req: PlayRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.is_manual.is_none());
        assert!(req.weight.is_none());

        let req: PlayRequest = serde_json::from_value(json!({"isManual": true, "weight": 2.0})).unwrap();
        assert_eq!(req.is_manual, Some(true));
        assert_eq!(req.weight, Some(2.0));
    }

    #[test]
    fn test_play_increment_validation() {
        let max = DEFAULT_MAX_PLAY_WEIGHT;
        assert_eq!(play_increment(1.0, max).unwrap(), 1);
        assert_eq!(play_increment(2.6, max).unwrap(), 3);
        assert_eq!(play_increment(0.2, max).unwrap(), 1);
        assert!(play_increment(0.0, max).is_err());
        assert!(play_increment(-1.0, max).is_err());
        assert!(play_increment(f64::NAN, max).is_err());
    }

    #[test]
    fn test_play_increment_upper_bound() {
        assert_eq!(play_increment(10.0, 10.0).unwrap(), 10);
        assert!(matches!(play_increment(10.5, 10.0), Err(Error::InvalidInput(_))));
        assert!(play_increment(1e300, 10.0).is_err());
        assert!(play_increment(f64::INFINITY, 10.0).is_err());
    }

    #[test]
    fn test_validate_offset() {
        assert_eq!(validate_offset(42.5).unwrap(), 42.5);
        assert!(validate_offset(-0.1).is_err());
        assert!(validate_offset(f64::INFINITY).is_err());
    }
}

//! Play-event ledger
//!
//! Attributes plays to tracks with a per-(viewer, track) dedup window:
//! - A play is counted when no counted play by the same viewer on the same
//!   track exists in `(at - window, at]`; otherwise it is stored with
//!   `counted = false` and no counter moves.
//! - Counted plays by the track's owner go to `author_play_count`, all
//!   others to `play_count`.
//!
//! The dedup check, the append and the increment run in one transaction.
//! Requests for the same (viewer, track) pair are additionally serialized
//! in-process so two concurrent first plays cannot both pass the check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fp_common::models::{play_increment, PlayEvent, PlayOutcome, DEFAULT_MAX_PLAY_WEIGHT};
use fp_common::{time, Result, TrackId, ViewerId};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::play_events::{
    append_event, has_counted_since, increment_counter, track_owner, PlayBucket,
};
use crate::retry::retry_transient;

/// Outcome of a ledger attribution, with the bucket that was incremented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayReceipt {
    pub outcome: PlayOutcome,
    /// True when the play was counted into the author bucket
    pub author_play: bool,
}

type LockMap = HashMap<(ViewerId, TrackId), Arc<tokio::sync::Mutex<()>>>;

/// Per-key async locks, pruned once no request holds them
#[derive(Debug, Default)]
struct KeyedLocks {
    inner: Mutex<LockMap>,
}

impl KeyedLocks {
    fn handle(&self, key: (ViewerId, TrackId)) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(key).or_default().clone()
    }

    fn release(&self, key: (ViewerId, TrackId)) {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map itself still references the lock
        if map.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// The play-event ledger
#[derive(Debug)]
pub struct Ledger {
    db: SqlitePool,
    window_ms: i64,
    max_attempts: u32,
    max_weight: f64,
    locks: KeyedLocks,
}

impl Ledger {
    /// Create a ledger with the given dedup window and retry budget
    pub fn new(db: SqlitePool, window_hours: u32, max_attempts: u32) -> Self {
        Self {
            db,
            window_ms: time::hours_to_millis(window_hours),
            max_attempts: max_attempts.max(1),
            max_weight: DEFAULT_MAX_PLAY_WEIGHT,
            locks: KeyedLocks::default(),
        }
    }

    /// Replace the upper bound on a single play's weight
    pub fn with_max_weight(mut self, max_weight: f64) -> Self {
        self.max_weight = max_weight;
        self
    }

    /// Retry budget shared with other write paths
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Dedup window length in milliseconds
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Attribute a play happening now
    pub async fn record_play(
        &self,
        viewer_id: ViewerId,
        track_id: TrackId,
        weight: f64,
        is_manual: bool,
    ) -> Result<PlayReceipt> {
        self.record_play_at(viewer_id, track_id, weight, is_manual, time::now_ms())
            .await
    }

    /// Attribute a play at an explicit timestamp (epoch ms)
    pub async fn record_play_at(
        &self,
        viewer_id: ViewerId,
        track_id: TrackId,
        weight: f64,
        is_manual: bool,
        at_ms: i64,
    ) -> Result<PlayReceipt> {
        let increment = play_increment(weight, self.max_weight)?;
        let key = (viewer_id, track_id);

        let lock = self.locks.handle(key);
        let result = {
            let _guard = lock.lock().await;
            retry_transient("record play", self.max_attempts, || {
                self.attribute(viewer_id, track_id, weight, increment, is_manual, at_ms)
            })
            .await
        };
        drop(lock);
        self.locks.release(key);

        let receipt = result?;
        if receipt.outcome.accepted {
            info!(
                %viewer_id,
                %track_id,
                author_play = receipt.author_play,
                is_manual,
                "Play counted"
            );
        } else {
            debug!(%viewer_id, %track_id, "Play inside dedup window, not counted");
        }
        Ok(receipt)
    }

    async fn attribute(
        &self,
        viewer_id: ViewerId,
        track_id: TrackId,
        weight: f64,
        increment: i64,
        is_manual: bool,
        at_ms: i64,
    ) -> Result<PlayReceipt> {
        let mut tx = self.db.begin().await?;

        let owner = track_owner(&mut tx, track_id).await?;
        let window_start = at_ms.saturating_sub(self.window_ms);
        let counted = !has_counted_since(&mut tx, viewer_id, track_id, window_start).await?;

        append_event(
            &mut tx,
            &PlayEvent {
                id: Uuid::new_v4(),
                viewer_id,
                track_id,
                played_at: at_ms,
                weight,
                counted,
                is_manual,
            },
        )
        .await?;

        let author_play = counted && owner == viewer_id;
        if counted {
            let bucket = if author_play {
                PlayBucket::Author
            } else {
                PlayBucket::Public
            };
            increment_counter(&mut tx, track_id, bucket, increment).await?;
        }

        tx.commit().await?;

        Ok(PlayReceipt {
            outcome: PlayOutcome { accepted: counted },
            author_play,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::play_events::list_events;
    use crate::db::tracks::{get_track, insert_track};
    use fp_common::db::init_in_memory;
    use fp_common::models::NewTrack;
    use fp_common::Error;

    const HOUR_MS: i64 = 3_600_000;

    async fn setup(owner: ViewerId) -> (Ledger, SqlitePool, TrackId) {
        let db = init_in_memory().await.unwrap();
        let track = insert_track(
            &db,
            &NewTrack {
                owner_id: owner,
                title: "Echo".to_string(),
                content: String::new(),
                audio_url: "/media/echo.mp3".to_string(),
                image_url: "/media/echo.jpg".to_string(),
                video_url: None,
            },
        )
        .await
        .unwrap();
        (Ledger::new(db.clone(), 24, 3), db, track.id)
    }

    #[tokio::test]
    async fn test_dedup_window_sequence() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;
        let viewer = Uuid::new_v4();
        let t0 = 1_700_000_000_000;

        let first = ledger.record_play_at(viewer, track, 1.0, false, t0).await.unwrap();
        let second = ledger
            .record_play_at(viewer, track, 1.0, false, t0 + HOUR_MS)
            .await
            .unwrap();
        let third = ledger
            .record_play_at(viewer, track, 1.0, false, t0 + 25 * HOUR_MS)
            .await
            .unwrap();

        assert!(first.outcome.accepted);
        assert!(!second.outcome.accepted);
        assert!(third.outcome.accepted);
        assert_eq!(get_track(&db, track).await.unwrap().play_count, 2);

        // Ignored plays are kept in the ledger
        assert_eq!(list_events(&db, track).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_window_boundary_counts_again() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;
        let viewer = Uuid::new_v4();
        let t0 = 5 * HOUR_MS;

        ledger.record_play_at(viewer, track, 1.0, false, t0).await.unwrap();
        let at_boundary = ledger
            .record_play_at(viewer, track, 1.0, false, t0 + 24 * HOUR_MS)
            .await
            .unwrap();

        assert!(at_boundary.outcome.accepted);
        assert_eq!(get_track(&db, track).await.unwrap().play_count, 2);
    }

    #[tokio::test]
    async fn test_window_anchored_on_counted_plays_only() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;
        let viewer = Uuid::new_v4();
        let t0 = 0;

        ledger.record_play_at(viewer, track, 1.0, false, t0).await.unwrap();
        // Ignored at 20h; must not extend the window
        ledger
            .record_play_at(viewer, track, 1.0, false, t0 + 20 * HOUR_MS)
            .await
            .unwrap();
        let later = ledger
            .record_play_at(viewer, track, 1.0, false, t0 + 26 * HOUR_MS)
            .await
            .unwrap();

        assert!(later.outcome.accepted);
        assert_eq!(get_track(&db, track).await.unwrap().play_count, 2);
    }

    #[tokio::test]
    async fn test_distinct_viewers_both_count() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;
        let t0 = 0;

        ledger.record_play_at(Uuid::new_v4(), track, 1.0, false, t0).await.unwrap();
        ledger.record_play_at(Uuid::new_v4(), track, 1.0, false, t0).await.unwrap();

        assert_eq!(get_track(&db, track).await.unwrap().play_count, 2);
    }

    #[tokio::test]
    async fn test_owner_plays_go_to_author_bucket() {
        let owner = Uuid::new_v4();
        let (ledger, db, track) = setup(owner).await;

        let receipt = ledger.record_play_at(owner, track, 1.0, true, 0).await.unwrap();

        assert!(receipt.outcome.accepted);
        assert!(receipt.author_play);
        let loaded = get_track(&db, track).await.unwrap();
        assert_eq!(loaded.play_count, 0);
        assert_eq!(loaded.author_play_count, 1);
    }

    #[tokio::test]
    async fn test_weight_is_applied() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;

        ledger.record_play_at(Uuid::new_v4(), track, 3.0, false, 0).await.unwrap();
        assert_eq!(get_track(&db, track).await.unwrap().play_count, 3);
    }

    #[tokio::test]
    async fn test_invalid_weight_and_missing_track() {
        let (ledger, _db, track) = setup(Uuid::new_v4()).await;
        let viewer = Uuid::new_v4();

        assert!(matches!(
            ledger.record_play_at(viewer, track, 0.0, false, 0).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ledger.record_play_at(viewer, Uuid::new_v4(), 1.0, false, 0).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_first_plays_count_once() {
        let (ledger, db, track) = setup(Uuid::new_v4()).await;
        let ledger = Arc::new(ledger);
        let viewer = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_play_at(viewer, track, 1.0, false, 1_000).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().outcome.accepted {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(get_track(&db, track).await.unwrap().play_count, 1);
        assert_eq!(ledger.locks.len(), 0);
    }
}

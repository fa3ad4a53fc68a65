//! Player arena: one playback handle per track, keyed by track id
//!
//! Only the scheduler task mutates the arena. Handles are created and
//! dropped when the feed is reconciled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fp_common::{FeedTrack, TrackId};
use tokio::time::Instant;

use crate::feed::Feed;

/// Control surface of one media element
pub trait PlaybackHandle: Send {
    fn play(&mut self);

    fn pause(&mut self);

    /// Move the playhead, in seconds
    fn seek(&mut self, offset_seconds: f64);

    /// Current playhead, in seconds
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Creates handles for tracks entering the feed
pub trait HandleFactory: Send {
    fn create(&mut self, track: &FeedTrack) -> Box<dyn PlaybackHandle>;
}

/// Observable state of a simulated handle
#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub playing: bool,
    pub base_position: f64,
    pub started_at: Option<Instant>,
    pub play_calls: u32,
}

impl SimState {
    pub fn position(&self) -> f64 {
        match (self.playing, self.started_at) {
            (true, Some(start)) => self.base_position + start.elapsed().as_secs_f64(),
            _ => self.base_position,
        }
    }
}

/// Clock-driven stand-in for a media element
///
/// Position advances with `tokio::time`, so paused-clock tests are exact.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn state(&self) -> SimState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlaybackHandle for SimulatedHandle {
    fn play(&mut self) {
        let mut state = self.lock();
        if !state.playing {
            state.playing = true;
            state.started_at = Some(Instant::now());
        }
        state.play_calls += 1;
    }

    fn pause(&mut self) {
        let mut state = self.lock();
        state.base_position = state.position();
        state.playing = false;
        state.started_at = None;
    }

    fn seek(&mut self, offset_seconds: f64) {
        let mut state = self.lock();
        state.base_position = offset_seconds.max(0.0);
        if state.playing {
            state.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        self.lock().position()
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }
}

/// Factory for simulated handles that keeps a shared view of each created handle
#[derive(Debug, Clone, Default)]
pub struct SimulatedFactory {
    created: Arc<Mutex<HashMap<TrackId, SimulatedHandle>>>,
}

impl SimulatedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the handle created for `track`
    pub fn created(&self, track: TrackId) -> Option<SimulatedHandle> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&track)
            .cloned()
    }
}

impl HandleFactory for SimulatedFactory {
    fn create(&mut self, track: &FeedTrack) -> Box<dyn PlaybackHandle> {
        let handle = SimulatedHandle::new();
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(track.id, handle.clone());
        Box::new(handle)
    }
}

/// Handles for every track of the current feed
pub struct PlayerArena {
    handles: HashMap<TrackId, Box<dyn PlaybackHandle>>,
    factory: Box<dyn HandleFactory>,
}

impl PlayerArena {
    pub fn new(factory: Box<dyn HandleFactory>) -> Self {
        Self {
            handles: HashMap::new(),
            factory,
        }
    }

    /// Create handles for new tracks and drop handles of removed ones
    ///
    /// Returns the ids whose handles were dropped.
    pub fn reconcile(&mut self, feed: &Feed) -> Vec<TrackId> {
        let removed: Vec<TrackId> = self
            .handles
            .keys()
            .filter(|id| !feed.contains(**id))
            .copied()
            .collect();

        for id in &removed {
            if let Some(mut handle) = self.handles.remove(id) {
                handle.pause();
            }
        }

        for track in feed.tracks() {
            if !self.handles.contains_key(&track.id) {
                let handle = self.factory.create(track);
                self.handles.insert(track.id, handle);
            }
        }

        removed
    }

    pub fn get_mut(&mut self, track: TrackId) -> Option<&mut (dyn PlaybackHandle + 'static)> {
        self.handles.get_mut(&track).map(|h| h.as_mut())
    }

    pub fn position(&self, track: TrackId) -> Option<f64> {
        self.handles.get(&track).map(|h| h.position())
    }

    /// Pause and rewind every audible handle except `keep`
    pub fn silence_others(&mut self, keep: TrackId) {
        for (id, handle) in self.handles.iter_mut() {
            if *id != keep && handle.is_playing() {
                handle.pause();
                handle.seek(0.0);
            }
        }
    }

    /// Number of handles currently producing audio
    pub fn audible_count(&self) -> usize {
        self.handles.values().filter(|h| h.is_playing()).count()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fp_common::FeedOrdering;
    use std::time::Duration;
    use uuid::Uuid;

    fn track(title: &str) -> FeedTrack {
        FeedTrack {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            audio_url: format!("/media/{}.mp3", title),
            image_url: format!("/media/{}.jpg", title),
            video_url: None,
            username: "bob".to_string(),
            user_uuid: Uuid::new_v4(),
            created_at: 0,
            likes: 0,
            play_count: 0,
            author_play_count: 0,
            liked_by_user: false,
            score: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_position_follows_clock() {
        let mut handle = SimulatedHandle::new();
        handle.seek(10.0);
        handle.play();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!((handle.position() - 13.0).abs() < 1e-6);

        handle.pause();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!((handle.position() - 13.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reconcile_adds_and_drops() {
        let a = track("a");
        let b = track("b");
        let c = track("c");
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        let mut arena = PlayerArena::new(Box::new(SimulatedFactory::new()));
        assert!(arena.reconcile(&Feed::new(vec![a.clone(), b], FeedOrdering::Alphabetical)).is_empty());
        assert_eq!(arena.len(), 2);

        let removed = arena.reconcile(&Feed::new(vec![a, c], FeedOrdering::Alphabetical));
        assert_eq!(removed, vec![b_id]);
        assert!(arena.get_mut(a_id).is_some());
        assert!(arena.get_mut(c_id).is_some());
        assert!(arena.get_mut(b_id).is_none());
    }

    #[tokio::test]
    async fn test_silence_others_rewinds() {
        let a = track("a");
        let b = track("b");
        let (a_id, b_id) = (a.id, b.id);
        let factory = SimulatedFactory::new();
        let mut arena = PlayerArena::new(Box::new(factory.clone()));
        arena.reconcile(&Feed::new(vec![a, b], FeedOrdering::Alphabetical));

        {
            let handle = arena.get_mut(a_id).unwrap();
            handle.seek(30.0);
            handle.play();
        }
        arena.silence_others(b_id);

        let handle = factory.created(a_id).unwrap();
        assert!(!handle.state().playing);
        assert_eq!(handle.state().base_position, 0.0);
        assert_eq!(arena.audible_count(), 0);
    }
}

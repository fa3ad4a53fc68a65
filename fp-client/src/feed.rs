//! Client-side feed projection

use fp_common::ranking::{matches_query, sort_feed};
use fp_common::{FeedOrdering, FeedTrack, TrackId};

/// Direction for adjacent-track navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Ordered, read-only projection of the server feed
#[derive(Debug, Clone, Default)]
pub struct Feed {
    tracks: Vec<FeedTrack>,
    ordering: FeedOrdering,
}

impl Feed {
    /// Wrap tracks as served; the server has already ordered them
    pub fn new(tracks: Vec<FeedTrack>, ordering: FeedOrdering) -> Self {
        Self { tracks, ordering }
    }

    /// Switch ordering locally, using the server's comparators
    pub fn reorder(&mut self, ordering: FeedOrdering) {
        sort_feed(&mut self.tracks, ordering);
        self.ordering = ordering;
    }

    /// Tracks whose title or username contains `query`, ignoring case
    ///
    /// Relative order and the active ordering are kept; a blank query
    /// returns the whole feed.
    pub fn filter(&self, query: &str) -> Feed {
        Feed {
            tracks: self
                .tracks
                .iter()
                .filter(|t| matches_query(t, query))
                .cloned()
                .collect(),
            ordering: self.ordering,
        }
    }

    pub fn ordering(&self) -> FeedOrdering {
        self.ordering
    }

    pub fn tracks(&self) -> &[FeedTrack] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FeedTrack> {
        self.tracks.get(index)
    }

    pub fn first(&self) -> Option<TrackId> {
        self.tracks.first().map(|t| t.id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Neighbor of `current`, wrapping at both ends
    ///
    /// With no current track (or one no longer in the feed) the first
    /// track is returned. `None` only for an empty feed.
    pub fn adjacent(&self, current: Option<TrackId>, direction: Direction) -> Option<TrackId> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        let Some(index) = current.and_then(|id| self.index_of(id)) else {
            return self.first();
        };

        let next = match direction {
            Direction::Next => (index + 1) % len,
            Direction::Prev => (index + len - 1) % len,
        };
        Some(self.tracks[next].id)
    }
}

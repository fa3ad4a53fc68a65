//! Viewport observer
//!
//! Tracks card geometry along the scroll axis and reports threshold
//! crossings into the scheduler's command queue. A card "enters" when its
//! visible ratio rises to the threshold or above and "leaves" when it falls
//! below. Events from one geometry update are sent in registration order.

use fp_common::TrackId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::validate_threshold;
use crate::error::Result;
use crate::scheduler::SchedulerCommand;

/// Card extent along the scroll axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardBounds {
    pub top: f64,
    pub height: f64,
}

/// Visible window along the scroll axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top: f64,
    pub height: f64,
}

/// A threshold crossing for one card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEvent {
    pub card_id: TrackId,
    pub ratio: f64,
    /// True when crossing upward, false when leaving
    pub entering: bool,
}

#[derive(Debug)]
struct WatchedCard {
    id: TrackId,
    bounds: CardBounds,
    ratio: f64,
    inside: bool,
}

/// Fraction of `card` inside `viewport`, in [0, 1]
pub fn intersection_ratio(card: CardBounds, viewport: Viewport) -> f64 {
    if card.height <= 0.0 {
        return 0.0;
    }
    let top = card.top.max(viewport.top);
    let bottom = (card.top + card.height).min(viewport.top + viewport.height);
    ((bottom - top).max(0.0) / card.height).clamp(0.0, 1.0)
}

pub struct ViewportObserver {
    threshold: f64,
    viewport: Viewport,
    cards: Vec<WatchedCard>,
    tx: mpsc::Sender<SchedulerCommand>,
}

impl ViewportObserver {
    /// Create an observer; `threshold` must be in (0, 1]
    pub fn new(
        threshold: f64,
        viewport: Viewport,
        tx: mpsc::Sender<SchedulerCommand>,
    ) -> Result<Self> {
        Ok(Self {
            threshold: validate_threshold(threshold)?,
            viewport,
            cards: Vec::new(),
            tx,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn observed(&self) -> usize {
        self.cards.len()
    }

    /// Last computed ratio of a watched card
    pub fn ratio(&self, card_id: TrackId) -> Option<f64> {
        self.cards.iter().find(|c| c.id == card_id).map(|c| c.ratio)
    }

    /// Whether the card is currently at or above the threshold
    pub fn is_inside(&self, card_id: TrackId) -> bool {
        self.cards.iter().any(|c| c.id == card_id && c.inside)
    }

    /// Start watching a card, or replace the geometry of one already watched
    pub async fn observe(&mut self, card_id: TrackId, bounds: CardBounds) -> Vec<VisibilityEvent> {
        let ratio = intersection_ratio(bounds, self.viewport);
        match self.cards.iter_mut().find(|c| c.id == card_id) {
            Some(card) => card.bounds = bounds,
            None => self.cards.push(WatchedCard {
                id: card_id,
                bounds,
                ratio: 0.0,
                inside: false,
            }),
        }

        let events: Vec<VisibilityEvent> = self.update(card_id, ratio).into_iter().collect();
        self.emit(&events).await;
        events
    }

    /// Stop watching a card
    ///
    /// A card that was inside gets a final leave event; nothing is emitted
    /// for it afterwards.
    pub async fn unobserve(&mut self, card_id: TrackId) -> Option<VisibilityEvent> {
        let index = self.cards.iter().position(|c| c.id == card_id)?;
        let card = self.cards.remove(index);
        if !card.inside {
            return None;
        }

        let event = VisibilityEvent {
            card_id,
            ratio: 0.0,
            entering: false,
        };
        self.emit(&[event]).await;
        Some(event)
    }

    /// Move the viewport and report every resulting crossing
    pub async fn scroll_to(&mut self, top: f64) -> Vec<VisibilityEvent> {
        self.viewport.top = top;
        self.recompute().await
    }

    /// Resize the viewport and report every resulting crossing
    pub async fn resize(&mut self, height: f64) -> Vec<VisibilityEvent> {
        self.viewport.height = height.max(0.0);
        self.recompute().await
    }

    /// Feed a raw ratio for a card, as a platform intersection callback would
    pub async fn report_ratio(&mut self, card_id: TrackId, ratio: f64) -> Vec<VisibilityEvent> {
        if !self.cards.iter().any(|c| c.id == card_id) {
            debug!(%card_id, "Ratio reported for unobserved card, ignoring");
            return Vec::new();
        }
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };

        let events: Vec<VisibilityEvent> = self.update(card_id, ratio).into_iter().collect();
        self.emit(&events).await;
        events
    }

    async fn recompute(&mut self) -> Vec<VisibilityEvent> {
        let viewport = self.viewport;
        let updates: Vec<(TrackId, f64)> = self
            .cards
            .iter()
            .map(|c| (c.id, intersection_ratio(c.bounds, viewport)))
            .collect();

        let events: Vec<VisibilityEvent> = updates
            .into_iter()
            .filter_map(|(id, ratio)| self.update(id, ratio))
            .collect();
        self.emit(&events).await;
        events
    }

    /// Store a new ratio and return the crossing it causes, if any
    fn update(&mut self, card_id: TrackId, ratio: f64) -> Option<VisibilityEvent> {
        let threshold = self.threshold;
        let card = self.cards.iter_mut().find(|c| c.id == card_id)?;
        card.ratio = ratio;

        let now_inside = ratio >= threshold;
        if now_inside == card.inside {
            return None;
        }
        card.inside = now_inside;

        Some(VisibilityEvent {
            card_id,
            ratio,
            entering: now_inside,
        })
    }

    async fn emit(&self, events: &[VisibilityEvent]) {
        for event in events {
            debug!(
                card_id = %event.card_id,
                ratio = event.ratio,
                entering = event.entering,
                "Visibility crossing"
            );
            if self.tx.send(SchedulerCommand::Visibility(*event)).await.is_err() {
                warn!("Scheduler queue closed, dropping visibility events");
                return;
            }
        }
    }
}

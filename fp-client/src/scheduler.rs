//! Playback scheduler
//!
//! Single owner of "what is audible now". Runs as one tokio task draining
//! one command queue: visibility crossings, user actions, timer firings and
//! finished network calls all arrive as `SchedulerCommand`s, so transitions
//! never interleave.
//!
//! Every entry into `Playing` opens a new play epoch. Network results and
//! timer firings carry the epoch they were started under and are dropped
//! when it no longer matches, so a slow resume fetch for a previous track
//! can never seek the current one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use fp_common::TrackId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::FeedApi;
use crate::arena::{HandleFactory, PlayerArena};
use crate::config::SchedulerConfig;
use crate::error::{ClientError, Result};
use crate::feed::{Direction, Feed};
use crate::observer::VisibilityEvent;

/// Audible state of the feed player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing {
        track: TrackId,
        /// True when started by a user action rather than by scrolling
        manual: bool,
    },
    Paused {
        track: TrackId,
    },
}

impl PlaybackState {
    pub fn current(&self) -> Option<TrackId> {
        match *self {
            PlaybackState::Idle => None,
            PlaybackState::Playing { track, .. } | PlaybackState::Paused { track } => Some(track),
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}

/// Published after every processed command
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub feed_len: usize,
    /// Cards carrying the transient double-tap flag, in feed order
    pub flagged: Vec<TrackId>,
    pub epoch: u64,
    /// True while the current track waits for its resume offset
    pub awaiting_resume: bool,
}

/// Messages consumed by the scheduler task
#[derive(Debug)]
pub enum SchedulerCommand {
    Visibility(VisibilityEvent),
    Play(TrackId),
    Pause,
    Resume,
    Next,
    Prev,
    /// Move the playhead of the current track, in seconds
    Seek(f64),
    Stop,
    /// The media element of a track reached its end
    Ended(TrackId),
    DoubleTap(TrackId),
    SetFeed(Feed),
    Shutdown,
    /// Posted back by the scheduler's own timers and network tasks
    Internal(InternalEvent),
}

/// Opaque completion event; only the scheduler creates these
#[derive(Debug)]
pub struct InternalEvent(Internal);

#[derive(Debug)]
enum Internal {
    AutoplayDue {
        track: TrackId,
        token: u64,
    },
    ResumeFetched {
        epoch: u64,
        track: TrackId,
        offset: Option<f64>,
    },
    PersistTick {
        epoch: u64,
    },
    ClearFlag {
        track: TrackId,
        token: u64,
    },
}

struct PendingAutoplay {
    track: TrackId,
    token: u64,
    task: JoinHandle<()>,
}

/// Caller side of a running scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
    snapshot: watch::Receiver<PlayerSnapshot>,
}

impl SchedulerHandle {
    /// Queue sender, for the viewport observer
    pub fn sender(&self) -> mpsc::Sender<SchedulerCommand> {
        self.tx.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub async fn send(&self, command: SchedulerCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ClientError::SchedulerClosed)
    }

    pub async fn play(&self, track: TrackId) -> Result<()> {
        self.send(SchedulerCommand::Play(track)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(SchedulerCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(SchedulerCommand::Resume).await
    }

    pub async fn next(&self) -> Result<()> {
        self.send(SchedulerCommand::Next).await
    }

    pub async fn prev(&self) -> Result<()> {
        self.send(SchedulerCommand::Prev).await
    }

    pub async fn seek(&self, offset_seconds: f64) -> Result<()> {
        self.send(SchedulerCommand::Seek(offset_seconds)).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(SchedulerCommand::Stop).await
    }

    pub async fn ended(&self, track: TrackId) -> Result<()> {
        self.send(SchedulerCommand::Ended(track)).await
    }

    pub async fn double_tap(&self, track: TrackId) -> Result<()> {
        self.send(SchedulerCommand::DoubleTap(track)).await
    }

    pub async fn set_feed(&self, feed: Feed) -> Result<()> {
        self.send(SchedulerCommand::SetFeed(feed)).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SchedulerCommand::Shutdown).await
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    api: Arc<dyn FeedApi>,
    feed: Feed,
    arena: PlayerArena,
    state: PlaybackState,
    /// Set by user-initiated playback, blocks scroll autoplay until stop or end
    manual_active: bool,
    epoch: u64,
    awaiting_resume: bool,
    visible: HashSet<TrackId>,
    pending_autoplay: Option<PendingAutoplay>,
    persist_task: Option<JoinHandle<()>>,
    flags: HashMap<TrackId, u64>,
    next_token: u64,
    self_tx: mpsc::WeakSender<SchedulerCommand>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
}

impl Scheduler {
    /// Start the scheduler task
    ///
    /// The task ends on `Shutdown` or once every `SchedulerHandle` and
    /// observer sender is dropped.
    pub fn spawn(
        config: SchedulerConfig,
        feed: Feed,
        api: Arc<dyn FeedApi>,
        factory: Box<dyn HandleFactory>,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(PlayerSnapshot::default());

        let mut arena = PlayerArena::new(factory);
        arena.reconcile(&feed);

        let scheduler = Scheduler {
            config,
            api,
            feed,
            arena,
            state: PlaybackState::Idle,
            manual_active: false,
            epoch: 0,
            awaiting_resume: false,
            visible: HashSet::new(),
            pending_autoplay: None,
            persist_task: None,
            flags: HashMap::new(),
            next_token: 0,
            self_tx: tx.downgrade(),
            snapshot_tx,
        };
        scheduler.publish();

        let task = tokio::spawn(scheduler.run(rx));
        (
            SchedulerHandle {
                tx,
                snapshot: snapshot_rx,
            },
            task,
        )
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SchedulerCommand>) {
        info!(feed_len = self.feed.len(), "Playback scheduler started");

        while let Some(command) = rx.recv().await {
            if matches!(command, SchedulerCommand::Shutdown) {
                break;
            }
            self.handle(command);
            self.publish();
        }

        self.shutdown().await;
        info!("Playback scheduler stopped");
    }

    fn handle(&mut self, command: SchedulerCommand) {
        match command {
            SchedulerCommand::Visibility(event) => self.on_visibility(event),
            SchedulerCommand::Play(track) => {
                self.cancel_autoplay();
                self.on_play(track);
            }
            SchedulerCommand::Pause => {
                self.cancel_autoplay();
                self.on_pause();
            }
            SchedulerCommand::Resume => {
                self.cancel_autoplay();
                self.on_resume();
            }
            SchedulerCommand::Next => {
                self.cancel_autoplay();
                self.on_adjacent(Direction::Next);
            }
            SchedulerCommand::Prev => {
                self.cancel_autoplay();
                self.on_adjacent(Direction::Prev);
            }
            SchedulerCommand::Seek(offset) => self.on_seek(offset),
            SchedulerCommand::Stop => {
                self.cancel_autoplay();
                self.on_stop();
            }
            SchedulerCommand::Ended(track) => self.on_ended(track),
            SchedulerCommand::DoubleTap(track) => {
                self.cancel_autoplay();
                self.on_double_tap(track);
            }
            SchedulerCommand::SetFeed(feed) => self.on_set_feed(feed),
            SchedulerCommand::Internal(InternalEvent(event)) => self.on_internal(event),
            SchedulerCommand::Shutdown => {}
        }
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    fn on_visibility(&mut self, event: VisibilityEvent) {
        let card = event.card_id;
        if !self.feed.contains(card) {
            return;
        }

        if event.entering {
            self.visible.insert(card);
            self.maybe_schedule_autoplay(card);
            return;
        }

        self.visible.remove(&card);
        if self.pending_autoplay.as_ref().is_some_and(|p| p.track == card) {
            debug!(%card, "Card left before autoplay debounce elapsed");
            self.cancel_autoplay();
        }

        // Manual playback is never paused by scrolling
        if self.state == (PlaybackState::Playing { track: card, manual: false }) {
            info!(track = %card, "Auto-started track left viewport, pausing");
            self.pause_current();
            if let Some(candidate) = self.first_visible_candidate() {
                self.maybe_schedule_autoplay(candidate);
            }
        }
    }

    fn on_play(&mut self, track: TrackId) {
        match self.state {
            PlaybackState::Playing { track: current, .. } if current == track => {
                // Already audible; the user takes ownership of it
                self.state = PlaybackState::Playing {
                    track,
                    manual: true,
                };
                self.manual_active = true;
            }
            PlaybackState::Paused { track: current } if current == track => self.on_resume(),
            _ => self.start_playing(track, true),
        }
    }

    fn on_pause(&mut self) {
        if self.state.is_playing() {
            self.pause_current();
        }
    }

    /// Continue the paused track within the same play epoch
    fn on_resume(&mut self) {
        let PlaybackState::Paused { track } = self.state else {
            return;
        };

        self.arena.silence_others(track);
        self.state = PlaybackState::Playing {
            track,
            manual: true,
        };
        self.manual_active = true;
        if !self.awaiting_resume {
            if let Some(handle) = self.arena.get_mut(track) {
                handle.play();
            }
        }
        self.start_persist_timer();
        info!(%track, "Playback resumed");
    }

    fn on_adjacent(&mut self, direction: Direction) {
        match self.feed.adjacent(self.state.current(), direction) {
            Some(target) => self.start_playing(target, true),
            None => debug!("Adjacent navigation on empty feed ignored"),
        }
    }

    fn on_seek(&mut self, offset: f64) {
        let Some(track) = self.state.current() else {
            return;
        };
        if !offset.is_finite() || offset < 0.0 {
            warn!(offset, "Ignoring invalid seek offset");
            return;
        }

        // An explicit seek supersedes the pending resume offset
        let was_awaiting = std::mem::replace(&mut self.awaiting_resume, false);
        if let Some(handle) = self.arena.get_mut(track) {
            handle.seek(offset);
            if was_awaiting && self.state.is_playing() {
                handle.play();
            }
        }
        self.persist(track);
    }

    fn on_stop(&mut self) {
        if let Some(track) = self.state.current() {
            self.persist(track);
            if let Some(handle) = self.arena.get_mut(track) {
                handle.pause();
            }
            info!(%track, "Playback stopped");
        }
        self.go_idle();
    }

    fn on_ended(&mut self, track: TrackId) {
        let PlaybackState::Playing { track: current, manual } = self.state else {
            return;
        };
        if current != track {
            debug!(%track, "Ended event for non-current track ignored");
            return;
        }

        // A finished track resumes from the start next time
        if let Some(handle) = self.arena.get_mut(track) {
            handle.pause();
            handle.seek(0.0);
        }
        self.awaiting_resume = false;
        self.persist(track);

        if manual {
            info!(%track, "Manual playback ended");
            self.go_idle();
            return;
        }

        match self.feed.adjacent(Some(track), Direction::Next) {
            Some(next) => {
                info!(from = %track, to = %next, "Auto-advancing to next track");
                self.start_playing(next, false);
            }
            None => self.go_idle(),
        }
    }

    fn on_double_tap(&mut self, track: TrackId) {
        if !self.feed.contains(track) {
            return;
        }
        let token = self.take_token();
        self.flags.insert(track, token);
        self.post_after(
            self.config.double_tap_ttl(),
            Internal::ClearFlag { track, token },
        );
        self.on_play(track);
    }

    fn on_set_feed(&mut self, feed: Feed) {
        self.feed = feed;
        let removed = self.arena.reconcile(&self.feed);

        for id in &removed {
            self.visible.remove(id);
            self.flags.remove(id);
        }
        if self
            .pending_autoplay
            .as_ref()
            .is_some_and(|p| removed.contains(&p.track))
        {
            self.cancel_autoplay();
        }

        if let Some(current) = self.state.current() {
            if removed.contains(&current) {
                info!(track = %current, "Current track left the feed, stopping");
                self.go_idle();
                // Outstanding fetches belong to a track that no longer exists
                self.epoch += 1;
            }
        }
        debug!(feed_len = self.feed.len(), removed = removed.len(), "Feed replaced");
    }

    fn on_internal(&mut self, event: Internal) {
        match event {
            Internal::AutoplayDue { track, token } => {
                if self.pending_autoplay.as_ref().map(|p| p.token) != Some(token) {
                    return;
                }
                self.pending_autoplay = None;
                if self.autoplay_allowed(track) && self.visible.contains(&track) {
                    self.start_playing(track, false);
                }
            }
            Internal::ResumeFetched {
                epoch,
                track,
                offset,
            } => {
                if epoch != self.epoch || self.state.current() != Some(track) || !self.awaiting_resume {
                    debug!(%track, epoch, current_epoch = self.epoch, "Discarding stale resume offset");
                    return;
                }
                self.awaiting_resume = false;
                let offset = offset.unwrap_or(0.0);
                let playing = self.state.is_playing();
                if let Some(handle) = self.arena.get_mut(track) {
                    handle.seek(offset);
                    if playing {
                        handle.play();
                    }
                }
                debug!(%track, offset, "Resume offset applied");
            }
            Internal::PersistTick { epoch } => {
                if epoch != self.epoch {
                    return;
                }
                if let PlaybackState::Playing { track, .. } = self.state {
                    self.persist(track);
                }
            }
            Internal::ClearFlag { track, token } => {
                if self.flags.get(&track) == Some(&token) {
                    self.flags.remove(&track);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Enter `Playing` for `track` under a new play epoch
    fn start_playing(&mut self, track: TrackId, manual: bool) {
        if !self.feed.contains(track) {
            warn!(%track, "Cannot play a track outside the feed");
            return;
        }

        if let Some(previous) = self.state.current() {
            if previous != track {
                self.persist(previous);
            }
        }
        self.cancel_autoplay();
        self.cancel_persist_timer();

        self.arena.silence_others(track);
        if let Some(handle) = self.arena.get_mut(track) {
            // Held until the resume offset is known
            handle.pause();
        }

        self.epoch += 1;
        self.state = PlaybackState::Playing { track, manual };
        self.manual_active = manual;
        self.awaiting_resume = true;

        info!(%track, manual, epoch = self.epoch, "Playback started");

        self.spawn_play_attribution(track, manual);
        self.spawn_resume_fetch(track);
        self.start_persist_timer();
    }

    fn pause_current(&mut self) {
        let PlaybackState::Playing { track, .. } = self.state else {
            return;
        };
        if let Some(handle) = self.arena.get_mut(track) {
            handle.pause();
        }
        self.persist(track);
        self.cancel_persist_timer();
        self.state = PlaybackState::Paused { track };
        info!(%track, "Playback paused");
    }

    fn go_idle(&mut self) {
        self.cancel_persist_timer();
        self.state = PlaybackState::Idle;
        self.manual_active = false;
        self.awaiting_resume = false;
    }

    fn autoplay_allowed(&self, track: TrackId) -> bool {
        !self.manual_active && !self.state.is_playing() && self.state.current() != Some(track)
    }

    fn maybe_schedule_autoplay(&mut self, track: TrackId) {
        // First entering card wins
        if self.pending_autoplay.is_some() || !self.autoplay_allowed(track) {
            return;
        }

        let token = self.take_token();
        let task = self.post_after(
            self.config.autoplay_debounce(),
            Internal::AutoplayDue { track, token },
        );
        self.pending_autoplay = Some(PendingAutoplay { track, token, task });
        debug!(%track, "Autoplay scheduled");
    }

    fn cancel_autoplay(&mut self) {
        if let Some(pending) = self.pending_autoplay.take() {
            pending.task.abort();
        }
    }

    /// First visible card in feed order that could autoplay
    fn first_visible_candidate(&self) -> Option<TrackId> {
        self.feed
            .tracks()
            .iter()
            .map(|t| t.id)
            .find(|id| self.visible.contains(id) && self.autoplay_allowed(*id))
    }

    fn take_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Push the current offset of `track` to the resume store
    fn persist(&mut self, track: TrackId) {
        // Before the resume offset lands the handle sits at 0
        if self.awaiting_resume && self.state.current() == Some(track) {
            return;
        }
        let Some(offset) = self.arena.position(track) else {
            return;
        };

        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.set_position(track, offset).await {
                warn!(%track, offset, "Failed to persist playback position: {}", e);
            }
        });
    }

    fn spawn_play_attribution(&self, track: TrackId, manual: bool) {
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.record_play(track, manual).await {
                Ok(outcome) => debug!(%track, accepted = outcome.accepted, "Play attributed"),
                Err(e) => warn!(%track, "Failed to record play: {}", e),
            }
        });
    }

    fn spawn_resume_fetch(&self, track: TrackId) {
        let api = self.api.clone();
        let weak = self.self_tx.clone();
        let epoch = self.epoch;
        let timeout = self.config.resume_timeout();

        tokio::spawn(async move {
            let offset = match tokio::time::timeout(timeout, api.get_position(track)).await {
                Ok(Ok(offset)) => Some(offset),
                Ok(Err(e)) => {
                    warn!(%track, "Resume offset fetch failed, starting from 0: {}", e);
                    None
                }
                Err(_) => {
                    warn!(%track, ?timeout, "Resume offset fetch timed out, starting from 0");
                    None
                }
            };

            if let Some(tx) = weak.upgrade() {
                let event = Internal::ResumeFetched {
                    epoch,
                    track,
                    offset,
                };
                let _ = tx.send(SchedulerCommand::Internal(InternalEvent(event))).await;
            }
        });
    }

    fn start_persist_timer(&mut self) {
        self.cancel_persist_timer();

        let weak = self.self_tx.clone();
        let epoch = self.epoch;
        let period = self.config.persist_interval();

        self.persist_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(tx) = weak.upgrade() else {
                    break;
                };
                let tick = SchedulerCommand::Internal(InternalEvent(Internal::PersistTick { epoch }));
                if tx.send(tick).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn cancel_persist_timer(&mut self) {
        if let Some(task) = self.persist_task.take() {
            task.abort();
        }
    }

    fn post_after(&self, delay: Duration, event: Internal) -> JoinHandle<()> {
        let weak = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(SchedulerCommand::Internal(InternalEvent(event))).await;
            }
        })
    }

    fn publish(&self) {
        let flagged = self
            .feed
            .tracks()
            .iter()
            .map(|t| t.id)
            .filter(|id| self.flags.contains_key(id))
            .collect();

        let snapshot = PlayerSnapshot {
            state: self.state,
            feed_len: self.feed.len(),
            flagged,
            epoch: self.epoch,
            awaiting_resume: self.awaiting_resume,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Flush the current offset and silence everything
    async fn shutdown(&mut self) {
        self.cancel_autoplay();
        self.cancel_persist_timer();

        if let Some(track) = self.state.current() {
            if !self.awaiting_resume {
                if let Some(offset) = self.arena.position(track) {
                    let write = self.api.set_position(track, offset);
                    match tokio::time::timeout(self.config.resume_timeout(), write).await {
                        Ok(Ok(())) => debug!(%track, offset, "Final position persisted"),
                        Ok(Err(e)) => warn!(%track, "Failed to persist final position: {}", e),
                        Err(_) => warn!(%track, "Timed out persisting final position"),
                    }
                }
            }
            if let Some(handle) = self.arena.get_mut(track) {
                handle.pause();
            }
        }
        self.go_idle();
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_state_current() {
        let t = Uuid::new_v4();
        assert_eq!(PlaybackState::Idle.current(), None);
        assert_eq!(PlaybackState::Playing { track: t, manual: false }.current(), Some(t));
        assert_eq!(PlaybackState::Paused { track: t }.current(), Some(t));
        assert!(!PlaybackState::Paused { track: t }.is_playing());
    }

    #[test]
    fn test_snapshot_default_is_idle() {
        let snapshot = PlayerSnapshot::default();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.flagged.is_empty());
    }
}

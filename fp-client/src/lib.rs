//! # Feedplay client engine
//!
//! Headless playback engine for the scrolling feed:
//! - `observer`: viewport geometry to visibility crossings
//! - `scheduler`: single-audible-track state machine fed by one command queue
//! - `arena`: playback handles keyed by track id
//! - `api` / `session`: HTTP access to the feed server with an explicit session

pub mod api;
pub mod arena;
pub mod config;
pub mod error;
pub mod feed;
pub mod observer;
pub mod scheduler;
pub mod session;

pub use api::{FeedApi, HttpFeedApi};
pub use arena::{HandleFactory, PlaybackHandle, PlayerArena, SimulatedFactory, SimulatedHandle};
pub use config::SchedulerConfig;
pub use error::{ClientError, Result};
pub use feed::{Direction, Feed};
pub use observer::{CardBounds, Viewport, ViewportObserver, VisibilityEvent};
pub use scheduler::{PlaybackState, PlayerSnapshot, Scheduler, SchedulerCommand, SchedulerHandle};
pub use session::Session;

//! fp-server library - feed, play ledger and resume store over HTTP
//!
//! Routes:
//! - Public: `/health`, `/build_info`, `/events`
//! - Optional bearer: feed listing and single-track fetch
//! - Required bearer: play attribution, like toggle, resume positions

use std::sync::Arc;

use axum::Router;
use fp_common::config::ServerConfig;
use fp_common::events::EventBus;
use fp_common::models::DEFAULT_MAX_PLAY_WEIGHT;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod api;
pub mod db;
pub mod error;
pub mod ledger;
pub mod ranker;
pub mod retry;
pub mod seed;

use ledger::Ledger;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Secret used to verify bearer tokens
    pub shared_secret: i64,
    /// Feed mutation broadcast for SSE subscribers
    pub events: EventBus,
    /// Play attribution with dedup window
    pub ledger: Arc<Ledger>,
}

impl AppState {
    /// Create application state with the default window (24 h), retry budget, bus size and weight bound
    pub fn new(db: SqlitePool, shared_secret: i64) -> Self {
        Self::with_settings(db, shared_secret, 24, 3, 256, DEFAULT_MAX_PLAY_WEIGHT)
    }

    /// Create application state from resolved server configuration
    pub fn from_config(db: SqlitePool, shared_secret: i64, config: &ServerConfig) -> Self {
        Self::with_settings(
            db,
            shared_secret,
            config.dedup_window_hours,
            config.ledger_max_attempts,
            config.event_capacity,
            config.max_play_weight,
        )
    }

    fn with_settings(
        db: SqlitePool,
        shared_secret: i64,
        window_hours: u32,
        max_attempts: u32,
        event_capacity: usize,
        max_play_weight: f64,
    ) -> Self {
        let ledger = Arc::new(
            Ledger::new(db.clone(), window_hours, max_attempts).with_max_weight(max_play_weight),
        );
        Self {
            db,
            shared_secret,
            events: EventBus::new(event_capacity),
            ledger,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Bearer required
    let protected = Router::new()
        .route("/publications/:id/play", post(api::record_play))
        .route("/publications/:id/like", post(api::toggle_like))
        .route(
            "/playback/:pub_id",
            post(api::save_position).get(api::get_position),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_viewer,
        ));

    // Bearer optional; personalizes likedByUser
    let feed = Router::new()
        .route("/publications", get(api::list_publications))
        .route("/publications/:id", get(api::get_publication))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::optional_viewer,
        ));

    // No authentication
    let public = Router::new()
        .route("/events", get(api::event_stream))
        .route("/build_info", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(feed)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

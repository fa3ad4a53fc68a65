//! HTTP client for the feed server
//!
//! `FeedApi` is the seam between the scheduler and the network so the
//! scheduler can be driven by an in-memory implementation in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fp_common::models::{
    LikeAction, LikeResponse, PlayRequest, PlayResponse, PlaybackPositionBody,
};
use fp_common::{FeedOrdering, FeedTrack, PlayOutcome, TrackId};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::session::Session;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Operations the client engine needs from the server
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn list_feed(&self, ordering: FeedOrdering) -> Result<Vec<FeedTrack>>;

    async fn record_play(&self, track: TrackId, is_manual: bool) -> Result<PlayOutcome>;

    async fn get_position(&self, track: TrackId) -> Result<f64>;

    async fn set_position(&self, track: TrackId, offset_seconds: f64) -> Result<()>;

    async fn toggle_like(&self, track: TrackId) -> Result<LikeAction>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// `FeedApi` over reqwest
pub struct HttpFeedApi {
    http_client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl HttpFeedApi {
    pub fn new(base_url: impl Into<String>, session: Arc<Session>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("fp-client/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));
        match self.session.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fail fast when an authenticated endpoint is called without a valid session
    fn require_session(&self) -> Result<()> {
        if self.session.bearer().is_some() {
            Ok(())
        } else {
            Err(ClientError::Unauthorized("No valid session".to_string()))
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()));
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                self.session.invalidate();
                ClientError::Unauthorized(message)
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::BAD_REQUEST => ClientError::InvalidInput(message),
            s if s.is_server_error() => ClientError::Transient(format!("{}: {}", s, message)),
            s => ClientError::Api(s.as_u16(), message),
        })
    }
}

#[async_trait]
impl FeedApi for HttpFeedApi {
    async fn list_feed(&self, ordering: FeedOrdering) -> Result<Vec<FeedTrack>> {
        let builder = self
            .request(Method::GET, "/publications")
            .query(&[("sort", ordering.to_string())]);
        let feed: Vec<FeedTrack> = self.send(builder).await?;
        tracing::debug!(count = feed.len(), %ordering, "Fetched feed");
        Ok(feed)
    }

    async fn record_play(&self, track: TrackId, is_manual: bool) -> Result<PlayOutcome> {
        self.require_session()?;
        let builder = self
            .request(Method::POST, &format!("/publications/{}/play", track))
            .json(&PlayRequest {
                is_manual: Some(is_manual),
                weight: None,
            });
        let response: PlayResponse = self.send(builder).await?;
        Ok(PlayOutcome {
            accepted: response.accepted,
        })
    }

    async fn get_position(&self, track: TrackId) -> Result<f64> {
        self.require_session()?;
        let builder = self.request(Method::GET, &format!("/playback/{}", track));
        let body: PlaybackPositionBody = self.send(builder).await?;
        Ok(body.last_position)
    }

    async fn set_position(&self, track: TrackId, offset_seconds: f64) -> Result<()> {
        self.require_session()?;
        let builder = self
            .request(Method::POST, &format!("/playback/{}", track))
            .json(&PlaybackPositionBody {
                last_position: offset_seconds,
            });
        let _: serde_json::Value = self.send(builder).await?;
        Ok(())
    }

    async fn toggle_like(&self, track: TrackId) -> Result<LikeAction> {
        self.require_session()?;
        let builder = self.request(Method::POST, &format!("/publications/{}/like", track));
        let response: LikeResponse = self.send(builder).await?;
        Ok(response.action)
    }
}

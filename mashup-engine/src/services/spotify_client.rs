//! Spotify Web API client
//!
//! Implements both acoustic-data collaborators:
//! - [`SourceResolver`]: album/playlist track listing with transparent paging
//! - [`SectionFetcher`]: per-track audio analysis sections
//!
//! Authenticates with the client-credentials flow and caches the bearer token
//! until shortly before it expires. All requests pass through one `governor`
//! rate limiter. Throttling (HTTP 429) is reported, never retried here.

use super::section_fetcher::AudioAnalysis;
use crate::error::ServiceError;
use crate::types::{SectionFetcher, SectionProps, SourceResolver, SourceType};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use mashup_common::config::TomlConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("mashup-engine/", env!("CARGO_PKG_VERSION"));

/// Spotify's maximum page size for album tracks
pub const ALBUM_PAGE_SIZE: u32 = 50;
/// Spotify's maximum page size for playlist items
pub const PLAYLIST_PAGE_SIZE: u32 = 100;

/// Tokens are refreshed this long before their stated expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// Wire types
// ============================================================================

/// One page of a paginated listing
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Entries may be null (e.g. tracks removed from a playlist)
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    /// Absolute URL of the following page
    pub next: Option<String>,
}

/// Item of `GET /albums/{id}/tracks`
#[derive(Debug, Deserialize)]
pub struct AlbumTrackItem {
    pub id: Option<String>,
}

/// Item of `GET /playlists/{id}/tracks`
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<PlaylistTrack>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTrack {
    /// Local files have no id
    pub id: Option<String>,
}

/// Listing entries that may or may not carry a track id
pub trait PageItem {
    fn into_track_id(self) -> Option<String>;
}

impl PageItem for AlbumTrackItem {
    fn into_track_id(self) -> Option<String> {
        self.id
    }
}

impl PageItem for PlaylistItem {
    fn into_track_id(self) -> Option<String> {
        self.track.and_then(|t| t.id)
    }
}

/// Track ids on a page, dropping null entries and entries without an id
pub fn page_track_ids<T: PageItem>(items: Vec<Option<T>>) -> Vec<String> {
    items
        .into_iter()
        .flatten()
        .filter_map(PageItem::into_track_id)
        .filter(|id| !id.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    refresh_at: Instant,
}

// ============================================================================
// Client
// ============================================================================

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    api_base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SpotifyClient {
    pub fn new(
        client_id: String,
        client_secret: String,
        api_base_url: String,
        token_url: String,
        requests_per_second: NonZeroU32,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            token_url,
            client_id,
            client_secret,
            token: Mutex::new(None),
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        })
    }

    /// Build from bootstrap configuration (credentials must be present)
    pub fn from_config(config: &TomlConfig) -> Result<Self, ServiceError> {
        let (client_id, client_secret) = config
            .spotify_credentials()
            .map_err(|e| ServiceError::AuthError(e.to_string()))?;
        let rps = NonZeroU32::new(config.spotify.requests_per_second)
            .ok_or_else(|| ServiceError::AuthError("requests_per_second must be non-zero".to_string()))?;

        Self::new(
            client_id,
            client_secret,
            config.spotify.api_base_url.clone(),
            config.spotify.token_url.clone(),
            rps,
            Duration::from_secs(config.spotify.timeout_secs),
        )
    }

    /// Current bearer token, fetching a new one if missing or near expiry
    async fn access_token(&self) -> Result<String, ServiceError> {
        let mut token = self.token.lock().await;

        if let Some(cached) = token.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!(url = %self.token_url, "Requesting Spotify access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::AuthError(format!("{}: {}", status.as_u16(), error_text)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ParseError(e.to_string()))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *token = Some(AccessToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        tracing::info!(expires_in = body.expires_in, "Obtained Spotify access token");
        Ok(body.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Rate-limited authenticated GET returning parsed JSON
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        self.rate_limiter.until_ready().await;
        let token = self.access_token().await?;

        tracing::debug!(url = %url, "Querying Spotify API");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 {
            self.invalidate_token().await;
            return Err(ServiceError::AuthError("access token rejected".to_string()));
        }

        if status == 404 {
            return Err(ServiceError::NotFound(url.to_string()));
        }

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(ServiceError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ParseError(e.to_string()))
    }

    /// Follow `next` links from `first_url`, flattening track ids
    async fn collect_track_ids<T>(&self, first_url: String) -> Result<Vec<String>, ServiceError>
    where
        T: PageItem + DeserializeOwned,
    {
        let mut track_ids = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0usize;

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            pages += 1;
            track_ids.extend(page_track_ids(page.items));
            next = page.next;
        }

        tracing::debug!(pages, tracks = track_ids.len(), "Listing fully paged");
        Ok(track_ids)
    }

    fn album_tracks_url(&self, album_id: &str) -> String {
        format!(
            "{}/albums/{}/tracks?limit={}&offset=0",
            self.api_base_url, album_id, ALBUM_PAGE_SIZE
        )
    }

    fn playlist_tracks_url(&self, playlist_id: &str) -> String {
        format!(
            "{}/playlists/{}/tracks?limit={}&offset=0&fields=items(track(id)),next",
            self.api_base_url, playlist_id, PLAYLIST_PAGE_SIZE
        )
    }

    fn audio_analysis_url(&self, track_id: &str) -> String {
        format!("{}/audio-analysis/{}", self.api_base_url, track_id)
    }
}

#[async_trait]
impl SourceResolver for SpotifyClient {
    async fn resolve(
        &self,
        source_id: &str,
        source_type: SourceType,
    ) -> Result<Vec<String>, ServiceError> {
        let track_ids = match source_type {
            SourceType::Album => {
                self.collect_track_ids::<AlbumTrackItem>(self.album_tracks_url(source_id))
                    .await?
            }
            SourceType::Playlist => {
                self.collect_track_ids::<PlaylistItem>(self.playlist_tracks_url(source_id))
                    .await?
            }
        };

        tracing::info!(
            source_id = %source_id,
            source_type = %source_type,
            tracks = track_ids.len(),
            "Resolved source tracks"
        );
        Ok(track_ids)
    }
}

#[async_trait]
impl SectionFetcher for SpotifyClient {
    async fn fetch_sections(&self, track_id: &str) -> Result<Vec<SectionProps>, ServiceError> {
        let analysis: AudioAnalysis = self.get_json(&self.audio_analysis_url(track_id)).await?;
        let sections = analysis.into_sections();

        tracing::debug!(track_id = %track_id, sections = sections.len(), "Fetched audio analysis");
        Ok(sections)
    }
}

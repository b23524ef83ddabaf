//! Core types and collaborator traits for the mashup engine
//!
//! The orchestrator depends only on the traits defined here:
//! - [`SourceResolver`] expands an album/playlist into track ids
//! - [`SectionFetcher`] supplies per-track acoustic sections
//! - [`MashupStore`] persists the generated segment list
//! - [`YieldHook`] is the cooperative fairness point used by the sequencer

use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Data model
// ============================================================================

/// One acoustic segment of a track
///
/// Supplied pre-computed by the acoustic-data service; read-only for a
/// sequencing run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionProps {
    pub start_ms: u32,
    /// Exclusive end offset, always greater than `start_ms`
    pub end_ms: u32,
    /// Average loudness in dB (typically negative)
    pub loudness: f64,
    /// Beats per minute
    pub tempo: f64,
    /// Pitch class 0-11, or -1 when undetected
    pub key: i8,
    /// 1 = major, 0 = minor, -1 = undetected
    pub mode: i8,
    /// Beats per bar
    pub time_signature: u8,
}

/// One segment of the generated mashup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: String,
    pub start_ms: u32,
    /// End offset in ms, or [`TrackInfo::PLAY_TO_END`]
    pub end_ms: i32,
}

impl TrackInfo {
    /// Sentinel end offset meaning "play to end of track"
    pub const PLAY_TO_END: i32 = -1;

    pub fn plays_to_end(&self) -> bool {
        self.end_ms == Self::PLAY_TO_END
    }
}

/// Kind of external collection a mashup is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Album,
    Playlist,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Album => "album",
            SourceType::Playlist => "playlist",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized source-type discriminant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSourceType(pub String);

impl fmt::Display for UnknownSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source type: {:?}", self.0)
    }
}

impl std::error::Error for UnknownSourceType {}

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "album" => Ok(SourceType::Album),
            "playlist" => Ok(SourceType::Playlist),
            _ => Err(UnknownSourceType(s.to_string())),
        }
    }
}

/// Container row written before any tracks are added
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMashup {
    pub id: String,
    pub name: String,
    pub seed_track_id: String,
    pub source_id: String,
    pub source_type: SourceType,
}

/// Track row as read back from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTrack {
    pub track_id: String,
    /// Order in which the track was added (0-based)
    pub position: i64,
    pub start_ms: u32,
    pub end_ms: i32,
}

/// Mashup container as read back from storage
#[derive(Debug, Clone)]
pub struct MashupRecord {
    pub id: String,
    pub name: String,
    pub seed_track_id: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Expands a source into a flat, order-insignificant list of track ids
///
/// Implementations paginate transparently and silently drop missing entries.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(
        &self,
        source_id: &str,
        source_type: SourceType,
    ) -> Result<Vec<String>, ServiceError>;
}

/// Retrieves the acoustic sections of one track (one external call per track)
#[async_trait]
pub trait SectionFetcher: Send + Sync {
    async fn fetch_sections(&self, track_id: &str) -> Result<Vec<SectionProps>, ServiceError>;
}

/// Storage port for generated mashups
///
/// Writes are individually committed; nothing here is transactional across calls.
#[async_trait]
pub trait MashupStore: Send + Sync {
    async fn create_mashup(&self, mashup: &NewMashup) -> mashup_common::Result<()>;

    /// Fails if the track is already present or the mashup does not exist
    async fn add_track(&self, mashup_id: &str, track_id: &str) -> mashup_common::Result<()>;

    async fn set_start_ms(
        &self,
        mashup_id: &str,
        track_id: &str,
        start_ms: u32,
    ) -> mashup_common::Result<()>;

    /// Fails if `end_ms < -1`
    async fn set_end_ms(
        &self,
        mashup_id: &str,
        track_id: &str,
        end_ms: i32,
    ) -> mashup_common::Result<()>;

    async fn load_mashup(&self, mashup_id: &str) -> mashup_common::Result<MashupRecord>;

    /// Tracks ordered by position
    async fn load_tracks(&self, mashup_id: &str) -> mashup_common::Result<Vec<StoredTrack>>;
}

/// Cooperative fairness point
///
/// Awaited between units of CPU-bound work. Correctness never depends on
/// what an implementation does here.
#[async_trait]
pub trait YieldHook: Send + Sync {
    async fn yield_now(&self);
}

/// Yields back to the tokio scheduler
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioYield;

#[async_trait]
impl YieldHook for TokioYield {
    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }
}

/// Does nothing; for synchronous test environments
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopYield;

#[async_trait]
impl YieldHook for NoopYield {
    async fn yield_now(&self) {}
}

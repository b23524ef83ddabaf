//! Error types for mashup-engine
//!
//! Each pipeline stage surfaces exactly one [`MashupError`] kind. The
//! `Display` text is safe to show a user; the underlying cause stays reachable
//! through `source()` and is logged where the stage fails.

use crate::types::SourceType;
use thiserror::Error;

/// Acoustic-data service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Sequencer precondition and invariant failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencingError {
    #[error("start track {0} is not among the candidate tracks")]
    StartTrackMissing(String),

    #[error("track {0} has no sections")]
    EmptyTrack(String),

    #[error("{track_ids} track ids but {section_lists} section lists")]
    LengthMismatch {
        track_ids: usize,
        section_lists: usize,
    },

    #[error("track {0} appears more than once")]
    DuplicateTrack(String),

    #[error("spatial index exhausted after {emitted} of {expected} tracks")]
    IndexExhausted { emitted: usize, expected: usize },

    #[error("section end {end_ms}ms of track {track_id} is out of range")]
    EndOutOfRange { track_id: String, end_ms: u32 },
}

/// Errors surfaced by mashup generation
#[derive(Debug, Error)]
pub enum MashupError {
    #[error("Could not load tracks from {source_type} {source_id}")]
    SourceFetch {
        source_id: String,
        source_type: SourceType,
        #[source]
        cause: ServiceError,
    },

    #[error("Unknown source type: {0:?} (expected \"album\" or \"playlist\")")]
    UnknownSourceType(String),

    #[error("Could not fetch audio analysis for track {track_id}")]
    SectionFetch {
        track_id: String,
        #[source]
        cause: ServiceError,
    },

    #[error("Could not arrange the tracks into a mashup")]
    Sequencing(#[source] SequencingError),

    #[error("Could not save mashup: {0}")]
    Persist(#[source] mashup_common::Error),

    #[error("Start track {0:?} cannot be reconciled with the source")]
    StartTrackNotInSource(String),

    #[error("Could not create mashup: {0}")]
    CreateMashup(#[source] mashup_common::Error),
}

impl MashupError {
    /// Stable code callers branch on
    pub fn kind(&self) -> &'static str {
        match self {
            MashupError::SourceFetch { .. } => "SOURCE_FETCH_ERROR",
            MashupError::UnknownSourceType(_) => "UNKNOWN_SOURCE_TYPE",
            MashupError::SectionFetch { .. } => "SECTION_FETCH_ERROR",
            MashupError::Sequencing(_) => "SEQUENCING_ERROR",
            MashupError::Persist(_) => "PERSIST_ERROR",
            MashupError::StartTrackNotInSource(_) => "START_TRACK_NOT_IN_SOURCE",
            MashupError::CreateMashup(_) => "CREATE_MASHUP_ERROR",
        }
    }
}

/// Result type for mashup generation
pub type MashupResult<T> = Result<T, MashupError>;

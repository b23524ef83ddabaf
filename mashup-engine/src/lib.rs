//! mashup-engine library interface
//!
//! Builds a mashup: an ordered run of track segments from an album or
//! playlist where each segment is acoustically close to the one before it.
//!
//! Exposes public APIs for integration testing and for the CLI driver.

pub mod db;
pub mod error;
pub mod sequencer;
pub mod services;
pub mod types;

pub use crate::error::{MashupError, MashupResult, SequencingError, ServiceError};
pub use crate::services::{GenerateRequest, MashupGenerator, MashupOutcome};
pub use crate::types::{SectionProps, SourceType, TrackInfo};

//! Section fetching and batching
//!
//! Converts the service's audio-analysis sections into [`SectionProps`] and
//! fetches many tracks under the batching policy in [`BatchConfig`]:
//! at most `request_amount` calls in flight, `request_interval` between
//! batches. A batch always runs to completion before its first failure is
//! reported, so no fetch is left orphaned.

use crate::error::{MashupError, ServiceError};
use crate::types::{SectionFetcher, SectionProps};
use futures::future::join_all;
use mashup_common::config::BatchConfig;
use serde::Deserialize;
use tracing::{debug, warn};

/// `GET /audio-analysis/{id}` response (only the parts we use)
#[derive(Debug, Deserialize)]
pub struct AudioAnalysis {
    #[serde(default)]
    pub sections: Vec<AnalysisSection>,
}

/// One analysis section; offsets are in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSection {
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub loudness: f64,
    #[serde(default)]
    pub tempo: f64,
    #[serde(default = "undetected")]
    pub key: i32,
    #[serde(default = "undetected")]
    pub mode: i32,
    #[serde(default)]
    pub time_signature: i32,
}

fn undetected() -> i32 {
    -1
}

/// Seconds to whole milliseconds, truncating
fn seconds_to_ms(seconds: f64) -> u32 {
    // float→int casts saturate, so negatives become 0
    (seconds * 1000.0).floor() as u32
}

impl AnalysisSection {
    /// `None` for sections that round to zero length
    pub fn to_section_props(&self) -> Option<SectionProps> {
        let start_ms = seconds_to_ms(self.start);
        let end_ms = seconds_to_ms(self.start + self.duration);
        if end_ms <= start_ms {
            return None;
        }

        Some(SectionProps {
            start_ms,
            end_ms,
            loudness: self.loudness,
            tempo: self.tempo,
            key: i8::try_from(self.key)
                .ok()
                .filter(|k| (0..12).contains(k))
                .unwrap_or(-1),
            mode: i8::try_from(self.mode)
                .ok()
                .filter(|m| *m == 0 || *m == 1)
                .unwrap_or(-1),
            time_signature: u8::try_from(self.time_signature).unwrap_or(0),
        })
    }
}

impl AudioAnalysis {
    pub fn into_sections(self) -> Vec<SectionProps> {
        let total = self.sections.len();
        let sections: Vec<SectionProps> = self
            .sections
            .iter()
            .filter_map(AnalysisSection::to_section_props)
            .collect();
        if sections.len() < total {
            debug!(
                dropped = total - sections.len(),
                "Dropped zero-length analysis sections"
            );
        }
        sections
    }
}

/// Fetch sections for every track, `batch.request_amount` at a time
///
/// Results are parallel-indexed with `track_ids`. On failure the whole
/// current batch is awaited first; the earliest failing track (in input order)
/// is returned and any other failures in that batch are logged.
pub async fn fetch_sections_batched(
    fetcher: &dyn SectionFetcher,
    track_ids: &[String],
    batch: &BatchConfig,
) -> Result<Vec<Vec<SectionProps>>, MashupError> {
    let batch_size = batch.request_amount.max(1);
    let interval = batch.request_interval();
    let mut all_sections = Vec::with_capacity(track_ids.len());

    for (batch_number, chunk) in track_ids.chunks(batch_size).enumerate() {
        if batch_number > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }

        debug!(
            batch = batch_number,
            size = chunk.len(),
            "Fetching section batch"
        );

        let results = join_all(chunk.iter().map(|id| fetcher.fetch_sections(id))).await;

        let mut first_failure: Option<(String, ServiceError)> = None;
        for (track_id, result) in chunk.iter().zip(results) {
            match result {
                Ok(sections) => all_sections.push(sections),
                Err(e) if first_failure.is_none() => first_failure = Some((track_id.clone(), e)),
                Err(e) => warn!(
                    track_id = %track_id,
                    error = %e,
                    "Additional section fetch failure in aborted batch"
                ),
            }
        }

        if let Some((track_id, cause)) = first_failure {
            return Err(MashupError::SectionFetch { track_id, cause });
        }
    }

    Ok(all_sections)
}

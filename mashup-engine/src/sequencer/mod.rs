//! Greedy nearest-neighbor mashup sequencing
//!
//! Starting from the seed track's first section, repeatedly jump to the
//! acoustically closest section of any track not yet used, until every track
//! has contributed exactly one segment.

pub mod distance;
pub mod kd_tree;

pub use distance::distance;
pub use kd_tree::{Neighbor, SpatialIndex, TreePoint};

use crate::error::SequencingError;
use crate::types::{SectionProps, TrackInfo, YieldHook};
use std::collections::HashSet;
use tracing::debug;

/// Order `track_ids` into a mashup starting at `start_track_id`
///
/// `track_sections[i]` holds every section of `track_ids[i]`. The seed
/// contributes its section 0; each other track contributes the section closest
/// to wherever the previous segment left off. Ties resolve to the lowest track
/// index, then the lowest section index.
///
/// `yielder` is awaited after indexing each track and after each search step.
pub async fn find_optimal_mashup(
    start_track_id: &str,
    track_ids: &[String],
    track_sections: &[Vec<SectionProps>],
    yielder: &dyn YieldHook,
) -> Result<Vec<TrackInfo>, SequencingError> {
    validate_inputs(track_ids, track_sections)?;

    let start_index = track_ids
        .iter()
        .position(|id| id == start_track_id)
        .ok_or_else(|| SequencingError::StartTrackMissing(start_track_id.to_string()))?;

    let seed_section = track_sections[start_index][0];
    let mut mashup = Vec::with_capacity(track_ids.len());
    mashup.push(track_info(&track_ids[start_index], &seed_section)?);
    let mut current = TreePoint::new(seed_section, start_index, 0);

    let mut index = SpatialIndex::new();
    for (track_index, sections) in track_sections.iter().enumerate() {
        if track_index != start_index {
            for (section_index, section) in sections.iter().enumerate() {
                index.insert(TreePoint::new(*section, track_index, section_index));
            }
        }
        yielder.yield_now().await;
    }

    debug!(
        tracks = track_ids.len(),
        points = index.len(),
        start = %start_track_id,
        "Spatial index built"
    );

    for _ in 1..track_ids.len() {
        let winner = index
            .nearest(&current, 1)
            .into_iter()
            .next()
            .ok_or(SequencingError::IndexExhausted {
                emitted: mashup.len(),
                expected: track_ids.len(),
            })?;

        let track_index = winner.point.track_index;
        for (section_index, section) in track_sections[track_index].iter().enumerate() {
            index.remove(&TreePoint::new(*section, track_index, section_index));
        }

        debug!(
            track_id = %track_ids[track_index],
            section = winner.point.section_index,
            distance = winner.distance,
            "Next mashup segment"
        );

        mashup.push(track_info(&track_ids[track_index], &winner.point.section)?);
        current = winner.point;

        yielder.yield_now().await;
    }

    Ok(mashup)
}

fn validate_inputs(
    track_ids: &[String],
    track_sections: &[Vec<SectionProps>],
) -> Result<(), SequencingError> {
    if track_ids.len() != track_sections.len() {
        return Err(SequencingError::LengthMismatch {
            track_ids: track_ids.len(),
            section_lists: track_sections.len(),
        });
    }

    let mut seen = HashSet::with_capacity(track_ids.len());
    for (id, sections) in track_ids.iter().zip(track_sections) {
        if !seen.insert(id.as_str()) {
            return Err(SequencingError::DuplicateTrack(id.clone()));
        }
        if sections.is_empty() {
            return Err(SequencingError::EmptyTrack(id.clone()));
        }
    }
    Ok(())
}

fn track_info(track_id: &str, section: &SectionProps) -> Result<TrackInfo, SequencingError> {
    let end_ms = i32::try_from(section.end_ms).map_err(|_| SequencingError::EndOutOfRange {
        track_id: track_id.to_string(),
        end_ms: section.end_ms,
    })?;

    Ok(TrackInfo {
        track_id: track_id.to_string(),
        start_ms: section.start_ms,
        end_ms,
    })
}

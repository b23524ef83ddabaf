//! Writes a generated segment list into storage
//!
//! Not transactional: every call commits on its own. If a write fails the
//! rows already written stay in place and the caller decides what to clean up.

use crate::types::{MashupStore, TrackInfo};
use futures::future::join_all;
use mashup_common::Result;
use tracing::{debug, warn};

/// Persist `tracks` into the mashup `mashup_id`
///
/// Tracks are added one at a time in emission order so storage positions
/// follow the mashup order. Once every add has succeeded, all start/end
/// offsets are written concurrently and awaited together.
pub async fn save_to_db(
    store: &dyn MashupStore,
    mashup_id: &str,
    tracks: &[TrackInfo],
) -> Result<()> {
    for track in tracks {
        store.add_track(mashup_id, &track.track_id).await?;
    }

    debug!(mashup_id = %mashup_id, tracks = tracks.len(), "Tracks added, writing offsets");

    let mut writes = Vec::with_capacity(tracks.len() * 2);
    for track in tracks {
        writes.push(store.set_start_ms(mashup_id, &track.track_id, track.start_ms));
        writes.push(store.set_end_ms(mashup_id, &track.track_id, track.end_ms));
    }

    let mut first_error = None;
    for result in join_all(writes).await {
        if let Err(e) = result {
            if first_error.is_none() {
                first_error = Some(e);
            } else {
                warn!(mashup_id = %mashup_id, error = %e, "Additional offset write failure");
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

//! Mashup generation workflow
//!
//! Four sequential stages, no retries and no branching once started:
//!
//! 1. **Resolve** - expand the source into track ids
//! 2. **Fetch** - batched section retrieval for every track
//! 3. **Sequence** - greedy nearest-neighbor ordering
//! 4. **Persist** - write the segment list into the mashup
//!
//! Each stage failure is logged with its full cause and surfaced as that
//! stage's [`MashupError`] kind. A run that fails in Persist may leave a
//! partially written mashup behind.

use super::persister::save_to_db;
use super::section_fetcher::fetch_sections_batched;
use crate::error::{MashupError, MashupResult};
use crate::sequencer::find_optimal_mashup;
use crate::types::{
    MashupStore, NewMashup, SectionFetcher, SectionProps, SourceResolver, SourceType, TokioYield,
    TrackInfo, YieldHook,
};
use mashup_common::config::BatchConfig;
use mashup_common::{HashedCounterIdGenerator, IdGenerator};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Parameters for one generation run
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub source_id: String,
    /// `"album"` or `"playlist"`
    pub source_type: String,
    pub start_track_id: String,
    /// Display name for a newly created mashup
    pub name: Option<String>,
    /// Existing (pre-validated) mashup to write into; a new one is created if `None`
    pub mashup_id: Option<String>,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MashupOutcome {
    pub mashup_id: String,
    pub tracks: Vec<TrackInfo>,
}

/// Ensure the seed is part of the candidate list
///
/// Appends `start_track_id` when the source does not contain it, so every
/// mashup starts from the user's chosen track. Returns whether it was appended.
pub fn ensure_start_track(
    track_ids: &mut Vec<String>,
    start_track_id: &str,
) -> MashupResult<bool> {
    if start_track_id.trim().is_empty() {
        return Err(MashupError::StartTrackNotInSource(start_track_id.to_string()));
    }
    if track_ids.iter().any(|id| id == start_track_id) {
        return Ok(false);
    }
    track_ids.push(start_track_id.to_string());
    Ok(true)
}

/// Drop repeated track ids, keeping each first occurrence in order
///
/// Playlists may list the same track more than once. Returns how many
/// entries were dropped.
pub fn dedup_track_ids(track_ids: &mut Vec<String>) -> usize {
    let before = track_ids.len();
    let mut seen = HashSet::with_capacity(before);
    track_ids.retain(|id| seen.insert(id.clone()));
    before - track_ids.len()
}

/// Composes the resolver, fetcher, sequencer and persister
pub struct MashupGenerator {
    resolver: Arc<dyn SourceResolver>,
    fetcher: Arc<dyn SectionFetcher>,
    store: Arc<dyn MashupStore>,
    id_generator: Arc<dyn IdGenerator>,
    yielder: Arc<dyn YieldHook>,
    batch: BatchConfig,
}

impl MashupGenerator {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        fetcher: Arc<dyn SectionFetcher>,
        store: Arc<dyn MashupStore>,
        batch: BatchConfig,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            store,
            id_generator: Arc::new(HashedCounterIdGenerator::new()),
            yielder: Arc::new(TokioYield),
            batch,
        }
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_yield_hook(mut self, yielder: Arc<dyn YieldHook>) -> Self {
        self.yielder = yielder;
        self
    }

    /// Run the full pipeline for `request`
    pub async fn generate_mashup(&self, request: &GenerateRequest) -> MashupResult<MashupOutcome> {
        let start_time = Instant::now();

        let source_type: SourceType = request.source_type.parse().map_err(|_| {
            error!(source_type = %request.source_type, "Unknown source type");
            MashupError::UnknownSourceType(request.source_type.clone())
        })?;

        info!(
            source_id = %request.source_id,
            source_type = %source_type,
            start_track = %request.start_track_id,
            "Generating mashup"
        );

        let mut track_ids = self.stage_resolve(&request.source_id, source_type).await?;

        let dropped = dedup_track_ids(&mut track_ids);
        if dropped > 0 {
            debug!(dropped, "Dropped repeated tracks from source");
        }

        if ensure_start_track(&mut track_ids, &request.start_track_id)? {
            info!(
                start_track = %request.start_track_id,
                "Start track not in source, appended to candidates"
            );
        }

        let track_sections = self.stage_fetch(&track_ids).await?;
        let tracks = self
            .stage_sequence(&request.start_track_id, &track_ids, &track_sections)
            .await?;

        let mashup_id = match &request.mashup_id {
            Some(id) => id.clone(),
            None => self.create_mashup(request, source_type).await?,
        };

        self.stage_persist(&mashup_id, &tracks).await?;

        info!(
            mashup_id = %mashup_id,
            tracks = tracks.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Mashup generated"
        );

        Ok(MashupOutcome { mashup_id, tracks })
    }

    async fn stage_resolve(
        &self,
        source_id: &str,
        source_type: SourceType,
    ) -> MashupResult<Vec<String>> {
        info!(source_id = %source_id, "Stage 1: RESOLVE");

        self.resolver
            .resolve(source_id, source_type)
            .await
            .map_err(|cause| {
                error!(
                    source_id = %source_id,
                    source_type = %source_type,
                    error = %cause,
                    "Source resolution failed"
                );
                MashupError::SourceFetch {
                    source_id: source_id.to_string(),
                    source_type,
                    cause,
                }
            })
    }

    async fn stage_fetch(&self, track_ids: &[String]) -> MashupResult<Vec<Vec<SectionProps>>> {
        info!(
            tracks = track_ids.len(),
            batch_size = self.batch.request_amount,
            "Stage 2: FETCH SECTIONS"
        );

        fetch_sections_batched(self.fetcher.as_ref(), track_ids, &self.batch)
            .await
            .map_err(|e| {
                if let MashupError::SectionFetch { track_id, cause } = &e {
                    error!(track_id = %track_id, error = %cause, "Section fetch failed");
                }
                e
            })
    }

    async fn stage_sequence(
        &self,
        start_track_id: &str,
        track_ids: &[String],
        track_sections: &[Vec<SectionProps>],
    ) -> MashupResult<Vec<TrackInfo>> {
        info!(tracks = track_ids.len(), "Stage 3: SEQUENCE");

        find_optimal_mashup(
            start_track_id,
            track_ids,
            track_sections,
            self.yielder.as_ref(),
        )
        .await
        .map_err(|cause| {
            error!(error = %cause, "Sequencing failed");
            MashupError::Sequencing(cause)
        })
    }

    async fn create_mashup(
        &self,
        request: &GenerateRequest,
        source_type: SourceType,
    ) -> MashupResult<String> {
        let mashup = NewMashup {
            id: self.id_generator.generate_id(),
            name: request.name.clone().unwrap_or_else(|| {
                format!("Mashup of {} {}", source_type, request.source_id)
            }),
            seed_track_id: request.start_track_id.clone(),
            source_id: request.source_id.clone(),
            source_type,
        };

        self.store.create_mashup(&mashup).await.map_err(|cause| {
            error!(mashup_id = %mashup.id, error = %cause, "Mashup creation failed");
            MashupError::CreateMashup(cause)
        })?;

        Ok(mashup.id)
    }

    async fn stage_persist(&self, mashup_id: &str, tracks: &[TrackInfo]) -> MashupResult<()> {
        info!(mashup_id = %mashup_id, tracks = tracks.len(), "Stage 4: PERSIST");

        save_to_db(self.store.as_ref(), mashup_id, tracks)
            .await
            .map_err(|cause| {
                error!(
                    mashup_id = %mashup_id,
                    error = %cause,
                    "Persisting mashup failed, mashup may hold a partial result"
                );
                MashupError::Persist(cause)
            })
    }
}

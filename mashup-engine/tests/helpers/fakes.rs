//! In-memory collaborators
//!
//! `FakeFetcher` records concurrency so batching and drain behaviour can be
//! asserted; `MemoryStore` mirrors the SQLite store's container rules.

use async_trait::async_trait;
use chrono::Utc;
use mashup_common::{Error, Result};
use mashup_engine::types::{
    MashupRecord, MashupStore, NewMashup, SectionFetcher, SourceResolver, SourceType, StoredTrack,
};
use mashup_engine::{SectionProps, ServiceError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Resolver
// ============================================================================

pub struct FakeResolver {
    track_ids: Vec<String>,
    fail: bool,
    calls: Mutex<Vec<(String, SourceType)>>,
}

impl FakeResolver {
    pub fn new(track_ids: Vec<String>) -> Self {
        Self {
            track_ids,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            track_ids: Vec::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, SourceType)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceResolver for FakeResolver {
    async fn resolve(
        &self,
        source_id: &str,
        source_type: SourceType,
    ) -> std::result::Result<Vec<String>, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((source_id.to_string(), source_type));
        if self.fail {
            return Err(ServiceError::NotFound(format!("source {}", source_id)));
        }
        Ok(self.track_ids.clone())
    }
}

// ============================================================================
// Fetcher
// ============================================================================

#[derive(Default)]
pub struct FakeFetcher {
    sections: HashMap<String, Vec<SectionProps>>,
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    default_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    settled: AtomicUsize,
    started: Mutex<Vec<(String, Instant)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track_id: &str, sections: Vec<SectionProps>) -> Self {
        self.sections.insert(track_id.to_string(), sections);
        self
    }

    pub fn with_tracks(mut self, tracks: Vec<(String, Vec<SectionProps>)>) -> Self {
        self.sections.extend(tracks);
        self
    }

    pub fn with_delay(mut self, track_id: &str, delay: Duration) -> Self {
        self.delays.insert(track_id.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn failing_on(mut self, track_id: &str) -> Self {
        self.failures.insert(track_id.to_string());
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Calls that have returned, successfully or not
    pub fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }

    /// Track ids in call order with their start instants
    pub fn started(&self) -> Vec<(String, Instant)> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl SectionFetcher for FakeFetcher {
    async fn fetch_sections(
        &self,
        track_id: &str,
    ) -> std::result::Result<Vec<SectionProps>, ServiceError> {
        self.started
            .lock()
            .unwrap()
            .push((track_id.to_string(), Instant::now()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .delays
            .get(track_id)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failures.contains(track_id) {
            Err(ServiceError::ApiError(503, format!("analysis for {}", track_id)))
        } else {
            self.sections
                .get(track_id)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(track_id.to_string()))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.settled.fetch_add(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
struct MemoryState {
    mashups: HashMap<String, MashupRecord>,
    tracks: HashMap<String, Vec<StoredTrack>>,
}

/// `MashupStore` held in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_offsets_for: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `set_start_ms` / `set_end_ms` fail for `track_id`
    pub fn failing_offsets_for(mut self, track_id: &str) -> Self {
        self.fail_offsets_for.insert(track_id.to_string());
        self
    }

    pub fn mashup_count(&self) -> usize {
        self.state.lock().unwrap().mashups.len()
    }

    fn update_track<F>(&self, mashup_id: &str, track_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut StoredTrack),
    {
        if self.fail_offsets_for.contains(track_id) {
            return Err(Error::Internal(format!("offset write for {}", track_id)));
        }
        let mut state = self.state.lock().unwrap();
        let track = state
            .tracks
            .get_mut(mashup_id)
            .and_then(|tracks| tracks.iter_mut().find(|t| t.track_id == track_id))
            .ok_or_else(|| Error::NotFound(format!("track {} in mashup {}", track_id, mashup_id)))?;
        update(track);
        Ok(())
    }
}

#[async_trait]
impl MashupStore for MemoryStore {
    async fn create_mashup(&self, mashup: &NewMashup) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.mashups.contains_key(&mashup.id) {
            return Err(Error::Conflict(format!("mashup {} already exists", mashup.id)));
        }
        state.mashups.insert(
            mashup.id.clone(),
            MashupRecord {
                id: mashup.id.clone(),
                name: mashup.name.clone(),
                seed_track_id: mashup.seed_track_id.clone(),
                source_id: mashup.source_id.clone(),
                source_type: mashup.source_type,
                created_at: Utc::now(),
            },
        );
        state.tracks.insert(mashup.id.clone(), Vec::new());
        Ok(())
    }

    async fn add_track(&self, mashup_id: &str, track_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let tracks = state
            .tracks
            .get_mut(mashup_id)
            .ok_or_else(|| Error::NotFound(format!("mashup {}", mashup_id)))?;
        if tracks.iter().any(|t| t.track_id == track_id) {
            return Err(Error::Conflict(format!(
                "track {} already in mashup {}",
                track_id, mashup_id
            )));
        }
        let position = tracks.len() as i64;
        tracks.push(StoredTrack {
            track_id: track_id.to_string(),
            position,
            start_ms: 0,
            end_ms: -1,
        });
        Ok(())
    }

    async fn set_start_ms(&self, mashup_id: &str, track_id: &str, start_ms: u32) -> Result<()> {
        self.update_track(mashup_id, track_id, |t| t.start_ms = start_ms)
    }

    async fn set_end_ms(&self, mashup_id: &str, track_id: &str, end_ms: i32) -> Result<()> {
        if end_ms < -1 {
            return Err(Error::InvalidInput(format!("end offset {}", end_ms)));
        }
        self.update_track(mashup_id, track_id, |t| t.end_ms = end_ms)
    }

    async fn load_mashup(&self, mashup_id: &str) -> Result<MashupRecord> {
        self.state
            .lock()
            .unwrap()
            .mashups
            .get(mashup_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("mashup {}", mashup_id)))
    }

    async fn load_tracks(&self, mashup_id: &str) -> Result<Vec<StoredTrack>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tracks
            .get(mashup_id)
            .cloned()
            .unwrap_or_default())
    }
}

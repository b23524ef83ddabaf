//! Pipeline services
//!
//! - `spotify_client` - acoustic-data service client (resolver + fetcher)
//! - `section_fetcher` - analysis conversion and batched fetching
//! - `persister` - writes segment lists to a [`MashupStore`](crate::types::MashupStore)
//! - `mashup_generator` - the four-stage orchestrator

pub mod mashup_generator;
pub mod persister;
pub mod section_fetcher;
pub mod spotify_client;

pub use mashup_generator::{
    dedup_track_ids, ensure_start_track, GenerateRequest, MashupGenerator, MashupOutcome,
};
pub use persister::save_to_db;
pub use section_fetcher::fetch_sections_batched;
pub use spotify_client::SpotifyClient;

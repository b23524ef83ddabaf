//! mashup-engine - generate a mashup from an album or playlist
//!
//! Resolves the source through the Spotify Web API, orders sections with
//! the nearest-neighbor sequencer and stores the result in SQLite.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use mashup_common::config::{load_config, TomlConfig};
use mashup_engine::db::SqliteMashupStore;
use mashup_engine::services::SpotifyClient;
use mashup_engine::{GenerateRequest, MashupGenerator};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for mashup-engine
#[derive(Parser, Debug)]
#[command(name = "mashup-engine")]
#[command(about = "Generate a section-by-section mashup from an album or playlist")]
#[command(version)]
struct Args {
    /// Album or playlist id
    #[arg(long)]
    source_id: String,

    /// "album" or "playlist"
    #[arg(long, default_value = "album")]
    source_type: String,

    /// Track the mashup starts from
    #[arg(long)]
    seed: String,

    /// Display name for the new mashup
    #[arg(long)]
    name: Option<String>,

    /// Write into an existing mashup instead of creating one
    #[arg(long)]
    mashup_id: Option<String>,

    /// Config file (overrides MASHUP_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and MASHUP_DATABASE)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (stderr_layer, file_layer) = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(database) = &args.database {
        config.database_path = Some(database.clone());
    }

    init_tracing(&config)?;
    info!("Starting mashup-engine {}", env!("CARGO_PKG_VERSION"));

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = mashup_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let spotify = Arc::new(
        SpotifyClient::from_config(&config).context("Failed to create Spotify client")?,
    );
    let store = Arc::new(SqliteMashupStore::new(pool));
    let generator = MashupGenerator::new(spotify.clone(), spotify, store, config.batch.clone());

    let request = GenerateRequest {
        source_id: args.source_id,
        source_type: args.source_type,
        start_track_id: args.seed,
        name: args.name,
        mashup_id: args.mashup_id,
    };

    let outcome = match generator.generate_mashup(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(kind = e.kind(), "Mashup generation failed: {}", e);
            return Err(anyhow::Error::new(e));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("mashup {}", outcome.mashup_id);
        for (position, track) in outcome.tracks.iter().enumerate() {
            println!(
                "{:>3}  {}  {}..{}",
                position, track.track_id, track.start_ms, track.end_ms
            );
        }
    }

    Ok(())
}

//! Section fixtures and database setup

use mashup_engine::db::SqliteMashupStore;
use mashup_engine::SectionProps;
use tempfile::TempDir;

pub fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Single 10s section with the given tempo and key
pub fn section(tempo: f64, key: i8) -> SectionProps {
    SectionProps {
        start_ms: 0,
        end_ms: 10_000,
        loudness: -1.23,
        tempo,
        key,
        mode: 0,
        time_signature: 3,
    }
}

/// `count` back-to-back 5s sections at a fixed tempo
pub fn uniform_sections(count: u32, tempo: f64) -> Vec<SectionProps> {
    (0..count)
        .map(|i| SectionProps {
            start_ms: i * 5000,
            end_ms: (i + 1) * 5000,
            loudness: -8.0,
            tempo,
            key: 5,
            mode: 1,
            time_signature: 4,
        })
        .collect()
}

/// Three one-section tracks differing only in tempo and key
///
/// From "a" the weighted distances are a→c ≈ 0.288 and a→b ≈ 0.508,
/// so the greedy order is a, c, b.
pub fn golden_tracks() -> Vec<(String, Vec<SectionProps>)> {
    vec![
        ("a".to_string(), vec![section(123.0, 0)]),
        ("b".to_string(), vec![section(321.0, 1)]),
        ("c".to_string(), vec![section(231.0, 11)]),
    ]
}

/// Temporary SQLite-backed store
///
/// Returns (TempDir, store) - TempDir must be kept alive for duration of test
pub async fn create_test_store() -> (TempDir, SqliteMashupStore) {
    let temp_dir = TempDir::new().unwrap();
    let pool = mashup_common::db::init_database(&temp_dir.path().join("test_mashup.db"))
        .await
        .unwrap();
    (temp_dir, SqliteMashupStore::new(pool))
}

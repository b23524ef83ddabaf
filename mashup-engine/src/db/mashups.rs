//! Mashup database operations
//!
//! SQLite implementation of the [`MashupStore`] port. Container validity and
//! duplicate detection live here; the engine never checks them itself.

use crate::types::{MashupRecord, MashupStore, NewMashup, SourceType, StoredTrack};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mashup_common::{Error, Result};
use sqlx::SqlitePool;

/// `MashupStore` backed by the `mashups` / `mashup_tracks` tables
#[derive(Clone)]
pub struct SqliteMashupStore {
    pool: SqlitePool,
}

impl SqliteMashupStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_mashup_exists(&self, mashup_id: &str) -> Result<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM mashups WHERE id = ?")
            .bind(mashup_id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("mashup {}", mashup_id))),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl MashupStore for SqliteMashupStore {
    async fn create_mashup(&self, mashup: &NewMashup) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO mashups (id, name, seed_track_id, source_id, source_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&mashup.id)
        .bind(&mashup.name)
        .bind(&mashup.seed_track_id)
        .bind(&mashup.source_id)
        .bind(mashup.source_type.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(mashup_id = %mashup.id, "Created mashup");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(Error::Conflict(format!("mashup {} already exists", mashup.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_track(&self, mashup_id: &str, track_id: &str) -> Result<()> {
        self.ensure_mashup_exists(mashup_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO mashup_tracks (mashup_id, track_id, position)
            SELECT ?, ?, COALESCE(MAX(position) + 1, 0)
            FROM mashup_tracks
            WHERE mashup_id = ?
            "#,
        )
        .bind(mashup_id)
        .bind(track_id)
        .bind(mashup_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::Conflict(format!(
                "track {} already in mashup {}",
                track_id, mashup_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_start_ms(&self, mashup_id: &str, track_id: &str, start_ms: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE mashup_tracks SET start_ms = ? WHERE mashup_id = ? AND track_id = ?",
        )
        .bind(i64::from(start_ms))
        .bind(mashup_id)
        .bind(track_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "track {} in mashup {}",
                track_id, mashup_id
            )));
        }
        Ok(())
    }

    async fn set_end_ms(&self, mashup_id: &str, track_id: &str, end_ms: i32) -> Result<()> {
        if end_ms < -1 {
            return Err(Error::InvalidInput(format!(
                "end offset {} for track {} is below -1",
                end_ms, track_id
            )));
        }

        let result = sqlx::query(
            "UPDATE mashup_tracks SET end_ms = ? WHERE mashup_id = ? AND track_id = ?",
        )
        .bind(i64::from(end_ms))
        .bind(mashup_id)
        .bind(track_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "track {} in mashup {}",
                track_id, mashup_id
            )));
        }
        Ok(())
    }

    async fn load_mashup(&self, mashup_id: &str) -> Result<MashupRecord> {
        let row = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            r#"
            SELECT id, name, seed_track_id, source_id, source_type, created_at
            FROM mashups
            WHERE id = ?
            "#,
        )
        .bind(mashup_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("mashup {}", mashup_id)))?;

        let source_type: SourceType = row
            .4
            .parse()
            .map_err(|e| Error::Internal(format!("mashup {}: {}", mashup_id, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&row.5)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Internal(format!("mashup {} created_at: {}", mashup_id, e)))?;

        Ok(MashupRecord {
            id: row.0,
            name: row.1,
            seed_track_id: row.2,
            source_id: row.3,
            source_type,
            created_at,
        })
    }

    async fn load_tracks(&self, mashup_id: &str) -> Result<Vec<StoredTrack>> {
        let rows = sqlx::query_as::<_, (String, i64, i64, i64)>(
            r#"
            SELECT track_id, position, start_ms, end_ms
            FROM mashup_tracks
            WHERE mashup_id = ?
            ORDER BY position
            "#,
        )
        .bind(mashup_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(track_id, position, start_ms, end_ms)| {
                let start_ms = u32::try_from(start_ms)
                    .map_err(|_| Error::Internal(format!("start_ms {} out of range", start_ms)))?;
                let end_ms = i32::try_from(end_ms)
                    .map_err(|_| Error::Internal(format!("end_ms {} out of range", end_ms)))?;
                Ok(StoredTrack {
                    track_id,
                    position,
                    start_ms,
                    end_ms,
                })
            })
            .collect()
    }
}

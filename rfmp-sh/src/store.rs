//! Mapping Store: card id → directory and metadata, in SQLite
//!
//! The pipeline only ever calls [`MappingStore::lookup`]. `upsert` and
//! `remove` are the write boundary for the assignment workflow.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Database file name under the root folder
pub const DB_FILE_NAME: &str = "rfmp.db";

/// One card assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMapping {
    pub card_id: String,
    /// Directory on the playback host; existence is checked there at play time
    pub directory: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cover_path: Option<String>,
}

impl CardMapping {
    pub fn new(card_id: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            card_id: card_id.into(),
            directory: directory.into(),
            title: None,
            artist: None,
            cover_path: None,
        }
    }
}

/// Point lookup by card id
///
/// `Ok(None)` means "not found"; an unreachable store is always an error.
pub trait MappingStore: Send + Sync {
    fn lookup(
        &self,
        card_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<CardMapping>, StoreError>> + Send;
}

/// SQLite-backed mapping store
#[derive(Clone)]
pub struct SqliteMappingStore {
    pool: SqlitePool,
}

impl SqliteMappingStore {
    /// Open (creating if needed) `<root>/rfmp.db`
    pub async fn open(root_folder: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root_folder)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", root_folder.display(), e)))?;
        let db_path = root_folder.join(DB_FILE_NAME);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(2))
            .connect_with(options)
            .await?;

        let store = Self::from_pool(pool).await?;
        info!("Opened mapping store: {}", db_path.display());
        Ok(store)
    }

    /// Wrap an existing pool, creating the table if needed
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS card_mappings (
                card_id TEXT PRIMARY KEY,
                directory TEXT NOT NULL,
                title TEXT,
                artist TEXT,
                cover_path TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Create or replace the mapping for `mapping.card_id`
    pub async fn upsert(&self, mapping: &CardMapping) -> Result<(), StoreError> {
        if mapping.card_id.trim().is_empty() {
            return Err(StoreError::Invalid("card_id is empty".to_string()));
        }
        if mapping.directory.trim().is_empty() {
            return Err(StoreError::Invalid("directory is empty".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO card_mappings (card_id, directory, title, artist, cover_path)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(card_id) DO UPDATE SET
                directory = excluded.directory,
                title = excluded.title,
                artist = excluded.artist,
                cover_path = excluded.cover_path
            "#,
        )
        .bind(&mapping.card_id)
        .bind(&mapping.directory)
        .bind(&mapping.title)
        .bind(&mapping.artist)
        .bind(&mapping.cover_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a mapping; returns whether one existed
    pub async fn remove(&self, card_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM card_mappings WHERE card_id = ?")
            .bind(card_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Close the pool; later lookups report `Unavailable`
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl MappingStore for SqliteMappingStore {
    async fn lookup(&self, card_id: &str) -> Result<Option<CardMapping>, StoreError> {
        let row = sqlx::query(
            "SELECT card_id, directory, title, artist, cover_path FROM card_mappings WHERE card_id = ?",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CardMapping {
            card_id: row.get("card_id"),
            directory: row.get("directory"),
            title: row.get("title"),
            artist: row.get("artist"),
            cover_path: row.get("cover_path"),
        }))
    }
}

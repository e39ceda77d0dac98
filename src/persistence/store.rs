//! SQLite-based snapshot store

use crate::core::WorkflowState;
use crate::persistence::{SnapshotStore, StoreError, StoreResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// SQLite snapshot store
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Open (or create) the database at `db_path`
    ///
    /// `:memory:` opens a private in-memory database.
    pub async fn new(db_path: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .map_err(storage)?
            .create_if_missing(true);

        // every pooled connection to :memory: would get its own database
        let max_connections = if db_path == ":memory:" { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.init().await?;
        debug!("Opened snapshot store at {}", db_path);

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> StoreResult<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("stepwire");
        std::fs::create_dir_all(&db_dir).map_err(storage)?;

        Self::open(&db_dir.join("snapshots.db")).await
    }

    /// Open the database at a filesystem path
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let path = path
            .to_str()
            .ok_or_else(|| StoreError::Storage(format!("Non UTF-8 path: {}", path.display())))?;
        Self::new(path).await
    }

    /// Initialize database schema
    async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                alias TEXT PRIMARY KEY,
                state_id TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                doc TEXT NOT NULL DEFAULT '',
                saved_at TEXT NOT NULL,
                state_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }
}

fn storage(err: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(err.to_string())
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, alias: &str, state: &WorkflowState) -> StoreResult<()> {
        let state_json = serde_json::to_string(state)?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO snapshots
            (alias, state_id, version, doc, saved_at, state_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(alias)
        .bind(state.id.to_string())
        .bind(state.version as i64)
        .bind(&state.doc)
        .bind(Self::to_naive(Utc::now()))
        .bind(state_json)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        debug!("Saved snapshot v{} for {}", state.version, alias);
        Ok(())
    }

    async fn load(&self, alias: &str) -> StoreResult<WorkflowState> {
        let row = sqlx::query("SELECT state_json FROM snapshots WHERE alias = ?1")
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        match row {
            Some(row) => {
                let state_json: String = row.get("state_json");
                Ok(serde_json::from_str(&state_json)?)
            }
            None => Err(StoreError::NotFound(alias.to_string())),
        }
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT alias FROM snapshots ORDER BY alias")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok(rows.iter().map(|row| row.get("alias")).collect())
    }

    async fn contains(&self, alias: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM snapshots WHERE alias = ?1")
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        Ok(row.is_some())
    }

    async fn delete(&self, alias: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM snapshots WHERE alias = ?1")
            .bind(alias)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }
}

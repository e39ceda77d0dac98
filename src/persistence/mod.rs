//! Persistence layer for workflow snapshots

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteSnapshotStore;

use crate::core::WorkflowState;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by snapshot stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No snapshot stored for workflow '{0}'")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for snapshot backends
///
/// Holds the latest saved state per workflow alias.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Save a snapshot, replacing any previous one for `alias`
    async fn save(&self, alias: &str, state: &WorkflowState) -> StoreResult<()>;

    /// Load the latest snapshot for `alias`
    async fn load(&self, alias: &str) -> StoreResult<WorkflowState>;

    /// List all stored aliases, sorted
    async fn list(&self) -> StoreResult<Vec<String>>;

    /// Whether a snapshot exists for `alias`
    async fn contains(&self, alias: &str) -> StoreResult<bool>;

    /// Remove the snapshot for `alias`; returns whether one existed
    async fn delete(&self, alias: &str) -> StoreResult<bool>;
}

/// In-memory snapshot store (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, WorkflowState>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, alias: &str, state: &WorkflowState) -> StoreResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(alias.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, alias: &str) -> StoreResult<WorkflowState> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(alias)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(alias.to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        let snapshots = self.snapshots.read().await;
        let mut aliases: Vec<String> = snapshots.keys().cloned().collect();
        aliases.sort();
        Ok(aliases)
    }

    async fn contains(&self, alias: &str) -> StoreResult<bool> {
        Ok(self.snapshots.read().await.contains_key(alias))
    }

    async fn delete(&self, alias: &str) -> StoreResult<bool> {
        Ok(self.snapshots.write().await.remove(alias).is_some())
    }
}

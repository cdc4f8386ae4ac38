//! Roster persistence
//!
//! The roster is stored as opaque JSON under one key. Anything that cannot
//! be loaded back into a valid roster is treated as absent and replaced by
//! the fixed initial roster.

use crate::config::SwarmConfig;
use crate::coordinator::SimulationState;
use crate::roster::initial_roster;
use async_trait::async_trait;
use neurgenesis_core::{Error, Node, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

// ============================================================
// Stores
// ============================================================

/// One `<key>.json` file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================
// Roster store
// ============================================================

#[derive(Clone)]
pub struct RosterStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
    inbox_capacity: usize,
}

impl RosterStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &SwarmConfig) -> Self {
        Self {
            store,
            key: config.persistence.key.clone(),
            inbox_capacity: config.engine.inbox_capacity,
        }
    }

    /// Load the persisted roster, or the initial roster if there is none or
    /// it does not validate.
    pub async fn load_or_default(&self, config: &SwarmConfig) -> Vec<Node> {
        match self.load().await {
            Ok(Some(nodes)) => {
                info!("Restored {} nodes from '{}'", nodes.len(), self.key);
                nodes
            }
            Ok(None) => {
                info!("No persisted roster under '{}', starting fresh", self.key);
                initial_roster(&config.roster)
            }
            Err(e) => {
                warn!("Discarding persisted roster: {}", e);
                initial_roster(&config.roster)
            }
        }
    }

    async fn load(&self) -> Result<Option<Vec<Node>>> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        let nodes: Vec<Node> = serde_json::from_str(&raw)?;
        if nodes.is_empty() {
            return Err(Error::Persistence("empty roster".into()));
        }
        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            node.check_invariants(self.inbox_capacity)
                .map_err(Error::Persistence)?;
            if !seen.insert(&node.id) {
                return Err(Error::Persistence(format!("duplicate node id {}", node.id)));
            }
        }
        Ok(Some(nodes))
    }

    pub async fn save(&self, nodes: &[Node]) -> Result<()> {
        let json = serde_json::to_string(nodes)?;
        self.store.put(&self.key, &json).await?;
        debug!("Persisted {} nodes", nodes.len());
        Ok(())
    }
}

/// Write the roster after each burst of changes settles for `debounce`.
/// Flushes the latest snapshot once more on cancellation.
pub async fn run_persistence(
    store: RosterStore,
    mut rx: watch::Receiver<Arc<SimulationState>>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let mut dirty = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                dirty = true;
            }
        }

        // Quiet period: restart the timer on every further change.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(debounce) => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let snapshot = rx.borrow_and_update().clone();
        if let Err(e) = store.save(&snapshot.nodes).await {
            warn!("Roster persistence failed: {}", e);
        } else {
            dirty = false;
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    if dirty || rx.has_changed().unwrap_or(false) {
        let snapshot = rx.borrow().clone();
        if let Err(e) = store.save(&snapshot.nodes).await {
            warn!("Final roster flush failed: {}", e);
        }
    }
    info!("Persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        assert_eq!(store.get("roster").await.unwrap(), None);
        store.put("roster", "[]").await.unwrap();
        assert_eq!(store.get("roster").await.unwrap().as_deref(), Some("[]"));
        assert!(!store.path_for("roster").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        store.put("k", "a").await.unwrap();
        store.put("k", "b").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }
}

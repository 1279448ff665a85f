//! Persistent set of visited dedup keys (`"{type}:{id}"`).
//!
//! Single source of truth for "has this entity already been fully
//! processed". Backed by one JSON array snapshot; `save` rewrites the
//! whole file, which stays cheap because the set is bounded by distinct
//! entities seen, not by event count. Not safe for concurrent writers —
//! the orchestrator is strictly single-threaded over this structure.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct VisitedSet {
    path: PathBuf,
    set: HashSet<String>,
}

impl VisitedSet {
    /// Load the snapshot. A missing or malformed file yields an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let set = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(keys) => keys.into_iter().collect(),
                Err(error) => {
                    warn!(path = %path.display(), %error, "malformed visited snapshot, starting empty");
                    HashSet::new()
                }
            },
            Err(_) => HashSet::new(),
        };
        Self { path, set }
    }

    /// Rewrite the full snapshot.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut keys: Vec<&String> = self.set.iter().collect();
        keys.sort();
        let body = serde_json::to_vec_pretty(&keys)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.set.contains(key)
    }

    /// Insert a key. Returns true iff it was newly inserted — this is
    /// what tells callers whether the item is actually new work.
    pub fn add(&mut self, key: &str) -> bool {
        self.set.insert(key.to_string())
    }

    /// Remove a key to force a re-crawl. Maintenance tooling only.
    pub fn remove(&mut self, key: &str) -> bool {
        self.set.remove(key)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.set.iter().map(String::as_str)
    }
}

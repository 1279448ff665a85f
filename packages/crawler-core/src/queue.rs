//! Append-only work queue.
//!
//! An on-disk JSONL log (one [`QueueItem`] per line) gives durable,
//! insertion-order-preserving adds; an in-memory mirror serves dedup and
//! reads. Entries are never mutated in place — removal happens only via
//! [`CrawlQueue::compact`], which rewrites the log from the filtered
//! mirror. A truncated trailing line (crash mid-append) is simply dropped
//! on the next load.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::types::QueueItem;
use crate::visited::VisitedSet;

#[derive(Debug)]
pub struct CrawlQueue {
    path: PathBuf,
    items: Vec<QueueItem>,
}

impl CrawlQueue {
    /// Load the queue log. Missing file yields an empty queue; malformed
    /// lines are dropped silently (defensive parse-and-filter).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(raw) => raw
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| serde_json::from_str::<QueueItem>(line).ok())
                .collect(),
            Err(_) => Vec::new(),
        };
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item, unless an entry with the same `(type, id)` is
    /// already queued. Returns true iff the item was added. The dedup
    /// scan is O(n) over the mirror, fine at the expected scale of low
    /// thousands.
    pub fn add(&mut self, item: QueueItem) -> Result<bool> {
        let key = item.visit_key();
        if self.items.iter().any(|i| i.visit_key() == key) {
            debug!(item = %key, "already queued, skipping");
            return Ok(false);
        }

        self.append_line(&item)?;
        self.items.push(item);
        Ok(true)
    }

    /// Queue items not yet in the visited set, in insertion order.
    pub fn pending<'a>(&'a self, visited: &VisitedSet) -> Vec<&'a QueueItem> {
        self.items
            .iter()
            .filter(|item| !visited.has(&item.visit_key()))
            .collect()
    }

    /// Drop every entry already in the visited set and rewrite the log.
    /// The only operation that removes entries. Returns the remaining
    /// count.
    pub fn compact(&mut self, visited: &VisitedSet) -> Result<usize> {
        let before = self.items.len();
        self.items.retain(|item| !visited.has(&item.visit_key()));
        let remaining = self.items.len();

        self.rewrite()?;

        let removed = before - remaining;
        if removed > 0 {
            info!(removed, remaining, "queue compacted");
        }
        Ok(remaining)
    }

    /// Rewrite the log from the in-memory mirror.
    pub(crate) fn rewrite(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut body = String::new();
        for item in &self.items {
            body.push_str(&serde_json::to_string(item)?);
            body.push('\n');
        }
        fs::write(&self.path, body).map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    fn append_line(&self, item: &QueueItem) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let line = serde_json::to_string(item)?;
        writeln!(file, "{line}").map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }
}

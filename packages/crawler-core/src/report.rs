//! Read-only status aggregation for the `status` and `queue` commands.
//!
//! Everything here is computed from the on-disk state at call time; no
//! crawl session needs to be running, and nothing is mutated.

use std::collections::BTreeMap;

use crate::queue::CrawlQueue;
use crate::store::{DocumentStore, StoreStats};
use crate::types::QueueItem;
use crate::visited::VisitedSet;

#[derive(Debug)]
pub struct StatusReport {
    /// Per-type document counts from directory enumeration.
    pub stats: StoreStats,
    /// Total queue entries, including already-visited ones awaiting
    /// compaction.
    pub queued: usize,
    /// Queue entries not yet visited.
    pub pending: usize,
    pub queued_by_kind: BTreeMap<String, usize>,
    pub queued_by_source: BTreeMap<String, usize>,
    pub visited: usize,
    pub visited_by_kind: BTreeMap<String, usize>,
    /// The tail of the pending queue, newest last: the items the frontier
    /// policy favors next.
    pub recent: Vec<QueueItem>,
}

impl StatusReport {
    pub fn gather(store: &DocumentStore, recent_window: usize) -> Self {
        let visited_set = VisitedSet::load(store.visited_path());
        let queue = CrawlQueue::load(store.queue_path());
        let pending_items = queue.pending(&visited_set);

        let mut queued_by_kind = BTreeMap::new();
        let mut queued_by_source = BTreeMap::new();
        for item in queue.items() {
            *queued_by_kind
                .entry(item.kind.as_str().to_string())
                .or_insert(0) += 1;
            *queued_by_source
                .entry(source_group(&item.source))
                .or_insert(0) += 1;
        }

        let mut visited_by_kind = BTreeMap::new();
        for key in visited_set.iter() {
            let kind = key.split_once(':').map_or(key, |(kind, _)| kind);
            *visited_by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }

        let start = pending_items.len().saturating_sub(recent_window.max(1));
        let recent = pending_items[start..].iter().map(|i| (*i).clone()).collect();

        Self {
            stats: store.stats(),
            queued: queue.len(),
            pending: pending_items.len(),
            queued_by_kind,
            queued_by_source,
            visited: visited_set.len(),
            visited_by_kind,
            recent,
        }
    }
}

/// Collapse parameterized sources (`related:123`, `topic:19550517`) into
/// their family name for aggregation.
fn source_group(source: &str) -> String {
    source
        .split_once(':')
        .map_or(source, |(group, _)| group)
        .to_string()
}

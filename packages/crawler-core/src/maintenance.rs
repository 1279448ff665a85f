//! Out-of-band maintenance commands operating directly on stored state.
//!
//! These run while no crawl session is active. Each one loads the state
//! files, applies its change, and flushes before returning.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::queue::CrawlQueue;
use crate::store::DocumentStore;
use crate::types::{visit_key, ItemKind, QueueItem};
use crate::visited::VisitedSet;

#[derive(Debug, PartialEq, Eq)]
pub struct CompactOutcome {
    pub before: usize,
    pub removed: usize,
    pub remaining: usize,
    /// Path of the pre-compaction backup; `None` on a dry run or when the
    /// log did not exist yet.
    pub backup: Option<PathBuf>,
}

/// Rewrite the queue log without its visited entries. With `dry_run` the
/// counts are reported but nothing is written; otherwise the old log is
/// kept next to the new one as `queue.jsonl.bak`.
pub fn compact_queue(store: &DocumentStore, dry_run: bool) -> Result<CompactOutcome> {
    let visited = VisitedSet::load(store.visited_path());
    let mut queue = CrawlQueue::load(store.queue_path());

    let before = queue.len();
    let removable = before - queue.pending(&visited).len();

    if dry_run {
        info!(before, removable, "queue compaction dry run");
        return Ok(CompactOutcome {
            before,
            removed: removable,
            remaining: before - removable,
            backup: None,
        });
    }

    let queue_path = store.queue_path();
    let backup = if queue_path.exists() {
        let backup_path = queue_path.with_extension("jsonl.bak");
        fs::copy(&queue_path, &backup_path)
            .with_context(|| format!("backing up {}", queue_path.display()))?;
        Some(backup_path)
    } else {
        None
    };

    let remaining = queue.compact(&visited)?;
    Ok(CompactOutcome {
        before,
        removed: before - remaining,
        remaining,
        backup,
    })
}

/// Put every stored question back on the frontier: drop its visited key
/// and queue it at priority 1 so a later run refreshes it.
pub fn requeue_questions(store: &DocumentStore) -> Result<usize> {
    let mut visited = VisitedSet::load(store.visited_path());
    let mut queue = CrawlQueue::load(store.queue_path());

    let mut requeued = 0;
    for id in store.question_ids() {
        visited.remove(&visit_key("question", &id));
        let mut item = QueueItem::new(ItemKind::Question, id.clone(), 1, "requeue");
        if let Some(question) = store.get_question(&id) {
            if !question.title.is_empty() {
                item = item.with_title(question.title);
            }
        }
        if queue.add(item)? {
            requeued += 1;
        }
    }

    visited.save()?;
    info!(requeued, "stored questions returned to the frontier");
    Ok(requeued)
}

/// Queue the related-question references recorded on stored question
/// documents that were never crawled themselves.
pub fn queue_related_questions(store: &DocumentStore) -> Result<usize> {
    let visited = VisitedSet::load(store.visited_path());
    let mut queue = CrawlQueue::load(store.queue_path());

    let mut added = 0;
    for id in store.question_ids() {
        let Some(question) = store.get_question(&id) else {
            warn!(question = %id, "unreadable question document, skipping");
            continue;
        };
        for related in &question.related_questions {
            if related.id.is_empty() || visited.has(&visit_key("question", &related.id)) {
                continue;
            }
            let item = QueueItem::new(
                ItemKind::Question,
                related.id.clone(),
                2,
                format!("related:{id}"),
            )
            .with_title(related.title.clone());
            if queue.add(item)? {
                added += 1;
            }
        }
    }

    info!(added, "related questions queued");
    Ok(added)
}

//! Frontier selection: randomized depth-first traversal.
//!
//! Pure breadth-first exhausts time before reaching interesting leaves;
//! pure depth-first starves early discoveries. The blend below mostly
//! follows the newest discovery thread while occasionally jumping to an
//! older branch, which also makes the traversal order hard to predict.

use crate::config::CrawlerConfig;
use crate::types::QueueItem;
use crate::visited::VisitedSet;

#[derive(Debug, Clone)]
pub struct FrontierPolicy {
    /// Probability of sampling from the recency window.
    pub recent_bias: f64,
    /// Size of the recency window.
    pub recent_window: usize,
}

impl Default for FrontierPolicy {
    fn default() -> Self {
        Self {
            recent_bias: 0.7,
            recent_window: 5,
        }
    }
}

impl FrontierPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            recent_bias: config.recent_bias,
            recent_window: config.recent_window,
        }
    }

    /// Pick the next crawl target from the unvisited queue items, or
    /// `None` if the frontier is exhausted.
    ///
    /// Stateless and repeatable: the chosen item is NOT removed from the
    /// queue, so consecutive calls may return the same item until the
    /// caller marks it visited. With probability `recent_bias` the pick
    /// is uniform over the last `min(recent_window, available)` items
    /// (keep following the newest thread); otherwise uniform over the
    /// whole frontier (escape local exploration, avoid starving old
    /// branches). Queue priority is recorded metadata and deliberately
    /// not consulted here.
    pub fn pick<'a>(&self, items: &'a [QueueItem], visited: &VisitedSet) -> Option<&'a QueueItem> {
        let available: Vec<&QueueItem> = items
            .iter()
            .filter(|item| !visited.has(&item.visit_key()))
            .collect();

        if available.is_empty() {
            return None;
        }

        if fastrand::f64() < self.recent_bias {
            let window = self.recent_window.max(1).min(available.len());
            let recent = &available[available.len() - window..];
            Some(recent[fastrand::usize(..recent.len())])
        } else {
            Some(available[fastrand::usize(..available.len())])
        }
    }
}

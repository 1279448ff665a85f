use std::time::Duration;

/// Inclusive millisecond range sampled for pacing delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample(&self) -> Duration {
        Duration::from_millis(fastrand::u64(self.min_ms..=self.max_ms))
    }
}

/// Configuration for the orchestrator and frontier selector.
///
/// All timing and policy knobs live here, passed in at construction —
/// never process-wide globals.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Pause between crawl targets, imitating a reader moving on.
    pub between_items: DelayRange,
    /// Probability of picking from the recency window instead of the
    /// whole frontier.
    pub recent_bias: f64,
    /// How many of the most-recently-enqueued unvisited items count as
    /// "recent".
    pub recent_window: usize,
    /// Probability of enqueueing an article's recommendations.
    pub follow_recommended: f64,
    /// Cap on recommendations enqueued per article.
    pub max_recommended: usize,
    /// Flush visited/stats every this many processed items.
    pub checkpoint_interval: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            between_items: DelayRange::new(5_000, 10_000),
            recent_bias: 0.7,
            recent_window: 5,
            follow_recommended: 0.2,
            max_recommended: 3,
            checkpoint_interval: 5,
        }
    }
}

impl CrawlerConfig {
    pub fn with_between_items(mut self, range: DelayRange) -> Self {
        self.between_items = range;
        self
    }

    pub fn with_recent_bias(mut self, bias: f64) -> Self {
        self.recent_bias = bias;
        self
    }

    pub fn with_recent_window(mut self, window: usize) -> Self {
        self.recent_window = window;
        self
    }

    pub fn with_follow_recommended(mut self, probability: f64) -> Self {
        self.follow_recommended = probability;
        self
    }

    pub fn with_max_recommended(mut self, max: usize) -> Self {
        self.max_recommended = max;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }
}

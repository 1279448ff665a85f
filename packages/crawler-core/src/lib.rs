//! Crawl orchestration and persistence for a Q&A-site archive.
//!
//! The core is transport-agnostic: all network access goes through the
//! [`PageFetcher`] trait, so the session loop, frontier policy and the
//! flat-file document store can be exercised entirely offline.

pub mod config;
pub mod error;
pub mod frontier;
pub mod ingest;
pub mod maintenance;
pub mod orchestrator;
pub mod queue;
pub mod report;
pub mod store;
pub mod traits;
pub mod types;
pub mod visited;

// Re-exports for clean API
pub use config::{CrawlerConfig, DelayRange};
pub use error::{Result, StoreError};
pub use frontier::FrontierPolicy;
pub use ingest::{import_feed_file, ingest_feed, parse_topic_id, seed_topic, IngestSummary};
pub use maintenance::{compact_queue, queue_related_questions, requeue_questions, CompactOutcome};
pub use orchestrator::{CrawlSummary, Crawler, StopReason};
pub use queue::CrawlQueue;
pub use report::StatusReport;
pub use store::{DocumentStore, StoreStats};
pub use traits::{CredentialStore, PageFetcher};
pub use types::{
    Answer, Article, ArticleRef, Author, AuthorRef, FeedItem, FetchedArticle, FetchedQuestion,
    FetchedTopic, ItemKind, Question, QuestionPatch, QueueItem, RelatedQuestion, Timestamp, Topic,
    TopicPatch,
};
pub use visited::VisitedSet;

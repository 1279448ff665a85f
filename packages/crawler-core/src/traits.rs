use anyhow::Result;
use async_trait::async_trait;

use crate::types::{FetchedArticle, FetchedQuestion, FetchedTopic};

// ============================================================================
// PAGE FETCHER: network access (browser/HTTP specifics live elsewhere)
// ============================================================================

/// The page-fetch collaborator the orchestrator drives.
///
/// Implementations own session state, timeouts and page mechanics; the
/// core only sees structured items and discovered links. Errors are
/// treated as transient by the caller: the item stays unvisited and is
/// retried on a later run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Install stored credentials (opaque blob from a [`CredentialStore`])
    /// into the fetch session.
    async fn apply_credentials(&self, raw: &str) -> Result<()>;

    /// Prime the session by visiting the site entry point. Called once
    /// during warmup; failure is fatal to the run.
    async fn warm_up(&self) -> Result<()>;

    /// Fetch a question page: metadata, its answers, and related
    /// question links.
    async fn fetch_question(&self, id: &str) -> Result<FetchedQuestion>;

    /// Fetch an article page: content plus recommended-article links.
    async fn fetch_article(&self, id: &str) -> Result<FetchedArticle>;

    /// Fetch a topic's metadata and the questions surfaced by its feeds.
    /// Used only for frontier seeding.
    async fn fetch_topic(&self, id: &str) -> Result<FetchedTopic>;
}

// ============================================================================
// CREDENTIAL STORE: login/cookie persistence
// ============================================================================

/// Stored-credential collaborator. The blob is opaque to the core; the
/// fetcher knows how to interpret it.
pub trait CredentialStore: Send + Sync {
    fn has_credentials(&self) -> bool;

    fn load(&self) -> Result<String>;
}

/// Credential store for anonymous sessions.
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn has_credentials(&self) -> bool {
        false
    }

    fn load(&self) -> Result<String> {
        anyhow::bail!("no credentials configured")
    }
}

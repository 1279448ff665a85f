use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENUMS (type-safe states)
// ============================================================================

/// Kinds of crawl targets the queue can hold.
///
/// Answers are never queued: they are discovered and consumed inside a
/// single question-page crawl, and only show up as visited keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Question,
    Article,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Question => "question",
            ItemKind::Article => "article",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A site-native timestamp: either raw epoch seconds as delivered by the
/// feed APIs, or the normalized `YYYY-MM-DD HH:MM` form we persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Epoch(i64),
    Formatted(String),
}

impl Timestamp {
    /// Normalize to the human-readable form. Already-formatted values pass
    /// through; an epoch outside chrono's range is kept as-is.
    pub fn normalized(&self) -> Timestamp {
        match self {
            Timestamp::Epoch(secs) => match Utc.timestamp_opt(*secs, 0).single() {
                Some(dt) => Timestamp::Formatted(dt.format("%Y-%m-%d %H:%M").to_string()),
                None => self.clone(),
            },
            Timestamp::Formatted(s) => Timestamp::Formatted(s.clone()),
        }
    }
}

// ============================================================================
// WORK QUEUE / VISITED KEYS
// ============================================================================

/// One pending crawl target. Serialized one-per-line in the queue log;
/// the `type` field name is part of the on-disk compatibility surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub id: String,
    pub priority: u8,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl QueueItem {
    pub fn new(kind: ItemKind, id: impl Into<String>, priority: u8, source: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            priority,
            source: source.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Dedup key shared with the visited set.
    pub fn visit_key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }
}

/// Visited-set key for an entity that never enters the queue.
pub fn visit_key(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

// ============================================================================
// ENTITY DOCUMENTS
// ============================================================================

/// Embedded author snapshot as it appears inside answers and articles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorRef {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// Standalone author document. Write-once: never overwritten after the
/// first save, since later observations are not guaranteed to be richer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub crawled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelatedQuestion {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// Denormalized per-answer summary stored on the parent question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerSummary {
    pub answer_id: String,
    pub voteup_count: u64,
    pub author_name: String,
}

/// Lightweight reference to a recommended article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleRef {
    pub id: String,
    pub title: String,
    pub voteup_count: u64,
}

/// Snapshot of a highly-voted comment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommentSnapshot {
    pub author_name: String,
    pub content: String,
    pub voteup_count: u64,
}

/// Full question document as read back from `questions/{id}/meta.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub detail: String,
    pub follower_count: u64,
    pub answer_count: u64,
    pub topics: Vec<String>,
    pub related_questions: Vec<RelatedQuestion>,
    pub answer_summaries: Vec<AnswerSummary>,
    pub url: String,
    pub source: Option<String>,
    /// True while only a placeholder exists (created eagerly so answers
    /// always have a parent); cleared by a full question crawl.
    pub needs_fetch: bool,
    pub crawled_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial question update. Absent fields are left untouched in the stored
/// document; the store overlays present fields and restamps `updatedAt`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_questions: Option<Vec<RelatedQuestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_summaries: Option<Vec<AnswerSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_fetch: Option<bool>,
}

/// Answer document, stored under `questions/{qid}/answers/{aid}.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Answer {
    pub id: String,
    pub question_id: String,
    pub content: String,
    pub excerpt: String,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub created_time: Option<Timestamp>,
    pub updated_time: Option<Timestamp>,
    pub author: AuthorRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_comment: Option<CommentSnapshot>,
    pub url: String,
    pub crawled_at: Option<DateTime<Utc>>,
}

/// Article document, stored under `articles/{id}.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    /// Raw page snapshot kept for later re-extraction, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub created_time: Option<Timestamp>,
    pub updated_time: Option<Timestamp>,
    pub author: AuthorRef,
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_comments: Option<Vec<CommentSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<ArticleRef>>,
    pub url: String,
    pub image_url: String,
    pub source: Option<String>,
    pub crawled_at: Option<DateTime<Utc>>,
}

/// Topic document, stored under `topics/{id}.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub description: String,
    pub follower_count: u64,
    pub question_ids: Vec<String>,
    pub article_ids: Vec<String>,
    pub url: String,
    pub feeds_crawled: Option<u64>,
    pub crawled_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial topic update, merge semantics identical to [`QuestionPatch`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feeds_crawled: Option<u64>,
}

// ============================================================================
// FETCH RESULTS (what the page-fetch collaborator yields)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FetchedQuestion {
    pub title: String,
    pub detail: String,
    pub follower_count: u64,
    pub topics: Vec<String>,
    pub url: String,
    pub answers: Vec<Answer>,
    pub related_questions: Vec<RelatedQuestion>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedArticle {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub raw_html: Option<String>,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub created_time: Option<Timestamp>,
    pub updated_time: Option<Timestamp>,
    pub author: AuthorRef,
    pub topics: Vec<String>,
    pub top_comments: Option<Vec<CommentSnapshot>>,
    pub recommendations: Vec<ArticleRef>,
    pub url: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedTopic {
    pub name: String,
    pub description: String,
    pub follower_count: u64,
    pub url: String,
    /// Questions surfaced across the topic's feed tabs, in discovery order.
    pub questions: Vec<RelatedQuestion>,
}

// ============================================================================
// FEED ITEMS (topic-feed exports ingested by seed/import)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedItemKind {
    Answer,
    Article,
    Question,
    #[serde(other)]
    Other,
}

/// One item from an exported topic feed. Every field except `id` and the
/// kind tag is optional on the wire; defaults are resolved here, once,
/// instead of ad hoc in each consumer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(rename = "type")]
    pub kind: FeedItemKind,
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub voteup_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub created_time: Option<Timestamp>,
    #[serde(default)]
    pub updated_time: Option<Timestamp>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub question: Option<RelatedQuestion>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

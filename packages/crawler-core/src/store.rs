//! Flat-file JSON document store.
//!
//! Layout under the data root:
//!
//! ```text
//! data/
//! ├── questions/{qid}/
//! │   ├── meta.json
//! │   └── answers/{aid}.json
//! ├── articles/{id}.json
//! ├── authors/{id}.json
//! ├── topics/{id}.json
//! └── .state/
//!     ├── queue.jsonl
//!     ├── visited.json
//!     └── stats.json
//! ```
//!
//! Question and topic documents merge on save; answers and articles are
//! replaced wholesale with a fresh `crawledAt` stamp; authors are
//! write-once. Every write goes through a temp-file rename so a crash
//! mid-write never leaves a half-written document behind.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::types::{Answer, Article, Author, AuthorRef, Question, QuestionPatch, Topic, TopicPatch};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

/// Per-type document counts, computed by enumerating the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub questions: usize,
    pub answers: usize,
    pub articles: usize,
    pub authors: usize,
    pub topics: usize,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn questions_dir(&self) -> PathBuf {
        self.root.join("questions")
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.root.join("articles")
    }

    pub fn authors_dir(&self) -> PathBuf {
        self.root.join("authors")
    }

    pub fn topics_dir(&self) -> PathBuf {
        self.root.join("topics")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".state")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.state_dir().join("queue.jsonl")
    }

    pub fn visited_path(&self) -> PathBuf {
        self.state_dir().join("visited.json")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.state_dir().join("stats.json")
    }

    fn question_meta_path(&self, id: &str) -> PathBuf {
        self.questions_dir().join(id).join("meta.json")
    }

    fn answer_path(&self, question_id: &str, answer_id: &str) -> PathBuf {
        self.questions_dir()
            .join(question_id)
            .join("answers")
            .join(format!("{answer_id}.json"))
    }

    fn article_path(&self, id: &str) -> PathBuf {
        self.articles_dir().join(format!("{id}.json"))
    }

    fn author_path(&self, id: &str) -> PathBuf {
        self.authors_dir().join(format!("{id}.json"))
    }

    fn topic_path(&self, id: &str) -> PathBuf {
        self.topics_dir().join(format!("{id}.json"))
    }

    /// Create the directory skeleton. Idempotent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.questions_dir(),
            self.articles_dir(),
            self.authors_dir(),
            self.topics_dir(),
            self.state_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }

    // ========================================================================
    // SAVE
    // ========================================================================

    /// Merge-save a question document. Present patch fields overlay the
    /// existing document; `updatedAt` is restamped and the earliest
    /// `crawledAt` preserved.
    pub fn save_question(&self, id: &str, patch: &QuestionPatch) -> Result<PathBuf> {
        self.merge_save(&self.question_meta_path(id), id, patch)
    }

    /// Save an answer under its parent question, replacing any previous
    /// version. The parent question document is created eagerly (as a
    /// needs-fetch placeholder) if it does not exist yet, so an answer
    /// never references a missing question.
    pub fn save_answer(&self, question_id: &str, answer: &Answer) -> Result<PathBuf> {
        if !self.has_question(question_id) {
            self.save_question(
                question_id,
                &QuestionPatch {
                    needs_fetch: Some(true),
                    ..Default::default()
                },
            )?;
        }

        let mut doc = answer.clone();
        doc.question_id = question_id.to_string();
        doc.created_time = doc.created_time.map(|t| t.normalized());
        doc.updated_time = doc.updated_time.map(|t| t.normalized());
        doc.crawled_at = Some(Utc::now());

        let path = self.answer_path(question_id, &answer.id);
        self.write_json(&path, &doc)?;
        Ok(path)
    }

    /// Save an article, replacing any previous version.
    pub fn save_article(&self, article: &Article) -> Result<PathBuf> {
        let mut doc = article.clone();
        doc.created_time = doc.created_time.map(|t| t.normalized());
        doc.updated_time = doc.updated_time.map(|t| t.normalized());
        doc.crawled_at = Some(Utc::now());

        let path = self.article_path(&article.id);
        self.write_json(&path, &doc)?;
        Ok(path)
    }

    /// Save an author. First write wins: if the document already exists
    /// it is left untouched and `None` is returned.
    pub fn save_author(&self, profile: &AuthorRef) -> Result<Option<PathBuf>> {
        if profile.id.is_empty() {
            return Ok(None);
        }
        let path = self.author_path(&profile.id);
        if path.exists() {
            return Ok(None);
        }

        let doc = Author {
            id: profile.id.clone(),
            name: profile.name.clone(),
            headline: profile.headline.clone(),
            avatar_url: profile.avatar_url.clone(),
            url: profile.url.clone(),
            crawled_at: Some(Utc::now()),
        };
        self.write_json(&path, &doc)?;
        Ok(Some(path))
    }

    /// Merge-save a topic document, same semantics as [`save_question`].
    ///
    /// [`save_question`]: DocumentStore::save_question
    pub fn save_topic(&self, id: &str, patch: &TopicPatch) -> Result<PathBuf> {
        self.merge_save(&self.topic_path(id), id, patch)
    }

    fn merge_save(&self, path: &Path, id: &str, patch: &impl Serialize) -> Result<PathBuf> {
        let mut doc = self.read_object(path);
        let earliest_crawl = doc.get("crawledAt").cloned();

        if let Value::Object(fields) = serde_json::to_value(patch)? {
            for (key, value) in fields {
                doc.insert(key, value);
            }
        }

        let now = Value::String(Utc::now().to_rfc3339());
        doc.insert("id".to_string(), Value::String(id.to_string()));
        doc.insert("updatedAt".to_string(), now.clone());
        doc.insert(
            "crawledAt".to_string(),
            earliest_crawl.unwrap_or(now),
        );

        self.write_json(path, &Value::Object(doc))?;
        Ok(path.to_path_buf())
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    pub fn has_question(&self, id: &str) -> bool {
        self.question_meta_path(id).exists()
    }

    pub fn has_answer(&self, question_id: &str, answer_id: &str) -> bool {
        self.answer_path(question_id, answer_id).exists()
    }

    pub fn has_article(&self, id: &str) -> bool {
        self.article_path(id).exists()
    }

    pub fn has_author(&self, id: &str) -> bool {
        self.author_path(id).exists()
    }

    pub fn has_topic(&self, id: &str) -> bool {
        self.topic_path(id).exists()
    }

    pub fn get_question(&self, id: &str) -> Option<Question> {
        self.read_doc(&self.question_meta_path(id))
    }

    pub fn get_answer(&self, question_id: &str, answer_id: &str) -> Option<Answer> {
        self.read_doc(&self.answer_path(question_id, answer_id))
    }

    pub fn get_article(&self, id: &str) -> Option<Article> {
        self.read_doc(&self.article_path(id))
    }

    pub fn get_author(&self, id: &str) -> Option<Author> {
        self.read_doc(&self.author_path(id))
    }

    pub fn get_topic(&self, id: &str) -> Option<Topic> {
        self.read_doc(&self.topic_path(id))
    }

    /// Ids of all stored questions (directory names).
    pub fn question_ids(&self) -> Vec<String> {
        let dir = self.questions_dir();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Count documents per type by enumerating the store. Crawl sessions
    /// are long-running and low-QPS, so listing cost is acceptable.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();

        for qid in self.question_ids() {
            stats.questions += 1;
            let answers_dir = self.questions_dir().join(&qid).join("answers");
            stats.answers += count_json_files(&answers_dir);
        }
        stats.articles = count_json_files(&self.articles_dir());
        stats.authors = count_json_files(&self.authors_dir());
        stats.topics = count_json_files(&self.topics_dir());

        stats
    }

    /// Recompute stats and persist the snapshot, with optional extra
    /// fields (e.g. seed sources).
    pub fn save_stats(&self, extra: &Map<String, Value>) -> Result<StoreStats> {
        let stats = self.stats();

        let mut doc = match serde_json::to_value(&stats)? {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        for (key, value) in extra {
            doc.insert(key.clone(), value.clone());
        }
        doc.insert(
            "lastUpdated".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        self.write_json(&self.stats_path(), &Value::Object(doc))?;
        Ok(stats)
    }

    // ========================================================================
    // JSON PLUMBING
    // ========================================================================

    /// Read a typed document. Missing or malformed files read as absent.
    fn read_doc<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(error) => {
                warn!(path = %path.display(), %error, "malformed document, treating as absent");
                None
            }
        }
    }

    /// Read a document as a raw JSON object, defaulting to empty.
    fn read_object(&self, path: &Path) -> Map<String, Value> {
        let Ok(raw) = fs::read_to_string(path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %path.display(), "malformed document, starting from empty");
                Map::new()
            }
        }
    }

    fn write_json(&self, path: &Path, doc: &impl Serialize) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let body = serde_json::to_vec_pretty(doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }
}

fn count_json_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext == "json")
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, DocumentStore) {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure_dirs().unwrap();
        (dir, store)
    }

    fn answer(id: &str) -> Answer {
        Answer {
            id: id.to_string(),
            content: format!("content {id}"),
            author: AuthorRef {
                id: format!("author-{id}"),
                name: "someone".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn merge_save_is_non_destructive() {
        let (_dir, store) = store();

        store
            .save_question(
                "q1",
                &QuestionPatch {
                    follower_count: Some(10),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .save_question(
                "q1",
                &QuestionPatch {
                    title: Some("T2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let doc = store.get_question("q1").unwrap();
        assert_eq!(doc.title, "T2");
        assert_eq!(doc.follower_count, 10);
        assert_eq!(doc.id, "q1");
    }

    #[test]
    fn merge_save_preserves_earliest_crawled_at() {
        let (_dir, store) = store();

        store
            .save_question("q1", &QuestionPatch::default())
            .unwrap();
        let first = store.get_question("q1").unwrap().crawled_at.unwrap();

        store
            .save_question(
                "q1",
                &QuestionPatch {
                    title: Some("later".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let doc = store.get_question("q1").unwrap();

        assert_eq!(doc.crawled_at.unwrap(), first);
        assert!(doc.updated_at.unwrap() >= first);
    }

    #[test]
    fn author_save_is_write_once() {
        let (_dir, store) = store();

        let first = AuthorRef {
            id: "a1".to_string(),
            headline: "Y".to_string(),
            ..Default::default()
        };
        assert!(store.save_author(&first).unwrap().is_some());

        let second = AuthorRef {
            id: "a1".to_string(),
            headline: "X".to_string(),
            ..Default::default()
        };
        assert!(store.save_author(&second).unwrap().is_none());

        assert_eq!(store.get_author("a1").unwrap().headline, "Y");
    }

    #[test]
    fn author_save_skips_empty_id() {
        let (_dir, store) = store();
        assert!(store.save_author(&AuthorRef::default()).unwrap().is_none());
        assert_eq!(store.stats().authors, 0);
    }

    #[test]
    fn answer_save_creates_question_placeholder() {
        let (_dir, store) = store();

        store.save_answer("q9", &answer("a1")).unwrap();

        let question = store.get_question("q9").unwrap();
        assert!(question.needs_fetch);
        let stored = store.get_answer("q9", "a1").unwrap();
        assert_eq!(stored.question_id, "q9");
        assert!(stored.crawled_at.is_some());
    }

    #[test]
    fn answer_save_normalizes_timestamps() {
        let (_dir, store) = store();

        let mut a = answer("a1");
        a.created_time = Some(Timestamp::Epoch(1_700_000_000));
        a.updated_time = Some(Timestamp::Formatted("2024-01-02 03:04".to_string()));
        store.save_answer("q1", &a).unwrap();

        let stored = store.get_answer("q1", "a1").unwrap();
        assert_eq!(
            stored.created_time,
            Some(Timestamp::Formatted("2023-11-14 22:13".to_string()))
        );
        assert_eq!(
            stored.updated_time,
            Some(Timestamp::Formatted("2024-01-02 03:04".to_string()))
        );
    }

    #[test]
    fn stats_count_by_enumeration() {
        let (_dir, store) = store();

        for id in ["a1", "a2"] {
            store.save_answer("qa", &answer(id)).unwrap();
        }
        for id in ["b1", "b2", "b3", "b4", "b5"] {
            store.save_answer("qb", &answer(id)).unwrap();
        }

        let stats = store.stats();
        assert_eq!(stats.questions, 2);
        assert_eq!(stats.answers, 7);
        assert_eq!(stats.articles, 0);
    }

    #[test]
    fn malformed_document_reads_as_absent() {
        let (_dir, store) = store();

        store
            .save_question("q1", &QuestionPatch::default())
            .unwrap();
        fs::write(store.questions_dir().join("q1").join("meta.json"), "{nope").unwrap();

        assert!(store.get_question("q1").is_none());

        // merge-save on top of the corrupt file starts from empty
        store
            .save_question(
                "q1",
                &QuestionPatch {
                    title: Some("recovered".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.get_question("q1").unwrap().title, "recovered");
    }

    #[test]
    fn save_stats_writes_snapshot_with_extras() {
        let (_dir, store) = store();
        store.save_answer("q1", &answer("a1")).unwrap();

        let mut extra = Map::new();
        extra.insert(
            "sources".to_string(),
            serde_json::json!(["topic_feed:123"]),
        );
        let stats = store.save_stats(&extra).unwrap();
        assert_eq!(stats.answers, 1);

        let raw = fs::read_to_string(store.stats_path()).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["answers"], 1);
        assert_eq!(doc["sources"][0], "topic_feed:123");
        assert!(doc["lastUpdated"].is_string());
    }

    #[test]
    fn topic_merge_matches_question_semantics() {
        let (_dir, store) = store();

        store
            .save_topic(
                "t1",
                &TopicPatch {
                    name: Some("rust".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .save_topic(
                "t1",
                &TopicPatch {
                    follower_count: Some(42),
                    ..Default::default()
                },
            )
            .unwrap();

        let topic = store.get_topic("t1").unwrap();
        assert_eq!(topic.name, "rust");
        assert_eq!(topic.follower_count, 42);
    }
}

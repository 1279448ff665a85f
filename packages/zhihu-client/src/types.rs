//! Response shapes for the Zhihu v4 JSON APIs.
//!
//! The site's payloads are inconsistent across endpoints and over time:
//! ids arrive as numbers or strings, most fields are omitted when empty,
//! and feed entries mix target types. Everything here is defensively
//! optional and converted once into the core's entity types at the
//! boundary.

use crawler_core::types::{
    Answer, ArticleRef, AuthorRef, CommentSnapshot, RelatedQuestion, Timestamp,
};
use serde::Deserialize;
use std::fmt;

/// Id field that is a JSON number on some endpoints and a string on others.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ApiId {
    Num(u64),
    Str(String),
}

impl Default for ApiId {
    fn default() -> Self {
        ApiId::Str(String::new())
    }
}

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiId::Num(n) => write!(f, "{n}"),
            ApiId::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub is_end: bool,
    pub next: Option<String>,
    pub totals: Option<u64>,
}

/// Standard list envelope: `{ "data": [...], "paging": {...} }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiAuthor {
    pub id: String,
    pub name: String,
    pub headline: String,
    pub avatar_url: String,
    pub url_token: String,
}

impl ApiAuthor {
    pub fn into_author_ref(self) -> AuthorRef {
        let url = if self.url_token.is_empty() {
            String::new()
        } else {
            format!("https://www.zhihu.com/people/{}", self.url_token)
        };
        AuthorRef {
            id: self.id,
            name: self.name,
            headline: self.headline,
            avatar_url: self.avatar_url,
            url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiQuestionRef {
    pub id: ApiId,
    pub title: String,
    pub url: String,
}

impl ApiQuestionRef {
    pub fn into_related(self) -> RelatedQuestion {
        let id = self.id.to_string();
        let url = if self.url.is_empty() && !id.is_empty() {
            format!("https://www.zhihu.com/question/{id}")
        } else {
            self.url
        };
        RelatedQuestion {
            id,
            title: self.title,
            url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiTopicRef {
    pub id: ApiId,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiComment {
    pub content: String,
    pub vote_count: u64,
    pub author: ApiAuthor,
}

impl ApiComment {
    pub fn into_snapshot(self) -> CommentSnapshot {
        CommentSnapshot {
            author_name: self.author.name,
            content: self.content,
            voteup_count: self.vote_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiAnswer {
    pub id: ApiId,
    pub content: String,
    pub excerpt: String,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub created_time: Option<i64>,
    pub updated_time: Option<i64>,
    pub author: ApiAuthor,
    pub question: Option<ApiQuestionRef>,
    pub url: String,
}

impl ApiAnswer {
    pub fn into_answer(self, question_id: &str) -> Answer {
        let id = self.id.to_string();
        let url = if self.url.is_empty() {
            format!("https://www.zhihu.com/question/{question_id}/answer/{id}")
        } else {
            self.url
        };
        Answer {
            id,
            question_id: question_id.to_string(),
            content: self.content,
            excerpt: self.excerpt,
            voteup_count: self.voteup_count,
            comment_count: self.comment_count,
            created_time: self.created_time.map(Timestamp::Epoch),
            updated_time: self.updated_time.map(Timestamp::Epoch),
            author: self.author.into_author_ref(),
            url,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiQuestionDetail {
    pub id: ApiId,
    pub title: String,
    pub detail: String,
    pub follower_count: u64,
    pub answer_count: u64,
    pub topics: Vec<ApiTopicRef>,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiArticle {
    pub id: ApiId,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub voteup_count: u64,
    pub comment_count: u64,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub author: ApiAuthor,
    pub image_url: String,
    pub url: String,
}

impl ApiArticle {
    pub fn into_article_ref(self) -> ArticleRef {
        ArticleRef {
            id: self.id.to_string(),
            title: self.title,
            voteup_count: self.voteup_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiTopicDetail {
    pub id: ApiId,
    pub name: String,
    pub introduction: String,
    pub followers_count: u64,
    pub url: String,
}

/// One feed entry. The `target.type` tag routes to the concrete payload;
/// kinds this client does not consume (pins, videos, roundtables) fall
/// into `Other` instead of failing the whole page.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    #[serde(default)]
    pub target: Option<FeedTarget>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedTarget {
    Answer(ApiAnswer),
    Article(ApiArticle),
    Question(ApiQuestionRef),
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_deserialize_from_numbers_and_strings() {
        let n: ApiId = serde_json::from_str("12345").unwrap();
        assert_eq!(n.to_string(), "12345");
        let s: ApiId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(s.to_string(), "abc123");
    }

    #[test]
    fn answer_feed_entry_round_trips_into_core_answer() {
        let entry: FeedEntry = serde_json::from_str(
            r#"{
                "target": {
                    "type": "answer",
                    "id": 999,
                    "content": "<p>body</p>",
                    "excerpt": "body",
                    "voteup_count": 42,
                    "comment_count": 3,
                    "created_time": 1700000000,
                    "author": { "id": "au1", "name": "writer", "url_token": "writer-1" },
                    "question": { "id": 55, "title": "Q" }
                }
            }"#,
        )
        .unwrap();

        let Some(FeedTarget::Answer(api)) = entry.target else {
            panic!("expected an answer target");
        };
        assert_eq!(api.question.as_ref().unwrap().id.to_string(), "55");

        let answer = api.into_answer("55");
        assert_eq!(answer.id, "999");
        assert_eq!(answer.question_id, "55");
        assert_eq!(answer.created_time, Some(Timestamp::Epoch(1_700_000_000)));
        assert_eq!(answer.author.url, "https://www.zhihu.com/people/writer-1");
        assert_eq!(answer.url, "https://www.zhihu.com/question/55/answer/999");
    }

    #[test]
    fn unconsumed_feed_kinds_map_to_other() {
        let entry: FeedEntry = serde_json::from_str(
            r#"{ "target": { "type": "pin", "id": 1, "whatever": true } }"#,
        )
        .unwrap();
        assert!(matches!(entry.target, Some(FeedTarget::Other)));

        // entries without a target at all are tolerated too
        let empty: FeedEntry = serde_json::from_str(r#"{ "verb": "FOLLOW" }"#).unwrap();
        assert!(empty.target.is_none());
    }

    #[test]
    fn paged_envelope_defaults_when_fields_are_absent() {
        let page: Paged<FeedEntry> = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        assert!(page.data.is_empty());
        assert!(!page.paging.is_end);
    }

    #[test]
    fn question_detail_tolerates_sparse_payloads() {
        let detail: ApiQuestionDetail =
            serde_json::from_str(r#"{ "id": 55, "title": "Q" }"#).unwrap();
        assert_eq!(detail.id.to_string(), "55");
        assert_eq!(detail.follower_count, 0);
        assert!(detail.topics.is_empty());
    }

    #[test]
    fn related_question_gets_a_canonical_url() {
        let related = ApiQuestionRef {
            id: ApiId::Num(77),
            title: "t".to_string(),
            url: String::new(),
        }
        .into_related();
        assert_eq!(related.url, "https://www.zhihu.com/question/77");
    }
}

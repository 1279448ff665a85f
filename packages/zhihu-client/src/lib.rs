//! HTTP client for the Zhihu v4 JSON feed APIs.
//!
//! Implements the core's `PageFetcher` contract: question pages with
//! their answers and related questions, articles with recommendations,
//! and topic feeds for seeding. Talks to the same JSON endpoints the
//! site's own frontend calls; no HTML parsing.

pub mod cookies;
pub mod error;
pub mod types;

pub use cookies::CookieStore;
pub use error::{ClientError, Result};

use async_trait::async_trait;
use crawler_core::types::{
    ArticleRef, CommentSnapshot, FetchedArticle, FetchedQuestion, FetchedTopic, RelatedQuestion,
    Timestamp,
};
use crawler_core::PageFetcher;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use types::{
    ApiArticle, ApiComment, ApiQuestionDetail, ApiQuestionRef, ApiTopicDetail, FeedEntry,
    FeedTarget, Paged,
};

const SITE_URL: &str = "https://www.zhihu.com";
const API_URL: &str = "https://www.zhihu.com/api/v4";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const PAGE_SIZE: usize = 20;
/// Answer pagination cap per question. Long-tail answers past this point
/// add little and multiply request volume.
const MAX_ANSWER_PAGES: usize = 5;

const TOPIC_FEED_TABS: [&str; 3] = ["top_activity", "essence", "timeline_activity"];

pub struct ZhihuClient {
    http: reqwest::Client,
    cookie_header: RwLock<Option<String>>,
}

impl Default for ZhihuClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ZhihuClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            cookie_header: RwLock::new(None),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self.http.get(url);
        if let Some(cookie) = self.cookie_header.read().await.as_deref() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Collect a question's answers across feed pages, up to the page cap.
    async fn question_answers(&self, id: &str) -> Result<Vec<types::ApiAnswer>> {
        let mut answers = Vec::new();
        for page in 0..MAX_ANSWER_PAGES {
            let url = format!(
                "{API_URL}/questions/{id}/feeds?limit={PAGE_SIZE}&offset={}&include=content,excerpt,voteup_count,comment_count,created_time,updated_time",
                page * PAGE_SIZE
            );
            let feed: Paged<FeedEntry> = self.get_json(&url).await?;
            let empty = feed.data.is_empty();
            for entry in feed.data {
                if let Some(FeedTarget::Answer(answer)) = entry.target {
                    answers.push(answer);
                }
            }
            if feed.paging.is_end || empty {
                break;
            }
        }
        debug!(question = id, count = answers.len(), "answers collected");
        Ok(answers)
    }

    async fn related_questions(&self, id: &str) -> Result<Vec<RelatedQuestion>> {
        let url = format!("{API_URL}/questions/{id}/similar-questions?limit=10");
        let page: Paged<ApiQuestionRef> = self.get_json(&url).await?;
        Ok(page.data.into_iter().map(|q| q.into_related()).collect())
    }

    /// Top comments for an article. A failure here degrades to an empty
    /// list: comments are decoration, not worth losing the article over.
    async fn article_comments(&self, id: &str) -> Vec<CommentSnapshot> {
        let url = format!("{API_URL}/articles/{id}/root_comments?order=score&limit=3");
        match self.get_json::<Paged<ApiComment>>(&url).await {
            Ok(page) => page.data.into_iter().map(|c| c.into_snapshot()).collect(),
            Err(error) => {
                warn!(article = id, %error, "comments unavailable");
                Vec::new()
            }
        }
    }

    async fn article_recommendations(&self, id: &str) -> Result<Vec<ArticleRef>> {
        let url = format!("{API_URL}/articles/{id}/recommendations?limit=10");
        let page: Paged<FeedEntry> = self.get_json(&url).await?;
        Ok(page
            .data
            .into_iter()
            .filter_map(|entry| match entry.target {
                Some(FeedTarget::Article(article)) => Some(article.into_article_ref()),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl PageFetcher for ZhihuClient {
    /// Interpret the stored blob as either a browser cookie export (JSON
    /// array of `{name, value}` pairs) or a ready `Cookie` header string.
    async fn apply_credentials(&self, raw: &str) -> anyhow::Result<()> {
        let header = match serde_json::from_str::<Vec<cookies::CookiePair>>(raw) {
            Ok(pairs) => pairs
                .iter()
                .map(|p| format!("{}={}", p.name, p.value))
                .collect::<Vec<_>>()
                .join("; "),
            Err(_) if raw.contains('=') => raw.trim().to_string(),
            Err(_) => {
                return Err(ClientError::Credentials(
                    "expected a cookie export array or a raw cookie header".to_string(),
                )
                .into())
            }
        };
        *self.cookie_header.write().await = Some(header);
        Ok(())
    }

    async fn warm_up(&self) -> anyhow::Result<()> {
        let mut request = self.http.get(SITE_URL);
        if let Some(cookie) = self.cookie_header.read().await.as_deref() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        let response = request.send().await.map_err(ClientError::Network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                url: SITE_URL.to_string(),
            }
            .into());
        }
        debug!("session primed");
        Ok(())
    }

    async fn fetch_question(&self, id: &str) -> anyhow::Result<FetchedQuestion> {
        let detail_url =
            format!("{API_URL}/questions/{id}?include=detail,follower_count,answer_count,topics");
        let detail: ApiQuestionDetail = self.get_json(&detail_url).await?;

        let answers = self.question_answers(id).await?;
        let related_questions = self.related_questions(id).await?;

        Ok(FetchedQuestion {
            title: detail.title,
            detail: detail.detail,
            follower_count: detail.follower_count,
            topics: detail.topics.into_iter().map(|t| t.name).collect(),
            url: if detail.url.is_empty() {
                format!("{SITE_URL}/question/{id}")
            } else {
                detail.url
            },
            answers: answers.into_iter().map(|a| a.into_answer(id)).collect(),
            related_questions,
        })
    }

    async fn fetch_article(&self, id: &str) -> anyhow::Result<FetchedArticle> {
        let article: ApiArticle = self.get_json(&format!("{API_URL}/articles/{id}")).await?;
        let recommendations = self.article_recommendations(id).await?;
        let top_comments = self.article_comments(id).await;

        Ok(FetchedArticle {
            title: article.title,
            content: article.content,
            excerpt: article.excerpt,
            raw_html: None,
            voteup_count: article.voteup_count,
            comment_count: article.comment_count,
            created_time: article.created.map(Timestamp::Epoch),
            updated_time: article.updated.map(Timestamp::Epoch),
            author: article.author.into_author_ref(),
            topics: Vec::new(),
            top_comments: (!top_comments.is_empty()).then_some(top_comments),
            recommendations,
            url: if article.url.is_empty() {
                format!("https://zhuanlan.zhihu.com/p/{id}")
            } else {
                article.url
            },
            image_url: article.image_url,
        })
    }

    async fn fetch_topic(&self, id: &str) -> anyhow::Result<FetchedTopic> {
        let detail: ApiTopicDetail = self.get_json(&format!("{API_URL}/topics/{id}")).await?;

        let mut questions: Vec<RelatedQuestion> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for tab in TOPIC_FEED_TABS {
            let url = format!("{API_URL}/topics/{id}/feeds/{tab}?limit={PAGE_SIZE}");
            let feed: Paged<FeedEntry> = match self.get_json(&url).await {
                Ok(feed) => feed,
                // some tabs 404 on niche topics
                Err(error) => {
                    warn!(topic = id, tab, %error, "feed tab unavailable");
                    continue;
                }
            };
            for entry in feed.data {
                let question = match entry.target {
                    Some(FeedTarget::Answer(answer)) => answer.question.map(|q| q.into_related()),
                    Some(FeedTarget::Question(question)) => Some(question.into_related()),
                    _ => None,
                };
                if let Some(question) = question {
                    if !question.id.is_empty() && seen.insert(question.id.clone()) {
                        questions.push(question);
                    }
                }
            }
        }

        Ok(FetchedTopic {
            name: detail.name,
            description: detail.introduction,
            follower_count: detail.followers_count,
            url: if detail.url.is_empty() {
                format!("{SITE_URL}/topic/{id}")
            } else {
                detail.url
            },
            questions,
        })
    }
}

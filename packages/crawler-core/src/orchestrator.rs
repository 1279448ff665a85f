//! The crawl session loop.
//!
//! One logical worker drives one fetch session at a time: frontier pick,
//! dispatch to the per-kind handler, persist, pace, checkpoint. No
//! parallelism across targets — the frontier policy, the pacing delays
//! and politeness toward the site all require strict sequencing.
//!
//! Cancellation is checked only at loop-iteration boundaries: an in-flight
//! handler runs to completion before a stop request takes effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Map;
use tracing::{debug, error, info, warn};

use crate::config::CrawlerConfig;
use crate::frontier::FrontierPolicy;
use crate::queue::CrawlQueue;
use crate::store::{DocumentStore, StoreStats};
use crate::traits::{CredentialStore, PageFetcher};
use crate::types::{
    visit_key, AnswerSummary, Article, ItemKind, QuestionPatch, QueueItem,
};
use crate::visited::VisitedSet;

/// Why the session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every queued item is visited (or the queue is empty).
    FrontierExhausted,
    /// The `--max` item budget was reached.
    BudgetReached,
    /// An external interrupt requested a stop.
    Interrupted,
}

#[derive(Debug)]
pub struct CrawlSummary {
    pub processed: usize,
    pub reason: StopReason,
    pub stats: StoreStats,
}

pub struct Crawler<F, C> {
    store: DocumentStore,
    fetcher: F,
    credentials: C,
    config: CrawlerConfig,
    frontier: FrontierPolicy,
}

impl<F, C> Crawler<F, C>
where
    F: PageFetcher,
    C: CredentialStore,
{
    pub fn new(store: DocumentStore, fetcher: F, credentials: C, config: CrawlerConfig) -> Self {
        let frontier = FrontierPolicy::from_config(&config);
        Self {
            store,
            fetcher,
            credentials,
            config,
            frontier,
        }
    }

    /// Run a crawl session: WARMUP, then the main loop until the frontier
    /// is exhausted, the item budget is spent, or `stop` is raised.
    ///
    /// Warmup failures are fatal (no crawl is possible, and no state has
    /// been mutated yet). Once the loop starts, the shutdown checkpoint
    /// runs on every exit path, including loop-level errors.
    pub async fn run(&self, budget: Option<usize>, stop: Arc<AtomicBool>) -> Result<CrawlSummary> {
        self.store.ensure_dirs()?;

        let mut visited = VisitedSet::load(self.store.visited_path());
        let mut queue = CrawlQueue::load(self.store.queue_path());
        info!(visited = visited.len(), queued = queue.len(), "state loaded");

        if queue.is_empty() {
            warn!("queue is empty; seed a topic first");
            return Ok(CrawlSummary {
                processed: 0,
                reason: StopReason::FrontierExhausted,
                stats: self.store.stats(),
            });
        }

        // WARMUP
        if self.credentials.has_credentials() {
            let raw = self.credentials.load().context("loading credentials")?;
            self.fetcher
                .apply_credentials(&raw)
                .await
                .context("applying credentials")?;
            info!("stored credentials applied");
        }
        self.fetcher.warm_up().await.context("session warmup")?;

        // LOOP
        let outcome = self
            .run_loop(budget, &stop, &mut visited, &mut queue)
            .await;

        // STOPPING — reached from every loop exit path
        self.shutdown(&visited, &mut queue);

        let (processed, reason) = outcome?;
        Ok(CrawlSummary {
            processed,
            reason,
            stats: self.store.stats(),
        })
    }

    async fn run_loop(
        &self,
        budget: Option<usize>,
        stop: &AtomicBool,
        visited: &mut VisitedSet,
        queue: &mut CrawlQueue,
    ) -> Result<(usize, StopReason)> {
        let mut processed = 0usize;

        let reason = loop {
            if stop.load(Ordering::Relaxed) {
                break StopReason::Interrupted;
            }
            if budget.is_some_and(|max| processed >= max) {
                break StopReason::BudgetReached;
            }

            let Some(next) = self.frontier.pick(queue.items(), visited).cloned() else {
                info!("frontier exhausted");
                break StopReason::FrontierExhausted;
            };

            // The policy never returns visited items, but re-check before
            // dispatch: stale entries must not count against the budget.
            let key = next.visit_key();
            if visited.has(&key) {
                continue;
            }

            processed += 1;
            info!(item = %key, processed, "crawling");

            let outcome = match next.kind {
                ItemKind::Question => self.crawl_question(&next.id, visited, queue).await,
                ItemKind::Article => self.crawl_article(&next.id, visited, queue).await,
            };

            match outcome {
                // Pause between targets, imitating a reader moving on.
                Ok(()) => tokio::time::sleep(self.config.between_items.sample()).await,
                // Deliberately NOT marked visited: the item stays in the
                // frontier and is retried on a later iteration or run.
                Err(error) => {
                    warn!(item = %key, error = %format!("{error:#}"), "item failed, leaving unvisited for retry");
                }
            }

            if processed % self.config.checkpoint_interval == 0 {
                visited.save()?;
                self.store.save_stats(&Map::new())?;
                debug!(processed, "checkpoint saved");
            }
        };

        Ok((processed, reason))
    }

    /// Flush everything. Errors here are logged, never propagated, so a
    /// failing loop still gets its state persisted as well as possible.
    fn shutdown(&self, visited: &VisitedSet, queue: &mut CrawlQueue) {
        if let Err(error) = visited.save() {
            error!(%error, "failed to flush visited set");
        }
        if let Err(error) = queue.compact(visited) {
            error!(%error, "failed to compact queue");
        }
        if let Err(error) = self.store.save_stats(&Map::new()) {
            error!(%error, "failed to persist stats");
        }
        info!(
            visited = visited.len(),
            queued = queue.len(),
            "session closed"
        );
    }

    async fn crawl_question(
        &self,
        id: &str,
        visited: &mut VisitedSet,
        queue: &mut CrawlQueue,
    ) -> Result<()> {
        let fetched = self.fetcher.fetch_question(id).await?;

        let summaries: Vec<AnswerSummary> = fetched
            .answers
            .iter()
            .map(|a| AnswerSummary {
                answer_id: a.id.clone(),
                voteup_count: a.voteup_count,
                author_name: a.author.name.clone(),
            })
            .collect();

        self.store.save_question(
            id,
            &QuestionPatch {
                title: Some(fetched.title.clone()),
                detail: Some(fetched.detail.clone()),
                follower_count: Some(fetched.follower_count),
                answer_count: Some(fetched.answers.len() as u64),
                topics: Some(fetched.topics.clone()),
                related_questions: Some(fetched.related_questions.clone()),
                answer_summaries: Some(summaries),
                url: Some(fetched.url.clone()),
                needs_fetch: Some(false),
                ..Default::default()
            },
        )?;

        let mut new_answers = 0;
        for answer in &fetched.answers {
            if visited.add(&visit_key("answer", &answer.id)) {
                self.store.save_answer(id, answer)?;
                self.store.save_author(&answer.author)?;
                new_answers += 1;
            }
        }

        let mut discovered = 0;
        for related in &fetched.related_questions {
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
                discovered += 1;
            }
        }

        visited.add(&visit_key("question", id));
        visited.save()?;

        info!(
            question = id,
            new_answers,
            total = fetched.answers.len(),
            discovered,
            "question complete"
        );
        Ok(())
    }

    async fn crawl_article(
        &self,
        id: &str,
        visited: &mut VisitedSet,
        queue: &mut CrawlQueue,
    ) -> Result<()> {
        let fetched = self.fetcher.fetch_article(id).await?;

        if visited.add(&visit_key("article", id)) {
            let article = Article {
                id: id.to_string(),
                title: fetched.title.clone(),
                content: fetched.content.clone(),
                excerpt: fetched.excerpt.clone(),
                raw_html: fetched.raw_html.clone(),
                voteup_count: fetched.voteup_count,
                comment_count: fetched.comment_count,
                created_time: fetched.created_time.clone(),
                updated_time: fetched.updated_time.clone(),
                author: fetched.author.clone(),
                topics: fetched.topics.clone(),
                top_comments: fetched.top_comments.clone(),
                recommendations: (!fetched.recommendations.is_empty())
                    .then(|| fetched.recommendations.clone()),
                url: fetched.url.clone(),
                image_url: fetched.image_url.clone(),
                source: None,
                crawled_at: None,
            };
            self.store.save_article(&article)?;
            self.store.save_author(&fetched.author)?;
        }
        visited.save()?;

        if !fetched.recommendations.is_empty()
            && fastrand::f64() < self.config.follow_recommended
        {
            let mut added = 0;
            for rec in fetched
                .recommendations
                .iter()
                .take(self.config.max_recommended)
            {
                if rec.id.is_empty() || visited.has(&visit_key("article", &rec.id)) {
                    continue;
                }
                let item =
                    QueueItem::new(ItemKind::Article, rec.id.clone(), 4, format!("article:{id}"))
                        .with_title(rec.title.clone());
                if queue.add(item)? {
                    added += 1;
                }
            }
            if added > 0 {
                info!(from = id, added, "recommended articles queued");
            }
        }

        info!(article = id, title = %fetched.title, "article complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayRange;
    use crate::traits::NoCredentials;
    use crate::types::{
        Answer, ArticleRef, AuthorRef, FetchedArticle, FetchedQuestion, FetchedTopic,
        RelatedQuestion,
    };
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct MockFetcher {
        fail_first_n: AtomicUsize,
        fail_ids: HashSet<String>,
        related: Vec<RelatedQuestion>,
        recommendations: Vec<ArticleRef>,
        calls: Mutex<Vec<String>>,
    }

    impl MockFetcher {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn apply_credentials(&self, _raw: &str) -> Result<()> {
            self.record("apply_credentials");
            Ok(())
        }

        async fn warm_up(&self) -> Result<()> {
            self.record("warm_up");
            Ok(())
        }

        async fn fetch_question(&self, id: &str) -> Result<FetchedQuestion> {
            self.record(format!("question:{id}"));
            if self.fail_ids.contains(id) {
                anyhow::bail!("page structure miss");
            }
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("network timeout");
            }
            Ok(FetchedQuestion {
                title: format!("Question {id}"),
                follower_count: 10,
                url: format!("https://example.com/question/{id}"),
                answers: vec![Answer {
                    id: format!("ans-{id}"),
                    voteup_count: 3,
                    author: AuthorRef {
                        id: format!("author-{id}"),
                        name: "writer".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                }],
                related_questions: self.related.clone(),
                ..Default::default()
            })
        }

        async fn fetch_article(&self, id: &str) -> Result<FetchedArticle> {
            self.record(format!("article:{id}"));
            Ok(FetchedArticle {
                title: format!("Article {id}"),
                recommendations: self.recommendations.clone(),
                author: AuthorRef {
                    id: format!("author-{id}"),
                    ..Default::default()
                },
                ..Default::default()
            })
        }

        async fn fetch_topic(&self, _id: &str) -> Result<FetchedTopic> {
            unimplemented!("not used by the session loop")
        }
    }

    fn test_config() -> CrawlerConfig {
        CrawlerConfig::default()
            .with_between_items(DelayRange::new(0, 0))
            .with_checkpoint_interval(2)
    }

    fn seeded_store(dir: &tempfile::TempDir, ids: &[&str]) -> DocumentStore {
        let store = DocumentStore::new(dir.path());
        store.ensure_dirs().unwrap();
        let mut queue = CrawlQueue::load(store.queue_path());
        for id in ids {
            queue
                .add(QueueItem::new(ItemKind::Question, *id, 2, "seed"))
                .unwrap();
        }
        store
    }

    fn stop_flag() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[tokio::test]
    async fn empty_queue_ends_before_warmup() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure_dirs().unwrap();

        let fetcher = MockFetcher::default();
        let crawler = Crawler::new(store, fetcher, NoCredentials, test_config());
        let summary = crawler.run(None, stop_flag()).await.unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.reason, StopReason::FrontierExhausted);
        assert!(crawler.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn crawls_until_frontier_exhausted() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["1", "2"]);

        let crawler = Crawler::new(store, MockFetcher::default(), NoCredentials, test_config());
        let summary = crawler.run(None, stop_flag()).await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.reason, StopReason::FrontierExhausted);
        assert_eq!(summary.stats.questions, 2);
        assert_eq!(summary.stats.answers, 2);
        assert_eq!(summary.stats.authors, 2);

        // both questions marked visited, queue compacted to empty
        let visited = VisitedSet::load(crawler.store.visited_path());
        assert!(visited.has("question:1"));
        assert!(visited.has("answer:ans-1"));
        let queue = CrawlQueue::load(crawler.store.queue_path());
        assert!(queue.is_empty());

        let question = crawler.store.get_question("1").unwrap();
        assert!(!question.needs_fetch);
        assert_eq!(question.answer_summaries.len(), 1);
        assert_eq!(question.answer_summaries[0].author_name, "writer");
    }

    #[tokio::test]
    async fn budget_stops_the_loop() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["1", "2", "3"]);

        let crawler = Crawler::new(store, MockFetcher::default(), NoCredentials, test_config());
        let summary = crawler.run(Some(1), stop_flag()).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.reason, StopReason::BudgetReached);

        // unprocessed items survive compaction
        let queue = CrawlQueue::load(crawler.store.queue_path());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn failed_item_stays_unvisited_and_is_retried() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["x"]);

        let fetcher = MockFetcher {
            fail_first_n: AtomicUsize::new(1),
            ..Default::default()
        };
        let crawler = Crawler::new(store, fetcher, NoCredentials, test_config());
        let summary = crawler.run(Some(5), stop_flag()).await.unwrap();

        // attempt 1 fails, attempt 2 succeeds, then the frontier is empty
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.reason, StopReason::FrontierExhausted);
        assert_eq!(
            crawler.fetcher.calls(),
            vec!["warm_up", "question:x", "question:x"]
        );

        let visited = VisitedSet::load(crawler.store.visited_path());
        assert!(visited.has("question:x"));
        assert!(CrawlQueue::load(crawler.store.queue_path()).is_empty());
    }

    #[tokio::test]
    async fn permanently_failing_item_never_becomes_visited() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["bad"]);

        let fetcher = MockFetcher {
            fail_ids: HashSet::from(["bad".to_string()]),
            ..Default::default()
        };
        let crawler = Crawler::new(store, fetcher, NoCredentials, test_config());
        let summary = crawler.run(Some(3), stop_flag()).await.unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.reason, StopReason::BudgetReached);

        let visited = VisitedSet::load(crawler.store.visited_path());
        assert!(!visited.has("question:bad"));
        // still queued for the next run
        assert_eq!(CrawlQueue::load(crawler.store.queue_path()).len(), 1);
    }

    #[tokio::test]
    async fn interrupt_stops_at_iteration_boundary() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["1", "2"]);

        let stop = stop_flag();
        stop.store(true, Ordering::Relaxed);

        let crawler = Crawler::new(store, MockFetcher::default(), NoCredentials, test_config());
        let summary = crawler.run(None, stop).await.unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.reason, StopReason::Interrupted);
    }

    #[tokio::test]
    async fn related_questions_enter_the_queue() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir, &["1"]);

        let fetcher = MockFetcher {
            related: vec![RelatedQuestion {
                id: "90".to_string(),
                title: "follow-up".to_string(),
                url: String::new(),
            }],
            ..Default::default()
        };
        let crawler = Crawler::new(store, fetcher, NoCredentials, test_config());
        // budget 1 so the discovered question is left for a later run
        crawler.run(Some(1), stop_flag()).await.unwrap();

        let queue = CrawlQueue::load(crawler.store.queue_path());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.items()[0].id, "90");
        assert_eq!(queue.items()[0].priority, 2);
        assert_eq!(queue.items()[0].source, "related:1");
    }

    #[tokio::test]
    async fn article_recommendations_respect_probability_and_cap() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure_dirs().unwrap();
        let mut queue = CrawlQueue::load(store.queue_path());
        queue
            .add(QueueItem::new(ItemKind::Article, "a1", 4, "seed"))
            .unwrap();

        let fetcher = MockFetcher {
            recommendations: (0..5)
                .map(|i| ArticleRef {
                    id: format!("rec-{i}"),
                    title: format!("rec {i}"),
                    voteup_count: 0,
                })
                .collect(),
            ..Default::default()
        };
        // always follow recommendations so the cap is observable
        let config = test_config().with_follow_recommended(1.0);
        let crawler = Crawler::new(store, fetcher, NoCredentials, config);
        crawler.run(Some(1), stop_flag()).await.unwrap();

        let queue = CrawlQueue::load(crawler.store.queue_path());
        let recs: Vec<&str> = queue
            .items()
            .iter()
            .filter(|i| i.kind == ItemKind::Article && i.source == "article:a1")
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(recs, ["rec-0", "rec-1", "rec-2"]);

        assert!(crawler.store.has_article("a1"));
        let visited = VisitedSet::load(crawler.store.visited_path());
        assert!(visited.has("article:a1"));
    }
}

//! Frontier bootstrapping: topic seeding and feed-export ingestion.
//!
//! Both paths end in the same place — answers and articles persisted
//! directly, questions queued for a full crawl — so the per-item logic is
//! shared in [`ingest_feed`]. Seeding fetches a live topic page; import
//! replays a previously exported feed file offline.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::queue::CrawlQueue;
use crate::store::DocumentStore;
use crate::traits::PageFetcher;
use crate::types::{
    visit_key, Answer, Article, FeedItem, FeedItemKind, ItemKind, QuestionPatch, QueueItem,
    TopicPatch,
};
use crate::visited::VisitedSet;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub answers: usize,
    pub articles: usize,
    pub questions_queued: usize,
    pub authors: usize,
    pub skipped: usize,
}

/// Extract the numeric topic id from a topic page URL, tolerating feed
/// suffixes like `/hot` or `/top-answers`.
pub fn parse_topic_id(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid topic url: {raw}"))?;
    let mut segments = url
        .path_segments()
        .with_context(|| format!("topic url has no path: {raw}"))?;
    while let Some(segment) = segments.next() {
        if segment == "topic" {
            if let Some(id) = segments.next() {
                if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
                    return Ok(id.to_string());
                }
            }
            break;
        }
    }
    bail!("no topic id in url: {raw}")
}

/// Read an exported feed file: a JSON array of feed items.
pub fn load_feed_export(path: &Path) -> Result<Vec<FeedItem>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading feed export {}", path.display()))?;
    let items: Vec<FeedItem> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(items)
}

/// Fetch a topic page, persist its metadata, and queue every question it
/// surfaces. Re-seeding the same topic is harmless: visited questions are
/// skipped and queued ones deduped.
pub async fn seed_topic<F: PageFetcher>(
    store: &DocumentStore,
    fetcher: &F,
    topic_url: &str,
) -> Result<IngestSummary> {
    let topic_id = parse_topic_id(topic_url)?;
    store.ensure_dirs()?;

    let visited = VisitedSet::load(store.visited_path());
    let mut queue = CrawlQueue::load(store.queue_path());

    let fetched = fetcher
        .fetch_topic(&topic_id)
        .await
        .with_context(|| format!("fetching topic {topic_id}"))?;

    store.save_topic(
        &topic_id,
        &TopicPatch {
            name: Some(fetched.name.clone()),
            description: Some(fetched.description.clone()),
            follower_count: Some(fetched.follower_count),
            question_ids: Some(fetched.questions.iter().map(|q| q.id.clone()).collect()),
            url: Some(if fetched.url.is_empty() {
                topic_url.to_string()
            } else {
                fetched.url.clone()
            }),
            ..Default::default()
        },
    )?;

    let mut summary = IngestSummary::default();
    let source = format!("topic:{topic_id}");
    for question in &fetched.questions {
        if question.id.is_empty() || visited.has(&visit_key("question", &question.id)) {
            summary.skipped += 1;
            continue;
        }
        let item = QueueItem::new(ItemKind::Question, question.id.clone(), 2, source.clone())
            .with_title(question.title.clone());
        if queue.add(item)? {
            summary.questions_queued += 1;
        }
    }

    queue.compact(&visited)?;
    visited.save()?;
    let mut extra = Map::new();
    extra.insert(
        "lastSeedTopic".to_string(),
        Value::String(topic_id.clone()),
    );
    store.save_stats(&extra)?;

    info!(
        topic = %topic_id,
        name = %fetched.name,
        queued = summary.questions_queued,
        skipped = summary.skipped,
        "topic seeded"
    );
    Ok(summary)
}

/// Load state, ingest an exported feed file, and flush. The offline
/// counterpart of [`seed_topic`].
pub fn import_feed_file(store: &DocumentStore, path: &Path) -> Result<IngestSummary> {
    store.ensure_dirs()?;
    let items = load_feed_export(path)?;

    let mut visited = VisitedSet::load(store.visited_path());
    let mut queue = CrawlQueue::load(store.queue_path());

    let summary = ingest_feed(store, &mut visited, &mut queue, &items)?;

    queue.compact(&visited)?;
    visited.save()?;
    store.save_stats(&Map::new())?;

    info!(
        file = %path.display(),
        answers = summary.answers,
        articles = summary.articles,
        questions_queued = summary.questions_queued,
        skipped = summary.skipped,
        "feed imported"
    );
    Ok(summary)
}

/// Persist feed items and queue the questions they reference.
///
/// Answers and articles carry their full content in the feed, so they are
/// stored immediately and marked visited; questions only carry a title, so
/// they are queued for a real crawl with a `needsFetch` placeholder.
pub fn ingest_feed(
    store: &DocumentStore,
    visited: &mut VisitedSet,
    queue: &mut CrawlQueue,
    items: &[FeedItem],
) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for item in items {
        if item.id.is_empty() {
            summary.skipped += 1;
            continue;
        }
        match item.kind {
            FeedItemKind::Answer => ingest_answer(store, visited, queue, item, &mut summary)?,
            FeedItemKind::Article => ingest_article(store, visited, item, &mut summary)?,
            FeedItemKind::Question => ingest_question(store, visited, queue, item, &mut summary)?,
            FeedItemKind::Other => {
                debug!(id = %item.id, "unsupported feed item kind, skipping");
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

fn ingest_answer(
    store: &DocumentStore,
    visited: &mut VisitedSet,
    queue: &mut CrawlQueue,
    item: &FeedItem,
    summary: &mut IngestSummary,
) -> Result<()> {
    let Some(question) = &item.question else {
        warn!(answer = %item.id, "feed answer without a parent question, skipping");
        summary.skipped += 1;
        return Ok(());
    };
    if question.id.is_empty() {
        summary.skipped += 1;
        return Ok(());
    }
    if !visited.add(&visit_key("answer", &item.id)) {
        summary.skipped += 1;
        return Ok(());
    }

    let answer = Answer {
        id: item.id.clone(),
        question_id: question.id.clone(),
        content: item.content.clone(),
        excerpt: item.excerpt.clone(),
        voteup_count: item.voteup_count,
        comment_count: item.comment_count,
        created_time: item.created_time.clone(),
        updated_time: item.updated_time.clone(),
        author: item.author.clone().unwrap_or_default(),
        url: item.url.clone(),
        ..Default::default()
    };
    // save_answer creates the question placeholder; patch its title after
    // so the placeholder's needsFetch flag is left standing.
    store.save_answer(&question.id, &answer)?;
    summary.answers += 1;
    if !question.title.is_empty() {
        store.save_question(
            &question.id,
            &QuestionPatch {
                title: Some(question.title.clone()),
                url: (!question.url.is_empty()).then(|| question.url.clone()),
                ..Default::default()
            },
        )?;
    }

    if let Some(author) = &item.author {
        if store.save_author(author)?.is_some() {
            summary.authors += 1;
        }
    }

    if !visited.has(&visit_key("question", &question.id)) {
        let queued = QueueItem::new(ItemKind::Question, question.id.clone(), 2, "feed")
            .with_title(question.title.clone());
        if queue.add(queued)? {
            summary.questions_queued += 1;
        }
    }
    Ok(())
}

fn ingest_article(
    store: &DocumentStore,
    visited: &mut VisitedSet,
    item: &FeedItem,
    summary: &mut IngestSummary,
) -> Result<()> {
    if !visited.add(&visit_key("article", &item.id)) {
        summary.skipped += 1;
        return Ok(());
    }

    let article = Article {
        id: item.id.clone(),
        title: item.title.clone(),
        content: item.content.clone(),
        excerpt: item.excerpt.clone(),
        voteup_count: item.voteup_count,
        comment_count: item.comment_count,
        created_time: item.created_time.clone(),
        updated_time: item.updated_time.clone(),
        author: item.author.clone().unwrap_or_default(),
        url: item.url.clone(),
        image_url: item.image_url.clone(),
        source: Some("feed".to_string()),
        ..Default::default()
    };
    store.save_article(&article)?;
    summary.articles += 1;

    if let Some(author) = &item.author {
        if store.save_author(author)?.is_some() {
            summary.authors += 1;
        }
    }
    Ok(())
}

fn ingest_question(
    store: &DocumentStore,
    visited: &mut VisitedSet,
    queue: &mut CrawlQueue,
    item: &FeedItem,
    summary: &mut IngestSummary,
) -> Result<()> {
    if visited.has(&visit_key("question", &item.id)) {
        summary.skipped += 1;
        return Ok(());
    }

    store.save_question(
        &item.id,
        &QuestionPatch {
            title: (!item.title.is_empty()).then(|| item.title.clone()),
            url: (!item.url.is_empty()).then(|| item.url.clone()),
            needs_fetch: Some(true),
            ..Default::default()
        },
    )?;
    let queued = QueueItem::new(ItemKind::Question, item.id.clone(), 2, "feed")
        .with_title(item.title.clone());
    if queue.add(queued)? {
        summary.questions_queued += 1;
    }
    Ok(())
}

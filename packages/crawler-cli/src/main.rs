//! `crawler` — drive the Q&A-site archive from the command line.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crawler_core::{
    compact_queue, import_feed_file, queue_related_questions, requeue_questions, seed_topic,
    Crawler, CrawlerConfig, CredentialStore, DocumentStore, IngestSummary, PageFetcher,
    StatusReport, StopReason,
};
use zhihu_client::{CookieStore, ZhihuClient};

#[derive(Parser)]
#[command(name = "crawler", version, about = "Q&A-site crawl orchestrator")]
struct Cli {
    /// Data directory holding documents and crawl state.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Cookie export applied to the fetch session, when present.
    #[arg(long, global = true, default_value = "cookies.json")]
    cookies: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a crawl session until the frontier is exhausted.
    Crawl {
        /// Stop after this many processed items.
        #[arg(long)]
        max: Option<usize>,
    },
    /// Show document, queue and visited statistics.
    Status,
    /// Fetch a topic page and queue the questions it surfaces.
    Seed {
        /// Topic page URL, e.g. https://www.zhihu.com/topic/19550517/hot
        topic_url: String,
    },
    /// Ingest an exported topic-feed JSON file.
    Import { file: PathBuf },
    /// List pending queue entries.
    Queue,
    /// Drop visited entries from the queue log (dry run unless --run).
    Compact {
        #[arg(long)]
        run: bool,
    },
    /// Return all stored questions to the frontier for a refresh. With
    /// --related, queue their uncrawled related-question references
    /// instead.
    Requeue {
        #[arg(long)]
        related: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawler_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let store = DocumentStore::new(&cli.data_dir);

    match cli.command {
        Command::Crawl { max } => crawl(store, &cli.cookies, max).await,
        Command::Status => {
            print_status(&store);
            Ok(())
        }
        Command::Seed { topic_url } => {
            let client = connected_client(&cli.cookies).await?;
            let summary = seed_topic(&store, &client, &topic_url).await?;
            print_ingest(&summary);
            Ok(())
        }
        Command::Import { file } => {
            let summary = import_feed_file(&store, &file)?;
            print_ingest(&summary);
            Ok(())
        }
        Command::Queue => {
            print_queue(&store);
            Ok(())
        }
        Command::Compact { run } => {
            let outcome = compact_queue(&store, !run)?;
            let label = if run {
                "compacted".green()
            } else {
                "dry run".yellow()
            };
            println!(
                "{label}: {} entries, {} removable, {} remaining",
                outcome.before, outcome.removed, outcome.remaining
            );
            if let Some(backup) = outcome.backup {
                println!("backup written to {}", backup.display());
            }
            Ok(())
        }
        Command::Requeue { related } => {
            let count = if related {
                queue_related_questions(&store)?
            } else {
                requeue_questions(&store)?
            };
            println!("{} {} items queued", count.to_string().green(), "→".dimmed());
            Ok(())
        }
    }
}

/// Client with stored cookies applied, if the cookie file exists.
async fn connected_client(cookies: &PathBuf) -> Result<ZhihuClient> {
    let client = ZhihuClient::new();
    let credentials = CookieStore::new(cookies);
    if credentials.has_credentials() {
        client.apply_credentials(&credentials.load()?).await?;
    }
    client.warm_up().await?;
    Ok(client)
}

async fn crawl(store: DocumentStore, cookies: &PathBuf, max: Option<usize>) -> Result<()> {
    let crawler = Crawler::new(
        store,
        ZhihuClient::new(),
        CookieStore::new(cookies),
        CrawlerConfig::default(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "interrupt received, finishing current item".yellow());
            flag.store(true, Ordering::Relaxed);
        }
    });

    let summary = crawler.run(max, stop).await?;

    let reason = match summary.reason {
        StopReason::FrontierExhausted => "frontier exhausted".normal(),
        StopReason::BudgetReached => "item budget reached".normal(),
        StopReason::Interrupted => "interrupted".yellow(),
    };
    println!();
    println!(
        "{} {} items processed ({reason})",
        "done:".green().bold(),
        summary.processed
    );
    println!(
        "store now holds {} questions, {} answers, {} articles, {} authors, {} topics",
        summary.stats.questions,
        summary.stats.answers,
        summary.stats.articles,
        summary.stats.authors,
        summary.stats.topics
    );
    Ok(())
}

fn print_ingest(summary: &IngestSummary) {
    println!(
        "{} {} answers, {} articles, {} authors saved; {} questions queued; {} skipped",
        "ingested:".green().bold(),
        summary.answers,
        summary.articles,
        summary.authors,
        summary.questions_queued,
        summary.skipped
    );
}

fn print_status(store: &DocumentStore) {
    let report = StatusReport::gather(store, 5);

    println!("{}", "documents".bold());
    println!("  questions  {}", report.stats.questions.to_string().cyan());
    println!("  answers    {}", report.stats.answers.to_string().cyan());
    println!("  articles   {}", report.stats.articles.to_string().cyan());
    println!("  authors    {}", report.stats.authors.to_string().cyan());
    println!("  topics     {}", report.stats.topics.to_string().cyan());

    println!("{}", "queue".bold());
    println!(
        "  {} entries, {} pending",
        report.queued,
        report.pending.to_string().green()
    );
    for (kind, count) in &report.queued_by_kind {
        println!("  by kind    {kind}: {count}");
    }
    for (source, count) in &report.queued_by_source {
        println!("  by source  {source}: {count}");
    }

    println!("{}", "visited".bold());
    println!("  {} keys", report.visited);
    for (kind, count) in &report.visited_by_kind {
        println!("  {kind}: {count}");
    }

    if !report.recent.is_empty() {
        println!("{}", "up next (recency window)".bold());
        for item in &report.recent {
            println!(
                "  {} {} {}",
                item.kind.as_str().blue(),
                item.id,
                item.title.as_deref().unwrap_or("").dimmed()
            );
        }
    }
}

fn print_queue(store: &DocumentStore) {
    let report = StatusReport::gather(store, usize::MAX);
    if report.recent.is_empty() {
        println!("queue is empty");
        return;
    }
    for item in &report.recent {
        println!(
            "{:>8} {:<8} p{} {:<16} {}",
            item.id,
            item.kind.as_str().blue(),
            item.priority,
            item.source.dimmed(),
            item.title.as_deref().unwrap_or("")
        );
    }
    println!("{} pending of {} queued", report.pending, report.queued);
}

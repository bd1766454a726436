use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use libnewsthread::db::ThreadWithPosts;
use libnewsthread::types::{ThreadStatus, UsageCounter};
use libnewsthread::{Config, Database};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "newsthread-history")]
#[command(version, about = "Inspect published threads and monthly API usage")]
#[command(long_about = r#"Inspect published threads and monthly API usage.

EXAMPLES:
    # Show the last 10 threads (default) with their posts
    newsthread-history

    # Only threads that stopped early
    newsthread-history --status partial

    # JSON output for scripting
    newsthread-history --format json | jq '.[] | .thread.published_count'

    # Monthly request counters
    newsthread-history --usage
    newsthread-history --usage --month 2026-10

OUTPUT FORMATS:
    text  - Human-readable summary (default)
    json  - JSON array
    jsonl - JSON lines, one object per line

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (database not found, query failed, etc.)
"#)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Maximum number of threads to show
    #[arg(short = 'n', long, default_value_t = 10)]
    limit: usize,

    /// Only show threads with this status (partial, completed, failed)
    #[arg(long)]
    status: Option<ThreadStatus>,

    /// Show monthly usage counters instead of threads
    #[arg(long)]
    usage: bool,

    /// Restrict usage counters to one month (YYYY-MM)
    #[arg(long, requires = "usage")]
    month: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    libnewsthread::logging::LoggingConfig::from_env().init();

    tracing::debug!("newsthread-history started with args: {:?}", args);

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let db_path = shellexpand::tilde(&config.database.path).to_string();
    if !std::path::Path::new(&db_path).exists() {
        eprintln!("Error: Database not found at {}", db_path);
        eprintln!("Has newsthread-run completed a run yet?");
        std::process::exit(1);
    }

    let db = Database::new(&db_path)
        .await
        .context("Failed to open database")?;

    if args.usage {
        let counters = db
            .list_usage(args.month.as_deref())
            .await
            .context("Failed to query usage counters")?;
        print_usage(&counters, args.format)?;
    } else {
        let threads = db
            .list_threads(args.status, args.limit)
            .await
            .context("Failed to query threads")?;
        print_threads(&threads, args.format)?;
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Jsonl => {
            for item in items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
        OutputFormat::Text => {}
    }
    Ok(())
}

fn print_threads(threads: &[ThreadWithPosts], format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Text {
        return print_json(threads, format);
    }

    for entry in threads {
        let thread = &entry.thread;
        let created = chrono::DateTime::from_timestamp(thread.created_at, 0)
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y-%m-%d %H:%M:%S");

        println!(
            "{} | {} | {} | {}/{} {}",
            created, thread.id, thread.topic, thread.published_count, thread.planned_count, thread.status
        );
        for post in &entry.posts {
            let preview: String = post.body.chars().take(60).collect();
            let ellipsis = if post.body.chars().count() > 60 { "..." } else { "" };
            println!(
                "  {:>2}. {} {}{}",
                post.position,
                post.external_id.as_deref().unwrap_or("-"),
                preview,
                ellipsis
            );
        }
        println!();
    }
    Ok(())
}

fn print_usage(counters: &[UsageCounter], format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Text {
        return print_json(counters, format);
    }

    for counter in counters {
        println!(
            "{} | {:<10} | {}",
            counter.month_key, counter.service, counter.request_count
        );
    }
    Ok(())
}

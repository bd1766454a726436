//! newsthread-run - publish one news thread
//!
//! Intended to be started by a scheduler (cron, systemd timer). Each
//! invocation performs one run and prints its outcome as JSON on stdout.

use clap::Parser;
use libnewsthread::logging::{LogFormat, LoggingConfig};
use libnewsthread::{Config, JobOutcome, NewsPipeline, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "newsthread-run")]
#[command(version)]
#[command(about = "Discover, deduplicate, compose and publish one news thread")]
#[command(long_about = "\
newsthread-run - publish one news thread

DESCRIPTION:
    Runs the news-thread job once: checks the monthly API budgets, asks the
    search service for recent stories, drops stories published before,
    composes a thread and posts it segment by segment as replies.

    The outcome is printed to stdout as a single JSON object, including
    when the run cannot start. Logs go to stderr.

USAGE:
    # Run with the default configuration
    newsthread-run

    # Use another configuration file
    newsthread-run --config /etc/newsthread/config.toml

    # Machine-readable logs
    newsthread-run --log-format json

CONFIGURATION:
    Configuration file: $NEWSTHREAD_CONFIG or ~/.config/newsthread/config.toml
    Secrets may be supplied through NEWSTHREAD_X_CONSUMER_KEY,
    NEWSTHREAD_X_CONSUMER_SECRET, NEWSTHREAD_X_ACCESS_TOKEN,
    NEWSTHREAD_X_ACCESS_TOKEN_SECRET, NEWSTHREAD_SEARCH_API_KEY and
    NEWSTHREAD_COMPOSER_API_KEY.

EXIT CODES:
    0 - Thread published (fully or partially) or no new content
    1 - Run failed
    2 - Configuration error
    3 - Monthly budget exhausted
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.verbose = cli.verbose;
    logging.init();

    match run(&cli).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            // Startup failures still produce a payload; the exit code keeps
            // configuration errors apart from run failures
            eprintln!("Error: {}", e);
            print_outcome(&JobOutcome::Failed { error: e.to_string() });
            std::process::exit(e.exit_code());
        }
    }
}

fn print_outcome(outcome: &JobOutcome) {
    match outcome.to_json() {
        Ok(payload) => println!("{}", payload),
        Err(e) => eprintln!("Error: failed to encode outcome: {}", e),
    }
}

async fn run(cli: &Cli) -> Result<JobOutcome> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    config.validate()?;

    let pipeline = NewsPipeline::from_config(&config).await?;
    let outcome = pipeline.run().await;
    info!(status = outcome.status_code(), "newsthread-run finished");
    Ok(outcome)
}

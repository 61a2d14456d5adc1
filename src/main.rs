//! # Deal Digest
//!
//! Fetches articles for a fixed set of deal-hunting topics, summarizes each one
//! with a chat-completion LLM, and appends the summaries to a Supabase table.
//!
//! ## Usage
//!
//! ```sh
//! # credentials from the environment or a .env file
//! deal_digest
//!
//! deal_digest --topic "bbq cooking" --dry-run -j ./reports
//! ```
//!
//! ## Architecture
//!
//! One sequential pass per topic:
//! 1. **Fetching**: news search for topics with a query, else the fallback page
//! 2. **Summarizing**: one LLM request per non-blank block
//! 3. **Storing**: one inserted row per summary
//! 4. **Output**: optional JSON run report

use clap::Parser;
use std::error::Error;
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod store;
mod summarizer;
mod utils;

use cli::Cli;
use config::Config;
use models::RunReport;
use outputs::json;
use pipeline::Pipeline;
use sources::TopicFetcher;
use store::{DryRunStore, SupabaseStore};
use summarizer::Summarizer;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!("deal_digest starting up");

    // .env must be in the process environment before clap reads `env = ..` args
    config::load_dotenv();
    let args = Cli::parse();
    debug!(topics = ?args.topics, dry_run = args.dry_run, config = ?args.config, "Parsed CLI arguments");

    let config = match Config::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(topics = ?config.topics, dry_run = config.dry_run, "Configuration resolved");

    // Early check: ensure the report dir is writable before spending API calls
    if let Some(dir) = config.json_output_dir.as_deref() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    let mut report = RunReport::new(config.dry_run);
    let fetcher = TopicFetcher::from_config(&config)?;
    let summarizer = Summarizer::from_config(&config.llm)?;

    let result = match config.supabase.as_ref() {
        Some(supabase) if !config.dry_run => {
            let store = SupabaseStore::new(supabase)?;
            info!(endpoint = %store.endpoint(), "Storing summaries");
            Pipeline::new(fetcher, summarizer, store, config.continue_on_error)
                .run(&config.topics, &mut report.topics)
                .await
        }
        _ => {
            Pipeline::new(fetcher, summarizer, DryRunStore, config.continue_on_error)
                .run(&config.topics, &mut report.topics)
                .await
        }
    };

    if let Err(e) = &result {
        error!(error = %e, elapsed = ?start_time.elapsed(), "Run aborted");
        report.aborted = Some(e.to_string());
    }

    // The report is written even for an aborted run; it lists what was stored.
    let written = match config.json_output_dir.as_deref() {
        Some(dir) => json::write_report(&report, dir).await.map(drop),
        None => Ok(()),
    };
    if let Err(e) = &written {
        error!(error = %e, "Failed to write run report");
    }

    // A run error outranks a report error.
    result?;
    written?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        stored = report.stored(),
        failed = report.failed(),
        "Execution complete"
    );

    Ok(())
}

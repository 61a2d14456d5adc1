//! Command-line interface definitions for Deal Digest.
//!
//! Credentials can be provided via flags or environment variables; a `.env`
//! file is loaded into the environment before parsing.

use clap::Parser;

/// Command-line arguments for the Deal Digest application.
///
/// # Examples
///
/// ```sh
/// # Process the built-in topics, credentials from the environment
/// deal_digest
///
/// # Only one topic, print summaries without storing them
/// deal_digest --topic "bbq cooking" --dry-run
///
/// # Keep going past failures and write a run report
/// deal_digest --continue-on-error -j ./reports
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML file overriding topics and endpoints
    #[arg(short, long)]
    pub config: Option<String>,

    /// Topic to process (repeatable); replaces the configured topic list
    #[arg(short = 't', long = "topic")]
    pub topics: Vec<String>,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// News search API key
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub newsapi_key: Option<String>,

    /// Chat-completion API key
    #[arg(long, env = "GROK_API_KEY", hide_env_values = true)]
    pub grok_api_key: Option<String>,

    /// Retries per summarization request (0 sends each request once)
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Log and skip failed topics or blocks instead of aborting the run
    #[arg(long)]
    pub continue_on_error: bool,

    /// Summarize and print, but do not write to the database
    #[arg(long)]
    pub dry_run: bool,

    /// Output directory for the JSON run report
    #[arg(short, long)]
    pub json_output_dir: Option<String>,
}

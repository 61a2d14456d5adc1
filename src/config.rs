//! Runtime configuration.
//!
//! Values are layered in this order:
//! 1. a `.env` file (current directory, then `~/.env`) loaded into the process environment
//! 2. CLI flags and their environment variables (see [`crate::cli::Cli`])
//! 3. an optional YAML file (`--config`) overriding topics and endpoints
//!
//! The result is a single [`Config`] that is handed, piece by piece, to each
//! pipeline stage. Nothing here is global.

use crate::cli::Cli;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use url::Url;

pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.x.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "grok-3";
pub const DEFAULT_NEWS_API_BASE: &str = "https://newsapi.org/v2/";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const DEFAULT_SCRAPE_URL: &str = "https://example-deal-site.com";
pub const DEFAULT_SCRAPE_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TABLE: &str = "summaries";
/// Characters of a block sent to the LLM.
pub const MAX_INPUT_CHARS: usize = 4000;

const BUILTIN_TOPICS: [(&str, &str); 3] = [
    (
        "airline ticket deals",
        "airline ticket deals OR flight sales OR cheap flights",
    ),
    (
        "car rental deals",
        "car rental deals OR budget car rentals OR rental car promotions",
    ),
    ("bbq cooking", "bbq recipes OR barbecue techniques"),
];

/// Static mapping from topic name to news search query.
///
/// Topics absent from the table fall back to scraping the fixed page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicTable {
    queries: HashMap<String, String>,
}

impl TopicTable {
    pub fn builtin() -> Self {
        Self {
            queries: BUILTIN_TOPICS
                .iter()
                .map(|(t, q)| (t.to_string(), q.to_string()))
                .collect(),
        }
    }

    pub fn query_for(&self, topic: &str) -> Option<&str> {
        self.queries.get(topic).map(String::as_str)
    }

    pub fn insert(&mut self, topic: impl Into<String>, query: impl Into<String>) {
        self.queries.insert(topic.into(), query.into());
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }
}

/// Topic names processed when neither `--topic` nor the config file lists any.
pub fn builtin_topics() -> Vec<String> {
    BUILTIN_TOPICS.iter().map(|(t, _)| t.to_string()).collect()
}

/// One `topics:` entry of the YAML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TopicEntry {
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
}

/// Shape of the optional YAML config file. Every field is an override.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub topics: Option<Vec<TopicEntry>>,
    pub model: Option<String>,
    pub llm_endpoint: Option<String>,
    pub news_api_base: Option<String>,
    pub language: Option<String>,
    pub page_size: Option<u32>,
    pub scrape_url: Option<String>,
    pub table: Option<String>,
}

impl FileConfig {
    #[instrument(level = "info")]
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parsed: FileConfig = serde_yaml::from_str(&raw)?;
        info!(path, "Loaded config file");
        Ok(parsed)
    }
}

#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub base_url: Url,
    pub api_key: String,
    pub language: String,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub model: String,
    pub max_input_chars: usize,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: Url,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: Url,
    pub api_key: String,
    pub table: String,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Topics in processing order.
    pub topics: Vec<String>,
    pub topic_table: TopicTable,
    /// `None` only when no topic in the run has a search query.
    pub news_api: Option<NewsApiConfig>,
    pub llm: LlmConfig,
    pub scrape: ScrapeConfig,
    /// `None` only in dry-run mode.
    pub supabase: Option<SupabaseConfig>,
    pub continue_on_error: bool,
    pub dry_run: bool,
    pub json_output_dir: Option<String>,
}

impl Config {
    /// Resolve the CLI (and the YAML file it may point to) into a [`Config`].
    ///
    /// Credentials are checked here, before any network call is made.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match cli.config.as_deref() {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_parts(cli, file)
    }

    fn from_parts(cli: &Cli, file: FileConfig) -> Result<Self> {
        let (mut topics, topic_table) = match file.topics {
            Some(entries) => {
                let mut table = TopicTable::default();
                let mut names = Vec::with_capacity(entries.len());
                for entry in entries {
                    if let Some(query) = entry.query {
                        table.insert(entry.name.clone(), query);
                    }
                    names.push(entry.name);
                }
                (names, table)
            }
            None => (builtin_topics(), TopicTable::builtin()),
        };
        if !cli.topics.is_empty() {
            topics = cli.topics.clone();
        }
        if topics.is_empty() {
            return Err(Error::config("no topics configured"));
        }

        let needs_news = topics.iter().any(|t| topic_table.query_for(t).is_some());
        let news_api = if needs_news {
            Some(NewsApiConfig {
                base_url: parse_url(
                    file.news_api_base.as_deref().unwrap_or(DEFAULT_NEWS_API_BASE),
                    "news_api_base",
                )?,
                api_key: require(&cli.newsapi_key, "NEWSAPI_KEY")?,
                language: file.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                page_size: file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            })
        } else {
            None
        };

        let llm = LlmConfig {
            endpoint: parse_url(
                file.llm_endpoint.as_deref().unwrap_or(DEFAULT_LLM_ENDPOINT),
                "llm_endpoint",
            )?,
            api_key: require(&cli.grok_api_key, "GROK_API_KEY")?,
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_input_chars: MAX_INPUT_CHARS,
            max_retries: cli.max_retries,
        };

        let scrape = ScrapeConfig {
            url: parse_url(
                file.scrape_url.as_deref().unwrap_or(DEFAULT_SCRAPE_URL),
                "scrape_url",
            )?,
            user_agent: DEFAULT_SCRAPE_USER_AGENT.to_string(),
        };

        let supabase = if cli.dry_run {
            None
        } else {
            let raw_url = require(&cli.supabase_url, "SUPABASE_URL")?;
            Some(SupabaseConfig {
                url: parse_url(&raw_url, "SUPABASE_URL")?,
                api_key: require(&cli.supabase_key, "SUPABASE_KEY")?,
                table: file.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            })
        };

        debug!(
            topics = ?topics,
            mapped = topic_table.len(),
            news_api = news_api.is_some(),
            dry_run = cli.dry_run,
            "Resolved configuration"
        );

        Ok(Self {
            topics,
            topic_table,
            news_api,
            llm,
            scrape,
            supabase,
            continue_on_error: cli.continue_on_error,
            dry_run: cli.dry_run,
            json_output_dir: cli.json_output_dir.clone(),
        })
    }
}

fn require(value: &Option<String>, var: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::config(format!(
            "missing {var}; set it in the environment, a .env file, or pass --{}",
            var.to_lowercase().replace('_', "-")
        ))),
    }
}

fn parse_url(raw: &str, what: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("invalid {what} {raw:?}: {e}")))
}

/// Load a `.env` file into the process environment if one can be found.
///
/// Looks in the current directory first, then the home directory. A missing
/// file is fine; the variables may already be set.
pub fn load_dotenv() {
    let cwd = std::env::current_dir().ok();
    let home = dirs::home_dir();
    if let Some(path) = load_dotenv_from(cwd.as_deref(), home.as_deref()) {
        debug!(path = %path.display(), "Loaded .env");
    }
}

/// Load the first readable `.env` from `cwd`, then `home`. Variables already set
/// in the environment are left alone.
fn load_dotenv_from(cwd: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    [cwd, home]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(".env"))
        .filter(|path| path.is_file())
        .find(|path| dotenvy::from_path(path).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli() -> Cli {
        Cli {
            config: None,
            topics: Vec::new(),
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_key: Some("service-key".to_string()),
            newsapi_key: Some("news-key".to_string()),
            grok_api_key: Some("grok-key".to_string()),
            max_retries: 0,
            continue_on_error: false,
            dry_run: false,
            json_output_dir: None,
        }
    }

    #[test]
    fn test_builtin_table_queries() {
        let table = TopicTable::builtin();
        assert_eq!(
            table.query_for("airline ticket deals"),
            Some("airline ticket deals OR flight sales OR cheap flights")
        );
        assert_eq!(
            table.query_for("car rental deals"),
            Some("car rental deals OR budget car rentals OR rental car promotions")
        );
        assert_eq!(
            table.query_for("bbq cooking"),
            Some("bbq recipes OR barbecue techniques")
        );
        assert_eq!(table.query_for("hotel deals"), None);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = Config::from_parts(&cli(), FileConfig::default()).unwrap();

        assert_eq!(
            config.topics,
            vec!["airline ticket deals", "car rental deals", "bbq cooking"]
        );
        assert_eq!(config.llm.model, "grok-3");
        assert_eq!(config.llm.max_input_chars, 4000);
        assert_eq!(config.llm.endpoint.as_str(), DEFAULT_LLM_ENDPOINT);
        assert_eq!(config.scrape.url.as_str(), "https://example-deal-site.com/");

        let news = config.news_api.unwrap();
        assert_eq!(news.language, "en");
        assert_eq!(news.page_size, 5);

        let supabase = config.supabase.unwrap();
        assert_eq!(supabase.table, "summaries");
    }

    #[test]
    fn test_missing_llm_key_is_config_error() {
        let mut c = cli();
        c.grok_api_key = None;
        let err = Config::from_parts(&c, FileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("GROK_API_KEY")));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut c = cli();
        c.newsapi_key = Some("   ".to_string());
        let err = Config::from_parts(&c, FileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("NEWSAPI_KEY")));
    }

    #[test]
    fn test_dry_run_skips_supabase_credentials() {
        let mut c = cli();
        c.dry_run = true;
        c.supabase_url = None;
        c.supabase_key = None;
        let config = Config::from_parts(&c, FileConfig::default()).unwrap();
        assert!(config.supabase.is_none());
        assert!(config.dry_run);
    }

    #[test]
    fn test_news_key_not_needed_for_scrape_only_topics() {
        let mut c = cli();
        c.topics = vec!["hotel deals".to_string()];
        c.newsapi_key = None;
        let config = Config::from_parts(&c, FileConfig::default()).unwrap();
        assert!(config.news_api.is_none());
        assert_eq!(config.topics, vec!["hotel deals"]);
    }

    #[test]
    fn test_yaml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
topics:
  - name: ski deals
    query: ski pass deals OR lift ticket sales
  - name: local flyers
model: grok-3-mini
scrape_url: https://deals.example.org/weekly
table: deal_summaries
page_size: 3
"#
        )
        .unwrap();

        let mut c = cli();
        c.config = Some(file.path().to_str().unwrap().to_string());
        let config = Config::resolve(&c).unwrap();

        assert_eq!(config.topics, vec!["ski deals", "local flyers"]);
        assert_eq!(
            config.topic_table.query_for("ski deals"),
            Some("ski pass deals OR lift ticket sales")
        );
        assert_eq!(config.topic_table.query_for("local flyers"), None);
        assert_eq!(config.llm.model, "grok-3-mini");
        assert_eq!(config.scrape.url.as_str(), "https://deals.example.org/weekly");
        assert_eq!(config.supabase.unwrap().table, "deal_summaries");
        assert_eq!(config.news_api.unwrap().page_size, 3);
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        let err = serde_yaml::from_str::<FileConfig>("modle: grok-3\n").unwrap_err();
        assert!(err.to_string().contains("modle"));
    }

    #[test]
    fn test_invalid_supabase_url() {
        let mut c = cli();
        c.supabase_url = Some("not a url".to_string());
        let err = Config::from_parts(&c, FileConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("SUPABASE_URL")));
    }

    fn write_env(dir: &Path, body: &str) {
        std::fs::write(dir.join(".env"), body).unwrap();
    }

    #[test]
    fn test_dotenv_current_dir_wins_over_home() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        write_env(cwd.path(), "DEAL_DIGEST_TEST_CWD_FIRST=cwd\n");
        write_env(home.path(), "DEAL_DIGEST_TEST_CWD_FIRST_HOME=home\n");

        let loaded = load_dotenv_from(Some(cwd.path()), Some(home.path()));

        assert_eq!(loaded, Some(cwd.path().join(".env")));
        assert_eq!(std::env::var("DEAL_DIGEST_TEST_CWD_FIRST").unwrap(), "cwd");
        // Only one file is loaded.
        assert!(std::env::var("DEAL_DIGEST_TEST_CWD_FIRST_HOME").is_err());
    }

    #[test]
    fn test_dotenv_falls_back_to_home() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        write_env(home.path(), "DEAL_DIGEST_TEST_HOME_FALLBACK=home\n");

        let loaded = load_dotenv_from(Some(cwd.path()), Some(home.path()));

        assert_eq!(loaded, Some(home.path().join(".env")));
        assert_eq!(std::env::var("DEAL_DIGEST_TEST_HOME_FALLBACK").unwrap(), "home");
    }

    #[test]
    fn test_dotenv_missing_everywhere_is_fine() {
        let cwd = tempfile::tempdir().unwrap();
        assert_eq!(load_dotenv_from(Some(cwd.path()), None), None);
        assert_eq!(load_dotenv_from(None, None), None);
    }
}

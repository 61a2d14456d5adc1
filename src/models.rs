//! Data models flowing through the pipeline.
//!
//! - [`ContentBlock`]: raw text fetched for a topic, discarded after summarizing
//! - [`Summary`]: the LLM's generated text for one block
//! - [`SummaryRecord`]: the row persisted for one summary
//! - [`RunReport`] / [`TopicReport`]: per-run outcome, optionally written as JSON

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Where a [`ContentBlock`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockOrigin {
    /// An article returned by the news search API.
    NewsArticle {
        url: Option<String>,
        title: Option<String>,
    },
    /// The `<p>` text of the fallback page.
    ScrapedPage { url: String },
}

/// A unit of raw text to be summarized.
///
/// Blocks are only constructed through [`ContentBlock::new`], which rejects
/// blank text, so a block that reaches the summarizer always has content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub text: String,
    pub origin: BlockOrigin,
}

impl ContentBlock {
    /// Returns `None` when `text` is empty or whitespace only.
    pub fn new(text: impl Into<String>, origin: BlockOrigin) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self { text, origin })
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Text produced by the LLM for a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Summary(pub String);

impl Summary {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted summary row.
///
/// `created_at` is evaluated by the database (`now()`). Columns without a
/// time zone echo it back with no offset; those values are read as UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub topic: String,
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accept RFC 3339, offset-less `timestamp` text, or anything else as `None`.
///
/// The row is already written by the time this runs, so an odd timestamp
/// format must never turn the insert into an error.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // PostgREST renders `timestamp` as `2025-05-06T14:30:00.123456`; some proxies use a space.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Outcome of processing one topic.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TopicReport {
    pub topic: String,
    /// Non-blank blocks returned by the fetcher.
    pub blocks_fetched: usize,
    pub records: Vec<SummaryRecord>,
    /// Errors that were logged and skipped under `--continue-on-error`.
    pub failures: Vec<String>,
}

impl TopicReport {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub dry_run: bool,
    pub topics: Vec<TopicReport>,
    /// The error that ended the run early, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Local::now(),
            dry_run,
            topics: Vec::new(),
            aborted: None,
        }
    }

    pub fn stored(&self) -> usize {
        self.topics.iter().map(|t| t.records.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.topics.iter().map(|t| t.failures.len()).sum()
    }
}

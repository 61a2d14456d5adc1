//! Summary persistence.
//!
//! [`SupabaseStore`] appends one row per summary through the PostgREST
//! interface (`POST {url}/rest/v1/{table}`) and asks for the inserted row
//! back, so the caller gets the server-assigned `created_at`.
//! [`DryRunStore`] does no I/O.

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};
use crate::models::{Summary, SummaryRecord};
use crate::utils::truncate_for_log;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{info, instrument, warn};
use url::Url;

const SERVICE: &str = "supabase";

/// Anything that can persist a summary for a topic.
pub trait SummaryStore {
    async fn insert(&self, topic: &str, summary: &Summary) -> Result<SummaryRecord>;
}

/// PostgREST evaluates `now()` for a timestamp column, so the row is stamped
/// by the database clock whether or not the column has a default.
const CREATED_AT_NOW: &str = "now()";

#[derive(Serialize)]
struct NewSummaryRow<'a> {
    topic: &'a str,
    summary: &'a str,
    created_at: &'a str,
}

pub struct SupabaseStore {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let endpoint = base.join(&format!("rest/v1/{}", config.table))?;
        Ok(Self {
            client: Client::builder().build()?,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl SummaryStore for SupabaseStore {
    #[instrument(level = "info", skip(self, summary))]
    async fn insert(&self, topic: &str, summary: &Summary) -> Result<SummaryRecord> {
        let t0 = Instant::now();
        let row = NewSummaryRow {
            topic,
            summary: summary.as_str(),
            created_at: CREATED_AT_NOW,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Error::from_response(SERVICE, response).await;
            warn!(error = %err, "Insert failed");
            return Err(err);
        }

        let body = response.text().await?;
        let rows: Vec<SummaryRecord> = serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                body_preview = %truncate_for_log(&body, 300),
                "Insert response did not decode"
            );
            Error::malformed(SERVICE, e.to_string())
        })?;
        let record = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(SERVICE, "insert returned no rows"))?;

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            created_at = ?record.created_at,
            "Stored summary"
        );
        Ok(record)
    }
}

/// Store used with `--dry-run`: nothing leaves the process.
#[derive(Debug, Default)]
pub struct DryRunStore;

impl SummaryStore for DryRunStore {
    #[instrument(level = "debug", skip(self, summary))]
    async fn insert(&self, topic: &str, summary: &Summary) -> Result<SummaryRecord> {
        info!("Dry run; summary not stored");
        Ok(SummaryRecord {
            topic: topic.to_string(),
            summary: summary.to_string(),
            created_at: Some(Utc::now()),
        })
    }
}

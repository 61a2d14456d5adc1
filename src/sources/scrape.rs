//! Fallback page scraper for topics with no search query.
//!
//! Every unknown topic fetches the same configured page. Certificate
//! validation is disabled for this client only. The text of all `<p>`
//! elements is joined into a single block.

use crate::config::ScrapeConfig;
use crate::error::{Error, Result};
use crate::models::{BlockOrigin, ContentBlock};
use crate::utils::collapse_whitespace;
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Instant;
use tracing::{info, instrument, warn};

const SERVICE: &str = "scrape";

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));

#[derive(Debug)]
pub struct PageScraper {
    client: Client,
    config: ScrapeConfig,
}

impl PageScraper {
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        // Certificate acceptance is not covered by tests: wiremock only serves
        // plain HTTP, and a self-signed TLS fixture would need its own server.
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch the configured page and return its paragraph text as at most one block.
    #[instrument(level = "info", skip_all, fields(url = %self.config.url))]
    pub async fn scrape(&self) -> Result<Vec<ContentBlock>> {
        let t0 = Instant::now();
        let response = self.client.get(self.config.url.clone()).send().await?;

        if !response.status().is_success() {
            let err = Error::from_response(SERVICE, response).await;
            warn!(error = %err, "Fallback page fetch failed");
            return Err(err);
        }

        let html = response.text().await?;
        let text = extract_paragraph_text(&html);
        info!(
            html_bytes = html.len(),
            text_bytes = text.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Parsed fallback page"
        );

        let origin = BlockOrigin::ScrapedPage {
            url: self.config.url.to_string(),
        };
        Ok(ContentBlock::new(text, origin).into_iter().collect())
    }
}

/// Concatenate the text of every `<p>` element, separated by single spaces.
pub fn extract_paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&PARAGRAPH)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .join(" ")
}

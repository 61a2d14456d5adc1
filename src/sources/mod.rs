//! Content sources: turn a topic into the text blocks to summarize.
//!
//! A topic is looked up in the [`TopicTable`]:
//!
//! | Topic | Module | Method |
//! |-------|--------|--------|
//! | Has a search query | [`news_api`] | One `everything` search, up to `page_size` results |
//! | Unknown | [`scrape`] | `<p>` text of one fixed page, as a single block |
//!
//! Both paths return blocks in source order with blank text already removed.

pub mod news_api;
pub mod scrape;

use crate::config::{Config, TopicTable};
use crate::error::{Error, Result};
use crate::models::ContentBlock;
use news_api::NewsApiSource;
use scrape::PageScraper;
use tracing::{info, instrument};

/// Anything that can produce the content blocks for a topic.
pub trait ContentSource {
    async fn fetch(&self, topic: &str) -> Result<Vec<ContentBlock>>;
}

/// Picks the news search or the fallback scrape depending on the topic.
#[derive(Debug)]
pub struct TopicFetcher {
    table: TopicTable,
    news: Option<NewsApiSource>,
    scraper: PageScraper,
}

impl TopicFetcher {
    pub fn new(table: TopicTable, news: Option<NewsApiSource>, scraper: PageScraper) -> Self {
        Self {
            table,
            news,
            scraper,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let news = config
            .news_api
            .clone()
            .map(NewsApiSource::new)
            .transpose()?;
        let scraper = PageScraper::new(config.scrape.clone())?;
        Ok(Self::new(config.topic_table.clone(), news, scraper))
    }
}

impl ContentSource for TopicFetcher {
    #[instrument(level = "info", skip(self))]
    async fn fetch(&self, topic: &str) -> Result<Vec<ContentBlock>> {
        let blocks = match self.table.query_for(topic) {
            Some(query) => {
                let news = self.news.as_ref().ok_or_else(|| {
                    Error::config(format!("topic {topic:?} needs the news API but NEWSAPI_KEY is not set"))
                })?;
                news.search(query).await?
            }
            None => self.scraper.scrape().await?,
        };
        info!(count = blocks.len(), "Fetched content blocks");
        Ok(blocks)
    }
}

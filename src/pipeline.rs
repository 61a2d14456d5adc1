//! The fetch → summarize → store loop.
//!
//! Topics are processed in order, and blocks in the order the source
//! returned them. For each block the summarizer runs first; the store is only
//! called once it has returned a summary. Nothing runs concurrently.
//!
//! By default the first error ends the run. With `continue_on_error` the
//! error is logged, recorded in the [`TopicReport`], and the failing block
//! (or the whole topic, when fetching fails) is skipped.

use crate::error::Result;
use crate::models::TopicReport;
use crate::sources::ContentSource;
use crate::store::SummaryStore;
use crate::summarizer::Summarize;
use tracing::{error, info, instrument, warn};

pub struct Pipeline<F, S, D> {
    fetcher: F,
    summarizer: S,
    store: D,
    continue_on_error: bool,
}

impl<F, S, D> Pipeline<F, S, D>
where
    F: ContentSource,
    S: Summarize,
    D: SummaryStore,
{
    pub fn new(fetcher: F, summarizer: S, store: D, continue_on_error: bool) -> Self {
        Self {
            fetcher,
            summarizer,
            store,
            continue_on_error,
        }
    }

    /// Process every topic in order, pushing one report per topic onto
    /// `reports`.
    ///
    /// The report for a topic is pushed before its error is returned, so on
    /// abort `reports` still holds everything stored up to that point.
    pub async fn run(&self, topics: &[String], reports: &mut Vec<TopicReport>) -> Result<()> {
        reports.reserve(topics.len());
        for topic in topics {
            let mut report = TopicReport::new(topic.as_str());
            let outcome = self.run_topic(topic, &mut report).await;
            reports.push(report);
            outcome?;
        }
        Ok(())
    }

    #[instrument(level = "info", skip(self, report))]
    pub async fn run_topic(&self, topic: &str, report: &mut TopicReport) -> Result<()> {
        let blocks = match self.fetcher.fetch(topic).await {
            Ok(blocks) => blocks,
            Err(e) if self.continue_on_error => {
                error!(error = %e, "Fetch failed; skipping topic");
                report.failures.push(format!("fetch: {e}"));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for (index, block) in blocks.into_iter().enumerate() {
            if block.is_blank() {
                warn!(index, "Skipping blank block");
                continue;
            }
            report.blocks_fetched += 1;

            let summary = match self.summarizer.summarize(&block).await {
                Ok(summary) => summary,
                Err(e) if self.continue_on_error => {
                    error!(index, error = %e, "Summarize failed; skipping block");
                    report.failures.push(format!("summarize block {index}: {e}"));
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.store.insert(topic, &summary).await {
                Ok(record) => {
                    println!("Summary for {topic}: {summary}");
                    report.records.push(record);
                }
                Err(e) if self.continue_on_error => {
                    error!(index, error = %e, "Store failed; skipping block");
                    report.failures.push(format!("store block {index}: {e}"));
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            blocks = report.blocks_fetched,
            stored = report.records.len(),
            failed = report.failures.len(),
            "Topic complete"
        );
        Ok(())
    }
}

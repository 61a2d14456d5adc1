//! LLM chat-completion interaction with optional retry and backoff.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending one prompt and getting text back
//! - [`ChatCompletionClient`]: OpenAI-style `chat/completions` endpoint client
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync`
//! - [`Summarizer`]: builds the summary prompt from a [`ContentBlock`]
//!
//! # Retry Strategy
//!
//! Retries are off unless `--max-retries` is given. When enabled:
//! - exponential backoff starting at 1 second
//! - maximum delay capped at 30 seconds
//! - random jitter (0-250ms) added to every delay

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::models::{ContentBlock, Summary};
use crate::utils::{truncate_chars, truncate_for_log};
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const SERVICE: &str = "llm";
const PROMPT_PREFIX: &str = "Summarize this in 100 words with a focus on deals or key tips: ";

/// Trait for async LLM interaction.
///
/// This abstraction lets the retry decorator and tests stand in for the
/// real HTTP client.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response>;
}

/// Doubling delay between LLM attempts, capped at `max`, plus up to 250ms of jitter.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: StdDuration,
    max: StdDuration,
}

impl Backoff {
    pub fn new(base: StdDuration) -> Self {
        Self {
            base,
            max: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn delay(&self, retry: u32) -> StdDuration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base.saturating_mul(factor).min(self.max)
    }

    fn jittered(&self, retry: u32) -> StdDuration {
        self.delay(retry) + StdDuration::from_millis(rng().random_range(0..=250))
    }
}

/// Retries a failed [`AskAsync`] call up to `max_retries` more times.
pub struct RetryAsk<T> {
    inner: T,
    max_retries: u32,
    backoff: Backoff,
}

impl<T: AskAsync> RetryAsk<T> {
    pub fn new(inner: T, max_retries: u32, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            backoff: Backoff::new(base_delay),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RetryAsk(max_retries={}, {:?})", self.max_retries, self.backoff)
    }
}

impl<T: AskAsync> AskAsync for RetryAsk<T> {
    type Response = T::Response;

    #[instrument(level = "info", skip_all, fields(max_retries = self.max_retries))]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let mut retry = 0;
        loop {
            let err = match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            if retry == self.max_retries {
                if retry > 0 {
                    error!(
                        attempts = retry + 1,
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        error = %err,
                        "Giving up on LLM request"
                    );
                }
                return Err(err);
            }
            retry += 1;
            let delay = self.backoff.jittered(retry);
            warn!(retry, ?delay, error = %err, "LLM request failed; retrying");
            sleep(delay).await;
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
pub struct ChatCompletionClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .finish()
    }
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

impl AskAsync for ChatCompletionClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: text,
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Error::from_response(SERVICE, response).await;
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %err, "API call failed");
            return Err(err);
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&body, 300),
                "Completion body did not decode"
            );
            Error::malformed(SERVICE, e.to_string())
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed(SERVICE, "response has no choices"))?
            .message
            .content
            .ok_or_else(|| Error::malformed(SERVICE, "first choice has no message content"))?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}

/// Anything that can turn a block into a summary.
pub trait Summarize {
    async fn summarize(&self, block: &ContentBlock) -> Result<Summary>;
}

/// Builds the deals-focused prompt and sends it through an [`AskAsync`] client.
#[derive(Debug)]
pub struct Summarizer<A = RetryAsk<ChatCompletionClient>> {
    asker: A,
    max_input_chars: usize,
}

impl Summarizer {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = ChatCompletionClient::new(config)?;
        let asker = RetryAsk::new(client, config.max_retries, StdDuration::from_secs(1));
        Ok(Summarizer::new(asker, config.max_input_chars))
    }
}

impl<A> Summarizer<A> {
    pub fn new(asker: A, max_input_chars: usize) -> Self {
        Self {
            asker,
            max_input_chars,
        }
    }

    pub fn prompt_for(&self, text: &str) -> String {
        format!("{PROMPT_PREFIX}{}", truncate_chars(text, self.max_input_chars))
    }
}

impl<A> Summarize for Summarizer<A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(input_bytes = block.text.len()))]
    async fn summarize(&self, block: &ContentBlock) -> Result<Summary> {
        let t0 = Instant::now();
        let prompt = self.prompt_for(&block.text);
        let text = self.asker.ask(&prompt).await?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&text, 120),
            "Summarized block"
        );
        Ok(Summary(text))
    }
}

//! News search API client.
//!
//! Issues one `GET {base}/everything?q=..&language=..&pageSize=..` per topic
//! and turns each returned article into a [`ContentBlock`]. The article body
//! (`content`) is preferred; `description` is the fallback; articles with
//! neither are dropped.

use crate::config::NewsApiConfig;
use crate::error::{Error, Result};
use crate::models::{BlockOrigin, ContentBlock};
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const SERVICE: &str = "newsapi";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl NewsApiArticle {
    fn into_block(self) -> Option<ContentBlock> {
        let origin = BlockOrigin::NewsArticle {
            url: self.url,
            title: self.title,
        };
        let text = [self.content, self.description]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())?;
        ContentBlock::new(text, origin)
    }
}

pub struct NewsApiSource {
    client: Client,
    config: NewsApiConfig,
}

impl fmt::Debug for NewsApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiSource")
            .field("base_url", &self.config.base_url.as_str())
            .field("language", &self.config.language)
            .field("page_size", &self.config.page_size)
            .finish()
    }
}

impl NewsApiSource {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        // The service rejects requests that carry no User-Agent.
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Run one search and return the usable articles as blocks, in result order.
    #[instrument(level = "info", skip(self), fields(%query))]
    pub async fn search(&self, query: &str) -> Result<Vec<ContentBlock>> {
        let endpoint = self.config.base_url.join("everything")?;
        let page_size = self.config.page_size.to_string();
        let t0 = Instant::now();

        let response = self
            .client
            .get(endpoint)
            .header("X-Api-Key", &self.config.api_key)
            .query(&[
                ("q", query),
                ("language", self.config.language.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Error::from_response(SERVICE, response).await;
            warn!(error = %err, "News search failed");
            return Err(err);
        }

        let body = response.text().await?;
        let parsed: EverythingResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(
                error = %e,
                body_preview = %truncate_for_log(&body, 300),
                "News search returned undecodable body"
            );
            Error::malformed(SERVICE, e.to_string())
        })?;

        if parsed.status != "ok" {
            return Err(Error::Api {
                service: SERVICE,
                status: 200,
                body: format!(
                    "{}: {}",
                    parsed.code.unwrap_or_else(|| parsed.status.clone()),
                    parsed.message.unwrap_or_default()
                ),
            });
        }

        let returned = parsed.articles.len();
        let blocks: Vec<ContentBlock> = parsed
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_block)
            .collect();

        info!(
            returned,
            usable = blocks.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "News search complete"
        );
        debug!(origins = ?blocks.iter().map(|b| &b.origin).collect::<Vec<_>>(), "News blocks");

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(server: &MockServer) -> NewsApiSource {
        NewsApiSource::new(NewsApiConfig {
            base_url: Url::parse(&format!("{}/v2/", server.uri())).unwrap(),
            api_key: "news-key".to_string(),
            language: "en".to_string(),
            page_size: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_query_language_page_size_and_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "bbq recipes OR barbecue techniques"))
            .and(query_param("language", "en"))
            .and(query_param("pageSize", "5"))
            .and(header("X-Api-Key", "news-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "totalResults": 0,
                "articles": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let blocks = source(&server)
            .search("bbq recipes OR barbecue techniques")
            .await
            .unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn test_content_falls_back_to_description() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "totalResults": 4,
                "articles": [
                    {"title": "A", "url": "https://a.example", "description": "desc A", "content": "body A"},
                    {"title": "B", "url": "https://b.example", "description": "desc B", "content": null},
                    {"title": "C", "url": "https://c.example", "description": null, "content": null},
                    {"title": "D", "url": "https://d.example", "description": "desc D", "content": "  "}
                ]
            })))
            .mount(&server)
            .await;

        let blocks = source(&server).search("anything").await.unwrap();
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["body A", "desc B", "desc D"]);
        assert_eq!(
            blocks[1].origin,
            BlockOrigin::NewsArticle {
                url: Some("https://b.example".to_string()),
                title: Some("B".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_http_error_status_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid"}"#,
            ))
            .mount(&server)
            .await;

        let err = source(&server).search("q").await.unwrap_err();
        match err {
            Error::Api { service, status, body } => {
                assert_eq!(service, "newsapi");
                assert_eq!(status, 401);
                assert!(body.contains("apiKeyInvalid"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_in_ok_body_is_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "code": "rateLimited",
                "message": "Too many requests"
            })))
            .mount(&server)
            .await;

        let err = source(&server).search("q").await.unwrap_err();
        assert!(matches!(err, Error::Api { ref body, .. } if body.starts_with("rateLimited")));
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = source(&server).search("q").await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { service: "newsapi", .. }));
    }
}

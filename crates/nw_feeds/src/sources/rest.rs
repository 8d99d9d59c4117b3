use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nw_core::{Error, Language, RawArticle, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::{NewsSource, SourceKind, SourceMetadata};

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
const REMOVED: &str = "[Removed]";

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub language: Language,
    pub country: String,
    pub categories: Vec<String>,
    pub page_size: u32,
    /// Minimum spacing between two upstream requests
    pub request_delay: Duration,
}

impl RestConfig {
    pub fn for_language(language: Language, api_key: String) -> Self {
        let country = match language {
            Language::En => "us",
            Language::Es => "ar",
        };
        Self {
            api_key,
            base_url: None,
            language,
            country: country.to_string(),
            categories: vec!["general".to_string()],
            page_size: 50,
            request_delay: Duration::from_millis(1100),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<HeadlineItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeadlineItem {
    source: Option<HeadlineSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct HeadlineSource {
    name: Option<String>,
}

/// NewsAPI-style `top-headlines` endpoint, one request per category.
pub struct RestSource {
    client: Client,
    config: RestConfig,
    base_url: String,
    last_request: Mutex<Option<Instant>>,
}

impl RestSource {
    pub fn new(config: RestConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("REST source API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("newswire/0.1")
            .build()?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            config,
            base_url,
            last_request: Mutex::new(None),
        })
    }

    /// Sleeps until `request_delay` has passed since the previous request.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.request_delay {
                sleep(self.config.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_category(&self, category: &str) -> Result<Vec<RawArticle>> {
        self.throttle().await;

        let page_size = self.config.page_size.to_string();
        let response = self
            .client
            .get(format!("{}/top-headlines", self.base_url))
            .header("X-Api-Key", &self.config.api_key)
            .query(&[
                ("country", self.config.country.as_str()),
                ("category", category),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        parse_response(&body, category, self.config.language)
    }
}

#[async_trait]
impl NewsSource for RestSource {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: format!("NewsAPI {}", self.config.country.to_uppercase()),
            kind: SourceKind::Rest,
            language: self.config.language,
        }
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let mut items = Vec::new();
        let mut last_error = None;
        for category in &self.config.categories {
            match self.fetch_category(category).await {
                Ok(mut batch) => {
                    debug!("Fetched {} headlines for {}", batch.len(), category);
                    items.append(&mut batch);
                }
                Err(e) => {
                    warn!("Headlines request for {} failed: {}", category, e);
                    last_error = Some(e);
                }
            }
        }
        // Only a total failure fails the source.
        match last_error {
            Some(e) if items.is_empty() => Err(e),
            _ => Ok(items),
        }
    }

    fn cli_names(&self) -> Vec<String> {
        vec!["newsapi".to_string(), "rest".to_string()]
    }
}

/// Maps a `top-headlines` response body onto raw articles.
pub fn parse_response(body: &str, category: &str, language: Language) -> Result<Vec<RawArticle>> {
    let response: HeadlinesResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(Error::Feed(
            response
                .message
                .unwrap_or_else(|| format!("headlines status {}", response.status)),
        ));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|item| {
            let title = item.title.filter(|t| !t.trim().is_empty() && t != REMOVED)?;
            let url = item.url.filter(|u| !u.trim().is_empty())?;
            let published_at = item
                .published_at
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.with_timezone(&Utc));
            Some(RawArticle {
                url,
                title,
                description: item.description.filter(|d| d != REMOVED),
                content: item.content.filter(|c| c != REMOVED),
                image_url: item.url_to_image.filter(|u| !u.is_empty()),
                source: item
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "NewsAPI".to_string()),
                published_at,
                category_hint: Some(category.to_string()),
                language,
            })
        })
        .collect())
}

//! RSS 2.0 and Atom feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nw_core::{Error, Language, RawArticle, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{NewsSource, SourceKind, SourceMetadata};
use crate::html::first_image;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub language: Language,
    /// Category applied to every item of the feed, if the feed is topical
    pub category_hint: Option<String>,
}

impl FeedConfig {
    pub fn new(name: &str, url: &str, language: Language, category_hint: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            language,
            category_hint: category_hint.map(str::to_string),
        }
    }
}

pub fn curated_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new("BBC News", "https://feeds.bbci.co.uk/news/rss.xml", Language::En, None),
        FeedConfig::new("NPR News", "https://feeds.npr.org/1001/rss.xml", Language::En, None),
        FeedConfig::new("Guardian World", "https://www.theguardian.com/world/rss", Language::En, Some("world")),
        FeedConfig::new("Al Jazeera", "https://www.aljazeera.com/xml/rss/all.xml", Language::En, Some("world")),
        FeedConfig::new(
            "CNBC Top News",
            "https://search.cnbc.com/rs/search/combinedcms/view.xml?partnerId=wrss01&id=100003114",
            Language::En,
            Some("business"),
        ),
        FeedConfig::new("ESPN", "https://www.espn.com/espn/rss/news", Language::En, Some("sports")),
        FeedConfig::new("MIT Technology Review", "https://www.technologyreview.com/feed/", Language::En, Some("technology")),
        FeedConfig::new("Clarín", "https://www.clarin.com/rss/lo-ultimo/", Language::Es, None),
        FeedConfig::new("La Nación", "https://www.lanacion.com.ar/arc/outboundfeeds/rss/", Language::Es, None),
        FeedConfig::new("La Voz", "https://www.lavoz.com.ar/arc/outboundfeeds/feeds/rss/?outputType=xml", Language::Es, None),
        FeedConfig::new("BBC Mundo", "https://feeds.bbci.co.uk/mundo/rss.xml", Language::Es, None),
        FeedConfig::new("Clarín Deportes", "https://www.clarin.com/rss/deportes/", Language::Es, Some("sports")),
    ]
}

pub struct FeedSource {
    client: Client,
    config: FeedConfig,
}

impl FeedSource {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("newswire/0.1")
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

#[async_trait]
impl NewsSource for FeedSource {
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: self.config.name.clone(),
            kind: SourceKind::Feed,
            language: self.config.language,
        }
    }

    async fn fetch(&self) -> Result<Vec<RawArticle>> {
        let response = self.client.get(&self.config.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: format!("Failed to fetch {}", self.config.url),
            });
        }
        let body = response.bytes().await?;
        let items = parse_feed(&body, &self.config)?;
        debug!("Fetched {} items from {}", items.len(), self.config.name);
        Ok(items)
    }
}

/// Parses an RSS document, falling back to Atom.
pub fn parse_feed(body: &[u8], config: &FeedConfig) -> Result<Vec<RawArticle>> {
    if let Ok(channel) = rss::Channel::read_from(body) {
        return Ok(channel
            .items()
            .iter()
            .filter_map(|item| rss_item(item, config))
            .collect());
    }
    if let Ok(feed) = atom_syndication::Feed::read_from(body) {
        return Ok(feed
            .entries()
            .iter()
            .filter_map(|entry| atom_entry(entry, config))
            .collect());
    }
    Err(Error::Feed(format!("Failed to parse feed: {}", config.url)))
}

fn rss_item(item: &rss::Item, config: &FeedConfig) -> Option<RawArticle> {
    let title = item.title()?.trim().to_string();
    let url = item.link()?.trim().to_string();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let published_at = item
        .pub_date()
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map(|d| d.with_timezone(&Utc));
    let description = item.description().map(str::to_string);
    let image_url = item
        .enclosure()
        .filter(|e| e.mime_type().starts_with("image/"))
        .map(|e| e.url().to_string())
        .or_else(|| media_image(item))
        .or_else(|| description.as_deref().and_then(first_image));
    let source = item
        .source()
        .and_then(|s| s.title())
        .map(str::to_string)
        .unwrap_or_else(|| config.name.clone());
    let category_hint = config
        .category_hint
        .clone()
        .or_else(|| item.categories().first().map(|c| c.name().to_string()));

    Some(RawArticle {
        url,
        title,
        description,
        content: item.content().map(str::to_string),
        image_url,
        source,
        published_at,
        category_hint,
        language: config.language,
    })
}

fn media_image(item: &rss::Item) -> Option<String> {
    let media = item.extensions().get("media")?;
    let from_content = media.get("content").and_then(|list| {
        list.iter().find_map(|content| {
            let attrs = content.attrs();
            let url = attrs.get("url")?;
            let is_image = attrs.get("medium").map(String::as_str) == Some("image")
                || attrs.get("type").map_or(false, |t| t.starts_with("image/"))
                || [".jpg", ".jpeg", ".png", ".webp"].iter().any(|ext| url.ends_with(ext));
            is_image.then(|| url.clone())
        })
    });
    from_content.or_else(|| {
        media
            .get("thumbnail")
            .and_then(|list| list.iter().find_map(|t| t.attrs().get("url").cloned()))
    })
}

fn atom_entry(entry: &atom_syndication::Entry, config: &FeedConfig) -> Option<RawArticle> {
    let title = entry.title().value.trim().to_string();
    let url = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| entry.links().first())
        .map(|l| l.href().trim().to_string())?;
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let published_at = entry
        .published()
        .unwrap_or_else(|| entry.updated())
        .with_timezone(&Utc);
    let description = entry.summary().map(|s| s.value.clone());
    let content = entry.content().and_then(|c| c.value()).map(str::to_string);
    let image_url = content
        .as_deref()
        .and_then(first_image)
        .or_else(|| description.as_deref().and_then(first_image));
    let category_hint = config
        .category_hint
        .clone()
        .or_else(|| entry.categories().first().map(|c| c.term().to_string()));

    Some(RawArticle {
        url,
        title,
        description,
        content,
        image_url,
        source: config.name.clone(),
        published_at: Some(published_at),
        category_hint,
        language: config.language,
    })
}

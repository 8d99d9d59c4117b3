use async_trait::async_trait;
use nw_core::{Error, Language, RawArticle, Result};
use serde::Serialize;
use std::time::Duration;

pub mod feed;
pub mod rest;

pub use feed::{curated_feeds, FeedConfig, FeedSource};
pub use rest::{RestConfig, RestSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rest,
    Feed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceMetadata {
    pub name: String,
    pub kind: SourceKind,
    pub language: Language,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    fn metadata(&self) -> SourceMetadata;

    /// Fetches the current batch of articles
    async fn fetch(&self) -> Result<Vec<RawArticle>>;

    /// Short names accepted on the command line
    fn cli_names(&self) -> Vec<String> {
        vec![slugify(&self.metadata().name)]
    }
}

pub type BoxedSource = Box<dyn NewsSource>;

/// Lowercase ASCII slug, e.g. "Clarín" → "clarin", "BBC World" → "bbc-world".
pub fn slugify(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ñ' => 'n',
            c if c.is_ascii_alphanumeric() => c,
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Splits a `language[/source]` selector, e.g. `es/clarin` or `en`.
pub fn parse_selector(selector: &str) -> Result<(Language, Option<String>)> {
    let parts: Vec<&str> = selector.split('/').collect();
    match parts.as_slice() {
        [language] => Ok((language.parse()?, None)),
        [language, name] if !name.is_empty() => Ok((language.parse()?, Some(slugify(name)))),
        _ => Err(Error::InvalidInput(format!(
            "Invalid source format: {} (expected language[/source])",
            selector
        ))),
    }
}

#[derive(Clone, Debug)]
pub struct SourcesConfig {
    pub languages: Vec<Language>,
    pub newsapi_key: Option<String>,
    pub newsapi_base_url: Option<String>,
    pub newsapi_categories: Vec<String>,
    pub request_delay: Duration,
    /// Replaces the curated list when set
    pub feeds: Option<Vec<FeedConfig>>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            languages: vec![Language::En, Language::Es],
            newsapi_key: None,
            newsapi_base_url: None,
            newsapi_categories: vec![
                "general".to_string(),
                "business".to_string(),
                "technology".to_string(),
                "sports".to_string(),
            ],
            request_delay: Duration::from_millis(1100),
            feeds: None,
        }
    }
}

/// Builds the source set: RSS feeds for every configured language, plus the
/// REST source per language when an API key is present.
pub fn default_sources(config: &SourcesConfig) -> Result<Vec<BoxedSource>> {
    let feeds = config.feeds.clone().unwrap_or_else(curated_feeds);
    let mut sources: Vec<BoxedSource> = Vec::new();

    for feed in feeds.into_iter().filter(|f| config.languages.contains(&f.language)) {
        sources.push(Box::new(FeedSource::new(feed)?));
    }

    if let Some(api_key) = config.newsapi_key.as_ref().filter(|k| !k.is_empty()) {
        for language in &config.languages {
            let mut rest = RestConfig::for_language(*language, api_key.clone());
            rest.base_url = config.newsapi_base_url.clone();
            rest.categories = config.newsapi_categories.clone();
            rest.request_delay = config.request_delay;
            sources.push(Box::new(RestSource::new(rest)?));
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Clarín"), "clarin");
        assert_eq!(slugify("BBC World"), "bbc-world");
        assert_eq!(slugify("  La Voz  "), "la-voz");
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(parse_selector("es").unwrap(), (Language::Es, None));
        assert_eq!(
            parse_selector("es/Clarín").unwrap(),
            (Language::Es, Some("clarin".to_string()))
        );
        assert!(parse_selector("fr").is_err());
        assert!(parse_selector("es/").is_err());
        assert!(parse_selector("es/a/b").is_err());
    }

    #[test]
    fn test_default_sources_respect_languages_and_key() {
        let config = SourcesConfig {
            languages: vec![Language::Es],
            ..Default::default()
        };
        let sources = default_sources(&config).unwrap();
        assert!(!sources.is_empty());
        assert!(sources.iter().all(|s| s.metadata().language == Language::Es));
        assert!(sources.iter().all(|s| s.metadata().kind == SourceKind::Feed));

        let config = SourcesConfig {
            languages: vec![Language::En],
            newsapi_key: Some("key".to_string()),
            ..Default::default()
        };
        let sources = default_sources(&config).unwrap();
        assert_eq!(
            sources.iter().filter(|s| s.metadata().kind == SourceKind::Rest).count(),
            1
        );
    }
}

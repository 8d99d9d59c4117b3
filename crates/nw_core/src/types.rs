use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    World,
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::General,
        Category::World,
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::World => "world",
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
        }
    }

    /// Maps upstream category names (English and Spanish) onto the closed set.
    pub fn from_alias(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        let category = match value.as_str() {
            "general" | "top" | "headlines" | "news" | "nation" | "national" | "ultimas"
            | "últimas" => Category::General,
            "world" | "international" | "internacional" | "mundo" | "el-mundo" => Category::World,
            "politics" | "politica" | "política" | "elections" | "government" => {
                Category::Politics
            }
            "business" | "economy" | "economia" | "economía" | "finance" | "finanzas"
            | "markets" => Category::Business,
            "technology" | "tech" | "tecnologia" | "tecnología" | "ai" => Category::Technology,
            "science" | "ciencia" | "space" => Category::Science,
            "health" | "salud" => Category::Health,
            "sports" | "sport" | "deportes" => Category::Sports,
            "entertainment" | "espectaculos" | "espectáculos" | "culture" | "cultura" => {
                Category::Entertainment
            }
            _ => return None,
        };
        Some(category)
    }

    pub fn lenient(value: &str) -> Self {
        Self::from_alias(value).unwrap_or(Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_alias(s).ok_or_else(|| Error::InvalidInput(format!("unknown category: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "es")]
    Es,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "es" | "spanish" | "español" => Ok(Language::Es),
            other => Err(Error::InvalidInput(format!("unsupported language: {}", other))),
        }
    }
}

/// An outlet that reported a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// An article as returned by a source, before cleaning and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub category_hint: Option<String>,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    pub summary: String,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub category: Category,
    pub language: Language,
    pub published_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_breaking: bool,
    pub likes: u64,
    pub views: u64,
    pub sources: Vec<SourceRef>,
    pub title_tokens: Vec<String>,
}

impl Article {
    /// Number of outlets merged into this story, the original reporter included.
    pub fn source_count(&self) -> usize {
        self.sources.len().max(1)
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.published_at).num_seconds().max(0) as f64) / 3600.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleStatus {
    New,
    Updated,
    Merged { into: String },
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "web" => Ok(Platform::Web),
            other => Err(Error::InvalidInput(format!("unknown platform: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRegistration {
    pub token: String,
    pub platform: Platform,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub language: Language,
    pub registered_at: DateTime<Utc>,
}

impl PushRegistration {
    pub fn wants(&self, article: &Article) -> bool {
        self.language == article.language
            && (self.categories.is_empty() || self.categories.contains(&article.category))
    }
}

/// Lowercases scheme and host, drops the fragment and `utm_*` tracking parameters.
pub fn canonical_url(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;
    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    Ok(url.to_string())
}

/// Stable id: first 8 bytes of the SHA-256 of the canonical URL, hex encoded.
pub fn article_id(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

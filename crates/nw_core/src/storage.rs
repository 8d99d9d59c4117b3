use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Article, Category, Language, PushRegistration};
use crate::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Position after the last item of a page. Listing order is
/// `(published_at desc, id desc)` at millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub published_millis: i64,
    pub id: String,
}

impl Cursor {
    pub fn after(article: &Article) -> Self {
        Self {
            published_millis: article.published_at.timestamp_millis(),
            id: article.id.clone(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}:{}", self.published_millis, self.id))
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("invalid cursor: {}", raw));
        let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (millis, id) = text.split_once(':').ok_or_else(invalid)?;
        let published_millis = millis.parse::<i64>().map_err(|_| invalid())?;
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            published_millis,
            id: id.to_string(),
        })
    }

    /// True when `article` sorts strictly after this cursor.
    pub fn precedes(&self, article: &Article) -> bool {
        let millis = article.published_at.timestamp_millis();
        millis < self.published_millis || (millis == self.published_millis && article.id < self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub category: Option<Category>,
    pub language: Option<Language>,
    pub breaking_only: bool,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<Cursor>,
}

impl ArticleQuery {
    pub fn page_size(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Filters only; the cursor is applied separately.
    pub fn matches(&self, article: &Article) -> bool {
        self.category.map_or(true, |c| article.category == c)
            && self.language.map_or(true, |l| article.language == l)
            && (!self.breaking_only || article.is_breaking)
            && self
                .source
                .as_deref()
                .map_or(true, |s| article.source.eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl Page<Article> {
    /// Builds a page from up to `page_size + 1` ordered items.
    pub fn from_overfetch(mut items: Vec<Article>, page_size: usize) -> Self {
        let has_more = items.len() > page_size;
        items.truncate(page_size);
        let next_cursor = if has_more {
            items.last().map(|a| Cursor::after(a).encode())
        } else {
            None
        };
        Self { items, next_cursor }
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or replace an article by id. An existing row keeps its like
    /// and view counters.
    async fn upsert_article(&self, article: &Article) -> Result<()>;

    async fn get_article(&self, id: &str) -> Result<Option<Article>>;

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Articles published at or after `since`, newest first
    async fn recent_articles(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>>;

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Page<Article>>;

    /// Adds `delta` to the like counter, saturating at zero. `None` if the article is unknown.
    async fn increment_likes(&self, id: &str, delta: i64) -> Result<Option<u64>>;

    async fn increment_views(&self, id: &str) -> Result<Option<u64>>;

    /// Candidate set for the trending ranking; scoring happens in the caller.
    async fn trending_candidates(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>>;

    async fn delete_article(&self, id: &str) -> Result<bool>;

    async fn count_articles(&self) -> Result<usize>;

    async fn register_push(&self, registration: &PushRegistration) -> Result<()>;

    async fn unregister_push(&self, token: &str) -> Result<bool>;

    async fn push_registrations(&self) -> Result<Vec<PushRegistration>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_roundtrip_and_rejects_garbage() {
        let cursor = Cursor {
            published_millis: 1_700_000_000_000,
            id: "abcd".to_string(),
        };
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
        assert!(Cursor::decode("!!!").is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode("12:")).is_err());
        assert!(Cursor::decode(&URL_SAFE_NO_PAD.encode("x:abc")).is_err());
    }

    #[test]
    fn test_page_size_is_clamped() {
        let mut query = ArticleQuery::default();
        assert_eq!(query.page_size(), DEFAULT_PAGE_SIZE);
        query.limit = Some(0);
        assert_eq!(query.page_size(), 1);
        query.limit = Some(1000);
        assert_eq!(query.page_size(), MAX_PAGE_SIZE);
    }
}

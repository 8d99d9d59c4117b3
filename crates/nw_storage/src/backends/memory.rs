use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nw_core::{Article, ArticleQuery, ArticleStore, Page, PushRegistration, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

fn newest_first(a: &Article, b: &Article) -> Ordering {
    b.published_at
        .timestamp_millis()
        .cmp(&a.published_at.timestamp_millis())
        .then_with(|| b.id.cmp(&a.id))
}

#[derive(Default)]
pub struct MemoryStore {
    articles: HashMap<String, Article>,
    by_url: HashMap<String, String>,
    push: HashMap<String, PushRegistration>,
}

impl MemoryStore {
    /// Counters of an existing row are kept; they only move through the
    /// increment methods.
    pub fn upsert_article(&mut self, article: &Article) {
        let mut stored = article.clone();
        if let Some(previous) = self.articles.get(&article.id) {
            if previous.url != article.url {
                self.by_url.remove(&previous.url);
            }
            stored.likes = previous.likes;
            stored.views = previous.views;
        }
        self.by_url.insert(stored.url.clone(), stored.id.clone());
        self.articles.insert(stored.id.clone(), stored);
    }

    fn sorted_since(&self, since: DateTime<Utc>) -> Vec<Article> {
        let mut articles: Vec<Article> = self
            .articles
            .values()
            .filter(|a| a.published_at >= since)
            .cloned()
            .collect();
        articles.sort_by(newest_first);
        articles
    }

    pub fn list_articles(&self, query: &ArticleQuery) -> Page<Article> {
        let page_size = query.page_size();
        let mut matching: Vec<&Article> = self
            .articles
            .values()
            .filter(|a| query.matches(a))
            .filter(|a| query.cursor.as_ref().map_or(true, |c| c.precedes(a)))
            .collect();
        matching.sort_by(|a, b| newest_first(a, b));
        let items = matching.into_iter().take(page_size + 1).cloned().collect();
        Page::from_overfetch(items, page_size)
    }

    fn remove_article(&mut self, id: &str) -> bool {
        match self.articles.remove(id) {
            Some(article) => {
                self.by_url.remove(&article.url);
                true
            }
            None => false,
        }
    }
}

pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::default())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn kind() -> &'static str {
        "memory"
    }

    async fn open(_url: Option<&str>) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn upsert_article(&self, article: &Article) -> Result<()> {
        self.store.write().await.upsert_article(article);
        Ok(())
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        Ok(self.store.read().await.articles.get(id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store
            .by_url
            .get(url)
            .and_then(|id| store.articles.get(id))
            .cloned())
    }

    async fn recent_articles(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        let mut articles = self.store.read().await.sorted_since(since);
        articles.truncate(limit);
        Ok(articles)
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Page<Article>> {
        Ok(self.store.read().await.list_articles(query))
    }

    async fn increment_likes(&self, id: &str, delta: i64) -> Result<Option<u64>> {
        let mut store = self.store.write().await;
        Ok(store.articles.get_mut(id).map(|article| {
            article.likes = if delta >= 0 {
                article.likes.saturating_add(delta as u64)
            } else {
                article.likes.saturating_sub(delta.unsigned_abs())
            };
            article.likes
        }))
    }

    async fn increment_views(&self, id: &str) -> Result<Option<u64>> {
        let mut store = self.store.write().await;
        Ok(store.articles.get_mut(id).map(|article| {
            article.views = article.views.saturating_add(1);
            article.views
        }))
    }

    async fn trending_candidates(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        self.recent_articles(since, limit).await
    }

    async fn delete_article(&self, id: &str) -> Result<bool> {
        Ok(self.store.write().await.remove_article(id))
    }

    async fn count_articles(&self) -> Result<usize> {
        Ok(self.store.read().await.articles.len())
    }

    async fn register_push(&self, registration: &PushRegistration) -> Result<()> {
        self.store
            .write()
            .await
            .push
            .insert(registration.token.clone(), registration.clone());
        Ok(())
    }

    async fn unregister_push(&self, token: &str) -> Result<bool> {
        Ok(self.store.write().await.push.remove(token).is_some())
    }

    async fn push_registrations(&self) -> Result<Vec<PushRegistration>> {
        let mut registrations: Vec<_> = self.store.read().await.push.values().cloned().collect();
        registrations.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        Ok(registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nw_core::{article_id, Category, Cursor, Language, Platform, SourceRef};

    fn article(url: &str, minutes_ago: i64, category: Category) -> Article {
        let published_at = Utc::now() - Duration::minutes(minutes_ago);
        Article {
            id: article_id(url),
            url: url.to_string(),
            title: format!("Title for {}", url),
            summary: "Summary".to_string(),
            content: None,
            image_url: None,
            source: "Test Wire".to_string(),
            category,
            language: Language::En,
            published_at,
            ingested_at: published_at,
            updated_at: published_at,
            is_breaking: false,
            likes: 0,
            views: 0,
            sources: vec![SourceRef {
                name: "Test Wire".to_string(),
                url: url.to_string(),
                published_at,
            }],
            title_tokens: vec![],
        }
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        let a = article("http://test.com/a", 10, Category::Politics);
        storage.upsert_article(&a).await.unwrap();

        assert_eq!(storage.count_articles().await.unwrap(), 1);
        assert_eq!(storage.get_article(&a.id).await.unwrap().unwrap().url, a.url);
        assert_eq!(storage.find_by_url(&a.url).await.unwrap().unwrap().id, a.id);
        assert!(storage.find_by_url("http://test.com/zzz").await.unwrap().is_none());

        // Upsert replaces by id
        let mut updated = a.clone();
        updated.summary = "Changed".to_string();
        storage.upsert_article(&updated).await.unwrap();
        assert_eq!(storage.count_articles().await.unwrap(), 1);
        assert_eq!(storage.get_article(&a.id).await.unwrap().unwrap().summary, "Changed");

        assert!(storage.delete_article(&a.id).await.unwrap());
        assert!(!storage.delete_article(&a.id).await.unwrap());
        assert!(storage.find_by_url(&a.url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pagination_walks_every_item_once() {
        let storage = MemoryStorage::new();
        for i in 0..7 {
            let a = article(&format!("http://test.com/{}", i), i, Category::General);
            storage.upsert_article(&a).await.unwrap();
        }

        let mut query = ArticleQuery {
            limit: Some(3),
            ..Default::default()
        };
        let mut seen = Vec::new();
        loop {
            let page = storage.list_articles(&query).await.unwrap();
            seen.extend(page.items.iter().map(|a| a.url.clone()));
            match page.next_cursor {
                Some(next) => query.cursor = Some(Cursor::decode(&next).unwrap()),
                None => break,
            }
        }
        let expected: Vec<String> = (0..7).map(|i| format!("http://test.com/{}", i)).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let storage = MemoryStorage::new();
        let mut sports = article("http://test.com/sports", 5, Category::Sports);
        sports.is_breaking = true;
        storage.upsert_article(&sports).await.unwrap();
        storage
            .upsert_article(&article("http://test.com/politics", 1, Category::Politics))
            .await
            .unwrap();

        let query = ArticleQuery {
            category: Some(Category::Sports),
            ..Default::default()
        };
        let page = storage.list_articles(&query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_cursor.is_none());

        let query = ArticleQuery {
            breaking_only: true,
            ..Default::default()
        };
        assert_eq!(storage.list_articles(&query).await.unwrap().items[0].id, sports.id);
    }

    #[tokio::test]
    async fn test_counters() {
        let storage = MemoryStorage::new();
        let a = article("http://test.com/a", 1, Category::General);
        storage.upsert_article(&a).await.unwrap();

        assert_eq!(storage.increment_likes(&a.id, 1).await.unwrap(), Some(1));
        assert_eq!(storage.increment_likes(&a.id, -5).await.unwrap(), Some(0));
        assert_eq!(storage.increment_views(&a.id).await.unwrap(), Some(1));
        assert_eq!(storage.increment_views("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_keeps_counters() {
        let storage = MemoryStorage::new();
        let a = article("http://test.com/a", 1, Category::General);
        storage.upsert_article(&a).await.unwrap();
        storage.increment_likes(&a.id, 4).await.unwrap();
        storage.increment_views(&a.id).await.unwrap();

        // A stale copy written back must not reset interactions.
        let mut stale = a.clone();
        stale.summary = "Rewritten".to_string();
        storage.upsert_article(&stale).await.unwrap();

        let stored = storage.get_article(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.summary, "Rewritten");
        assert_eq!((stored.likes, stored.views), (4, 1));
    }

    #[tokio::test]
    async fn test_recent_articles_window() {
        let storage = MemoryStorage::new();
        storage.upsert_article(&article("http://test.com/old", 600, Category::General)).await.unwrap();
        storage.upsert_article(&article("http://test.com/new", 5, Category::General)).await.unwrap();

        let recent = storage
            .recent_articles(Utc::now() - Duration::hours(1), 10)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].url, "http://test.com/new");
    }

    #[tokio::test]
    async fn test_push_registrations() {
        let storage = MemoryStorage::new();
        let registration = PushRegistration {
            token: "ExponentPushToken[abc]".to_string(),
            platform: Platform::Ios,
            categories: vec![],
            language: Language::En,
            registered_at: Utc::now(),
        };
        storage.register_push(&registration).await.unwrap();
        storage.register_push(&registration).await.unwrap();
        assert_eq!(storage.push_registrations().await.unwrap().len(), 1);
        assert!(storage.unregister_push(&registration.token).await.unwrap());
        assert!(!storage.unregister_push(&registration.token).await.unwrap());
    }
}

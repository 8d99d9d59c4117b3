use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use nw_core::{
    Article, ArticleQuery, ArticleStore, Category, Error, Language, Page, Platform,
    PushRegistration, Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::StorageBackend;

const DEFAULT_DB_PATH: &str = "newswire.db";

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        content TEXT,
        image_url TEXT,
        source TEXT NOT NULL,
        category TEXT NOT NULL,
        language TEXT NOT NULL,
        published_at INTEGER NOT NULL,
        ingested_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        is_breaking INTEGER NOT NULL DEFAULT 0,
        likes INTEGER NOT NULL DEFAULT 0,
        views INTEGER NOT NULL DEFAULT 0,
        sources TEXT NOT NULL,
        title_tokens TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles (published_at DESC, id DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS push_tokens (
        token TEXT PRIMARY KEY,
        platform TEXT NOT NULL,
        categories TEXT NOT NULL,
        language TEXT NOT NULL,
        registered_at TEXT NOT NULL
    )
    "#,
    // Add future migrations here
];

fn db_err(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Failed to parse date '{}': {}", value, e)))
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::Database(format!("Invalid timestamp: {}", millis)))
}

fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => "ios",
        Platform::Android => "android",
        Platform::Web => "web",
    }
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let sources: String = row.get("sources");
    let title_tokens: String = row.get("title_tokens");
    let language: String = row.get("language");
    let category: String = row.get("category");

    Ok(Article {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get::<Option<String>, _>("content"),
        image_url: row.get::<Option<String>, _>("image_url"),
        source: row.get("source"),
        category: Category::lenient(&category),
        language: Language::from_str(&language).unwrap_or_default(),
        published_at: from_millis(row.get::<i64, _>("published_at"))?,
        ingested_at: parse_time(row.get::<&str, _>("ingested_at"))?,
        updated_at: parse_time(row.get::<&str, _>("updated_at"))?,
        is_breaking: row.get::<i64, _>("is_breaking") != 0,
        likes: row.get::<i64, _>("likes").max(0) as u64,
        views: row.get::<i64, _>("views").max(0) as u64,
        sources: serde_json::from_str(&sources)?,
        title_tokens: serde_json::from_str(&title_tokens)?,
    })
}

fn rows_to_articles(rows: &[SqliteRow]) -> Result<Vec<Article>> {
    rows.iter().map(row_to_article).collect()
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn kind() -> &'static str {
        "sqlite"
    }

    async fn open(url: Option<&str>) -> Result<Self> {
        let path = url
            .map(|u| u.trim_start_matches("sqlite://").trim_start_matches("sqlite:"))
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DB_PATH);
        Self::new_with_path(Path::new(path)).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn upsert_article(&self, article: &Article) -> Result<()> {
        let sources = serde_json::to_string(&article.sources)?;
        let title_tokens = serde_json::to_string(&article.title_tokens)?;

        sqlx::query(
            r#"
            INSERT INTO articles
            (id, url, title, summary, content, image_url, source, category, language,
             published_at, ingested_at, updated_at, is_breaking, likes, views, sources, title_tokens)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                summary = excluded.summary,
                content = excluded.content,
                image_url = excluded.image_url,
                source = excluded.source,
                category = excluded.category,
                language = excluded.language,
                published_at = excluded.published_at,
                ingested_at = excluded.ingested_at,
                updated_at = excluded.updated_at,
                is_breaking = excluded.is_breaking,
                sources = excluded.sources,
                title_tokens = excluded.title_tokens
            "#,
        )
        .bind(&article.id)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(article.content.as_deref())
        .bind(article.image_url.as_deref())
        .bind(&article.source)
        .bind(article.category.slug())
        .bind(article.language.code())
        .bind(article.published_at.timestamp_millis())
        .bind(article.ingested_at.to_rfc3339())
        .bind(article.updated_at.to_rfc3339())
        .bind(article.is_breaking as i64)
        .bind(article.likes as i64)
        .bind(article.views as i64)
        .bind(sources)
        .bind(title_tokens)
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to store article"))?;

        Ok(())
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to get article"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE url = ?")
            .bind(url)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_err("Failed to find article by url"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn recent_articles(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE published_at >= ?
            ORDER BY published_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(since.timestamp_millis())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_err("Failed to load recent articles"))?;
        rows_to_articles(&rows)
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<Page<Article>> {
        let page_size = query.page_size();
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR language = ?2)
              AND (?3 = 0 OR is_breaking = 1)
              AND (?4 IS NULL OR source = ?4 COLLATE NOCASE)
              AND (?5 IS NULL OR published_at < ?5 OR (published_at = ?5 AND id < ?6))
            ORDER BY published_at DESC, id DESC
            LIMIT ?7
            "#,
        )
        .bind(query.category.map(|c| c.slug()))
        .bind(query.language.map(|l| l.code()))
        .bind(query.breaking_only as i64)
        .bind(query.source.as_deref())
        .bind(query.cursor.as_ref().map(|c| c.published_millis))
        .bind(query.cursor.as_ref().map(|c| c.id.as_str()))
        .bind((page_size + 1) as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_err("Failed to list articles"))?;

        Ok(Page::from_overfetch(rows_to_articles(&rows)?, page_size))
    }

    async fn increment_likes(&self, id: &str, delta: i64) -> Result<Option<u64>> {
        let likes = sqlx::query_scalar::<_, i64>(
            "UPDATE articles SET likes = MAX(0, likes + ?) WHERE id = ? RETURNING likes",
        )
        .bind(delta)
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_err("Failed to update likes"))?;
        Ok(likes.map(|l| l.max(0) as u64))
    }

    async fn increment_views(&self, id: &str) -> Result<Option<u64>> {
        let views = sqlx::query_scalar::<_, i64>(
            "UPDATE articles SET views = views + 1 WHERE id = ? RETURNING views",
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_err("Failed to update views"))?;
        Ok(views.map(|v| v.max(0) as u64))
    }

    async fn trending_candidates(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Article>> {
        self.recent_articles(since, limit).await
    }

    async fn delete_article(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to delete article"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_articles(&self) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&*self.pool)
            .await
            .map_err(db_err("Failed to count articles"))?;
        Ok(count.max(0) as usize)
    }

    async fn register_push(&self, registration: &PushRegistration) -> Result<()> {
        let categories = serde_json::to_string(&registration.categories)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO push_tokens (token, platform, categories, language, registered_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&registration.token)
        .bind(platform_name(registration.platform))
        .bind(categories)
        .bind(registration.language.code())
        .bind(registration.registered_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(db_err("Failed to register push token"))?;
        Ok(())
    }

    async fn unregister_push(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_tokens WHERE token = ?")
            .bind(token)
            .execute(&*self.pool)
            .await
            .map_err(db_err("Failed to unregister push token"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn push_registrations(&self) -> Result<Vec<PushRegistration>> {
        let rows = sqlx::query("SELECT * FROM push_tokens ORDER BY registered_at")
            .fetch_all(&*self.pool)
            .await
            .map_err(db_err("Failed to load push tokens"))?;

        rows.iter()
            .map(|row| {
                let categories: String = row.get("categories");
                Ok::<_, Error>(PushRegistration {
                    token: row.get("token"),
                    platform: Platform::from_str(row.get::<&str, _>("platform"))?,
                    categories: serde_json::from_str(&categories)?,
                    language: Language::from_str(row.get::<&str, _>("language")).unwrap_or_default(),
                    registered_at: parse_time(row.get::<&str, _>("registered_at"))?,
                })
            })
            .collect()
    }
}

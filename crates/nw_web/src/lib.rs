use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;
pub mod trending;

pub use error::{ApiError, ApiResult};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let state = Arc::new(state);

    let api = Router::new()
        .route("/articles", get(handlers::list_articles))
        .route("/articles/breaking", get(handlers::breaking_articles))
        .route("/articles/:id", get(handlers::get_article))
        .route("/articles/:id/view", post(handlers::record_view))
        .route(
            "/articles/:id/like",
            post(handlers::like_article).delete(handlers::unlike_article),
        )
        .route("/trending", get(handlers::trending))
        .route("/categories", get(handlers::categories))
        .route("/push/register", post(handlers::register_push))
        .route("/push/:token", delete(handlers::unregister_push))
        .route("/ingest", post(handlers::trigger_ingest))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub mod prelude {
    pub use crate::{create_app, ApiError, AppState, RateLimitConfig};
    pub use nw_core::{Article, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use nw_core::{article_id, Article, ArticleStore, Category, Language, SourceRef};
    use nw_feeds::{IngestConfig, IngestPipeline, LogNotifier};
    use nw_inference::KeywordClassifier;
    use nw_storage::MemoryStorage;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn article(url: &str, title: &str, age_hours: i64, breaking: bool) -> Article {
        let published_at = Utc::now() - ChronoDuration::hours(age_hours);
        Article {
            id: article_id(url),
            url: url.to_string(),
            title: title.to_string(),
            summary: format!("{} summary", title),
            content: None,
            image_url: None,
            source: "Wire".to_string(),
            category: Category::World,
            language: Language::En,
            published_at,
            ingested_at: published_at,
            updated_at: published_at,
            is_breaking: breaking,
            likes: 0,
            views: 0,
            sources: vec![SourceRef {
                name: "Wire".to_string(),
                url: url.to_string(),
                published_at,
            }],
            title_tokens: vec![],
        }
    }

    async fn seeded_store() -> Arc<MemoryStorage> {
        let store = Arc::new(MemoryStorage::new());
        for (i, breaking) in [false, true, false].into_iter().enumerate() {
            let url = format!("https://wire.example.com/{}", i);
            store
                .upsert_article(&article(&url, &format!("Story {}", i), i as i64, breaking))
                .await
                .unwrap();
        }
        store
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_categories() {
        let app = create_app(AppState::new(seeded_store().await));
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["articles"], 3);

        let (_, body) = send(&app, "GET", "/api/categories", None).await;
        assert_eq!(body.as_array().unwrap().len(), Category::ALL.len());
    }

    #[tokio::test]
    async fn test_list_paginates_with_cursor() {
        let app = create_app(AppState::new(seeded_store().await));
        let (status, first) = send(&app, "GET", "/api/articles?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["items"].as_array().unwrap().len(), 2);
        assert_eq!(first["items"][0]["title"], "Story 0");
        let cursor = first["next_cursor"].as_str().unwrap().to_string();

        let (_, second) = send(&app, "GET", &format!("/api/articles?limit=2&cursor={}", cursor), None).await;
        assert_eq!(second["items"].as_array().unwrap().len(), 1);
        assert_eq!(second["items"][0]["title"], "Story 2");
        assert!(second["next_cursor"].is_null());
    }

    #[tokio::test]
    async fn test_invalid_query_is_bad_request() {
        let app = create_app(AppState::new(seeded_store().await));
        let (status, body) = send(&app, "GET", "/api/articles?category=gossip", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("gossip"));

        let (status, _) = send(&app, "GET", "/api/articles?cursor=bm9jb2xvbg", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/articles?limit=many", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_breaking_and_single_article() {
        let app = create_app(AppState::new(seeded_store().await));
        let (_, body) = send(&app, "GET", "/api/articles/breaking", None).await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["title"], "Story 1");

        let id = article_id("https://wire.example.com/1");
        let (status, body) = send(&app, "GET", &format!("/api/articles/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (status, body) = send(&app, "GET", "/api/articles/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_counters_and_trending() {
        let app = create_app(AppState::new(seeded_store().await));
        let id = article_id("https://wire.example.com/2");

        let (_, body) = send(&app, "POST", &format!("/api/articles/{}/view", id), None).await;
        assert_eq!(body["views"], 1);
        for _ in 0..20 {
            send(&app, "POST", &format!("/api/articles/{}/like", id), None).await;
        }
        let (_, body) = send(&app, "DELETE", &format!("/api/articles/{}/like", id), None).await;
        assert_eq!(body["likes"], 19);

        let (status, _) = send(&app, "POST", "/api/articles/missing/like", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/trending?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        let ranked = body.as_array().unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0]["id"], id.as_str());
        assert!(ranked[0]["score"].as_f64().unwrap() > ranked[1]["score"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn test_trending_hours_out_of_range() {
        let app = create_app(AppState::new(seeded_store().await));
        for hours in ["0", "-3", "721", "10000000000"] {
            let (status, body) = send(&app, "GET", &format!("/api/trending?hours={}", hours), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "hours={}", hours);
            assert!(body["error"].as_str().unwrap().contains("hours"));
        }

        let (status, _) = send(&app, "GET", "/api/trending?hours=720", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unlike_floors_at_zero() {
        let app = create_app(AppState::new(seeded_store().await));
        let id = article_id("https://wire.example.com/0");
        let (status, body) = send(&app, "DELETE", &format!("/api/articles/{}/like", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["likes"], 0);
    }

    #[tokio::test]
    async fn test_push_registration() {
        let store = seeded_store().await;
        let app = create_app(AppState::new(store.clone()));

        let (status, body) = send(
            &app,
            "POST",
            "/api/push/register",
            Some(serde_json::json!({"token": "device-abc", "platform": "ios", "categories": ["sports"], "language": "es"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["language"], "es");
        assert_eq!(store.push_registrations().await.unwrap().len(), 1);

        let (status, _) = send(
            &app,
            "POST",
            "/api/push/register",
            Some(serde_json::json!({"token": "t", "platform": "blackberry"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", "/api/push/register", Some(serde_json::json!({"platform": "ios"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", "/api/push/device-abc", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", "/api/push/device-abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ingest_requires_admin_key() {
        let store = Arc::new(MemoryStorage::new());
        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            Arc::new(KeywordClassifier::new()),
            Arc::new(LogNotifier),
            vec![],
            IngestConfig::default(),
        ));

        let app = create_app(AppState::new(store.clone()));
        let (status, _) = send(&app, "POST", "/api/ingest", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let app = create_app(
            AppState::new(store)
                .with_pipeline(pipeline)
                .with_admin_key(Some("sekret".to_string())),
        );
        let (status, _) = send(&app, "POST", "/api/ingest", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/api/ingest")
            .header("x-admin-key", "sekret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let app = create_app(AppState::new(seeded_store().await).with_rate_limit(RateLimitConfig {
            max_requests: 2,
            window: Duration::from_secs(60),
        }));
        let request = || {
            Request::builder()
                .uri("/api/categories")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(app.clone().oneshot(request()).await.unwrap().status(), StatusCode::OK);
        let limited = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key("retry-after"));

        // Health sits outside the limited API.
        let health = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.oneshot(health).await.unwrap().status(), StatusCode::OK);
    }
}

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use nw_core::{Article, ArticleQuery, Category, Cursor, Language, Page, Platform, PushRegistration};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::trending::{rank, TrendingArticle, DEFAULT_HOURS, DEFAULT_LIMIT, MAX_HOURS, MAX_LIMIT};
use crate::AppState;

/// Upper bound on articles scored for one trending request.
const TRENDING_CANDIDATES: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub language: Option<String>,
    pub breaking: Option<bool>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl ListParams {
    fn into_query(self) -> ApiResult<ArticleQuery> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(ArticleQuery {
            category: non_empty(self.category)
                .map(|c| c.parse::<Category>())
                .transpose()?,
            language: non_empty(self.language)
                .map(|l| l.parse::<Language>())
                .transpose()?,
            breaking_only: self.breaking.unwrap_or(false),
            source: non_empty(self.source),
            limit: self.limit,
            cursor: non_empty(self.cursor)
                .map(|c| Cursor::decode(&c))
                .transpose()?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingParams {
    pub limit: Option<usize>,
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPush {
    pub token: String,
    pub platform: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    pub source: Option<String>,
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(p)| p)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("article {} not found", id))
}

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let articles = state.store.count_articles().await?;
    Ok(Json(json!({ "status": "ok", "articles": articles })))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<Article>>> {
    let query = query_params(params)?.into_query()?;
    Ok(Json(state.store.list_articles(&query).await?))
}

pub async fn breaking_articles(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<Article>>> {
    let mut query = query_params(params)?.into_query()?;
    query.breaking_only = true;
    Ok(Json(state.store.list_articles(&query).await?))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Article>> {
    state
        .store
        .get_article(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let views = state.store.increment_views(&id).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({ "id": id, "views": views })))
}

pub async fn like_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let likes = state.store.increment_likes(&id, 1).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({ "id": id, "likes": likes })))
}

pub async fn unlike_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let likes = state.store.increment_likes(&id, -1).await?.ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({ "id": id, "likes": likes })))
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    params: Result<Query<TrendingParams>, QueryRejection>,
) -> ApiResult<Json<Vec<TrendingArticle>>> {
    let params = query_params(params)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let hours = params.hours.unwrap_or(DEFAULT_HOURS);
    if !(1..=MAX_HOURS).contains(&hours) {
        return Err(ApiError::BadRequest(format!("hours must be between 1 and {}", MAX_HOURS)));
    }

    let now = Utc::now();
    let candidates = state
        .store
        .trending_candidates(now - Duration::hours(hours), TRENDING_CANDIDATES)
        .await?;
    Ok(Json(rank(candidates, now, limit)))
}

pub async fn categories() -> Json<Vec<&'static str>> {
    Json(Category::ALL.iter().map(|c| c.slug()).collect())
}

pub async fn register_push(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RegisterPush>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let token = body.token.trim();
    if token.is_empty() {
        return Err(ApiError::BadRequest("token is required".to_string()));
    }

    let registration = PushRegistration {
        token: token.to_string(),
        platform: body.platform.parse::<Platform>()?,
        categories: body
            .categories
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<nw_core::Result<Vec<_>>>()?,
        language: body
            .language
            .as_deref()
            .map(str::parse::<Language>)
            .transpose()?
            .unwrap_or_default(),
        registered_at: Utc::now(),
    };
    state.store.register_push(&registration).await?;
    info!("📱 Registered {:?} device for push", registration.platform);
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn unregister_push(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    if state.store.unregister_push(&token).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("push token not registered".to_string()))
    }
}

pub async fn trigger_ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    params: Result<Query<IngestParams>, QueryRejection>,
) -> ApiResult<Json<nw_feeds::IngestReport>> {
    if let Some(expected) = &state.admin_key {
        let given = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    let pipeline = state
        .pipeline
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("ingestion is not configured".to_string()))?;
    let params = query_params(params)?;

    info!("📥 Ingest triggered over HTTP");
    let report = pipeline.run_once(params.source.as_deref()).await?;
    Ok(Json(report))
}

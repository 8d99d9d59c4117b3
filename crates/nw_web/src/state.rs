use nw_core::ArticleStore;
use nw_feeds::IngestPipeline;
use std::sync::Arc;

use crate::rate_limit::{RateLimitConfig, RateLimiter};

pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    /// Present when the server may trigger ingestion itself
    pub pipeline: Option<Arc<IngestPipeline>>,
    pub admin_key: Option<String>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self {
            store,
            pipeline: None,
            admin_key: None,
            rate_limiter: RateLimiter::default(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<IngestPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_admin_key(mut self, admin_key: Option<String>) -> Self {
        self.admin_key = admin_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limiter = RateLimiter::new(config);
        self
    }
}

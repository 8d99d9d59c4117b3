use async_trait::async_trait;
use crate::types::{Category, RawArticle};

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Map an incoming article onto a category. Implementations fall back to
    /// `Category::General` rather than failing the ingest.
    async fn classify(&self, article: &RawArticle) -> Category;
}

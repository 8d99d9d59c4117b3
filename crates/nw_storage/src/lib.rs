use async_trait::async_trait;
use nw_core::{ArticleStore, Error, Result};
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: ArticleStore + Sized {
    /// Name used on the command line
    fn kind() -> &'static str;

    /// Open the backend; `url` is backend specific (a file path for SQLite).
    async fn open(url: Option<&str>) -> Result<Self>;
}

async fn open_backend<T: StorageBackend + 'static>(url: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    let storage = T::open(url).await?;
    info!("🏦 Storage backend opened (using {})", T::kind());
    Ok(Arc::new(storage))
}

/// Opens the storage backend named `kind`.
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "memory" => open_backend::<MemoryStorage>(url).await,
        #[cfg(feature = "sqlite")]
        "sqlite" => open_backend::<SQLiteStorage>(url).await,
        other => Err(Error::Config(format!(
            "unknown storage backend '{}' (available: {})",
            other,
            available_backends().join(", ")
        ))),
    }
}

pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec![MemoryStorage::kind()];
    #[cfg(feature = "sqlite")]
    backends.push(SQLiteStorage::kind());
    backends
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageBackend};
}

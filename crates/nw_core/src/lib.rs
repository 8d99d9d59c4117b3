pub mod error;
pub mod models;
pub mod similarity;
pub mod storage;
pub mod text;
pub mod types;

pub use error::Error;
pub use models::Classifier;
pub use similarity::{jaccard, DedupConfig};
pub use storage::{ArticleQuery, ArticleStore, Cursor, Page};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::{Article, ArticleStore, Category, Classifier, Error, Language, RawArticle, Result};
}

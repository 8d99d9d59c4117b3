pub mod cli;
pub mod dedup;
pub mod html;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod sources;

pub use cli::{handle_command, FeedArgs, FeedCommands};
pub use dedup::{merge_into, Deduplicator};
pub use notify::{LogNotifier, Notifier, PushNotifier};
pub use pipeline::{IngestConfig, IngestPipeline, IngestReport};
pub use scheduler::run_periodic;
pub use sources::{default_sources, BoxedSource, NewsSource, SourcesConfig};

pub mod prelude {
    pub use super::sources::NewsSource;
    pub use super::{IngestPipeline, IngestReport, Notifier};
    pub use nw_core::{Article, Error, Result};
}

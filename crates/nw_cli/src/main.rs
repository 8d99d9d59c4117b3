use anyhow::Context;
use clap::Parser;
use nw_core::{ArticleStore, DedupConfig, Language};
use nw_feeds::cli::{handle_command, FeedArgs, FeedCommands};
use nw_feeds::{default_sources, run_periodic, IngestConfig, IngestPipeline, LogNotifier, Notifier, PushNotifier, SourcesConfig};
use nw_inference::{ClassifierKind, InferenceConfig};
use nw_web::{create_app, AppState, RateLimitConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

fn too_long() -> String {
    "Duration is too long".to_string()
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(too_long)?;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A trailing bare number counts as seconds
        if !current_number.is_empty() {
            let secs = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds.checked_add(secs).ok_or_else(too_long)?;
            has_unit = true;
        }

        if !has_unit || total_seconds == 0 {
            return Err("Duration must be a positive number, e.g. 30m or 1h30m".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum NotifierKind {
    Log,
    Push,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "News ingestion, deduplication and read API", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, env = "NW_STORAGE", default_value = "sqlite", global = true)]
    storage: String,
    /// Backend location, e.g. the SQLite file path
    #[arg(long, env = "NW_DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[arg(long, env = "NW_CLASSIFIER", default_value = "keyword", global = true)]
    classifier: ClassifierKind,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "NW_OPENAI_BASE_URL", global = true)]
    openai_base_url: Option<String>,
    #[arg(long, env = "NW_OPENAI_MODEL", global = true)]
    openai_model: Option<String>,

    /// Languages to ingest, comma separated
    #[arg(long, env = "NW_LANGUAGES", value_delimiter = ',', default_value = "en,es", global = true)]
    languages: Vec<Language>,
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true, global = true)]
    newsapi_key: Option<String>,
    #[arg(long, env = "NEWSAPI_BASE_URL", global = true)]
    newsapi_base_url: Option<String>,

    /// Minimum title similarity for two articles to be merged
    #[arg(long, env = "NW_DEDUP_THRESHOLD", default_value_t = 0.6, global = true)]
    dedup_threshold: f64,
    #[arg(long, env = "NW_DEDUP_WINDOW_HOURS", default_value_t = 48, global = true)]
    dedup_window_hours: i64,

    #[arg(long, value_enum, env = "NW_NOTIFIER", default_value = "log", global = true)]
    notifier: NotifierKind,
    #[arg(long, env = "NW_PUSH_ENDPOINT", global = true)]
    push_endpoint: Option<String>,
    #[arg(long, env = "EXPO_ACCESS_TOKEN", hide_env_values = true, global = true)]
    push_access_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API and ingest in the background
    Serve {
        #[arg(long, env = "NW_BIND", default_value = "0.0.0.0:3000")]
        bind: SocketAddr,
        /// Interval between background ingestion rounds (e.g. 15m, 1h)
        #[arg(long, env = "NW_INGEST_INTERVAL", default_value = "15m")]
        interval: HumanDuration,
        /// Only serve, never ingest in the background
        #[arg(long)]
        no_ingest: bool,
        #[arg(long, env = "NW_ADMIN_KEY", hide_env_values = true)]
        admin_key: Option<String>,
        /// Requests allowed per client per minute
        #[arg(long, env = "NW_RATE_LIMIT", default_value_t = 120)]
        rate_limit: u32,
    },
    /// Ingest once, or periodically with --interval
    Ingest {
        /// Restrict to a language or one source, e.g. `es` or `es/clarin`
        source: Option<String>,
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// List configured sources
    Sources,
}

impl Cli {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            dedup: DedupConfig {
                threshold: self.dedup_threshold,
                window_hours: self.dedup_window_hours,
                ..DedupConfig::default()
            },
            ..IngestConfig::default()
        }
    }

    fn sources_config(&self) -> SourcesConfig {
        SourcesConfig {
            languages: self.languages.clone(),
            newsapi_key: self.newsapi_key.clone(),
            newsapi_base_url: self.newsapi_base_url.clone(),
            ..SourcesConfig::default()
        }
    }

    fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            kind: self.classifier,
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.openai_model.clone(),
        }
    }

    fn notifier(&self) -> nw_core::Result<Arc<dyn Notifier>> {
        Ok(match self.notifier {
            NotifierKind::Log => Arc::new(LogNotifier),
            NotifierKind::Push => Arc::new(PushNotifier::new(
                self.push_endpoint.clone(),
                self.push_access_token.clone(),
            )?),
        })
    }
}

fn build_pipeline(cli: &Cli, store: Arc<dyn ArticleStore>) -> anyhow::Result<Arc<IngestPipeline>> {
    let classifier = nw_inference::create_classifier(&cli.inference_config())?;
    let sources = default_sources(&cli.sources_config())?;
    let names: Vec<String> = sources.iter().map(|s| s.metadata().name).collect();
    info!("📡 Sources initialized: {}", names.join(", "));

    Ok(Arc::new(IngestPipeline::new(
        store,
        classifier,
        cli.notifier()?,
        sources,
        cli.ingest_config(),
    )))
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    let store = nw_storage::create_storage(&cli.storage, cli.database_url.as_deref())
        .await
        .with_context(|| format!("opening {} storage", cli.storage))?;
    let pipeline = build_pipeline(&cli, store.clone())?;

    match cli.command {
        Commands::Serve {
            bind,
            interval,
            no_ingest,
            admin_key,
            rate_limit,
        } => {
            let (stop_tx, mut stop_rx) = watch::channel(false);
            let scheduler = if no_ingest {
                None
            } else {
                info!("⏰ Ingesting every {}s", interval.0.as_secs());
                let pipeline = pipeline.clone();
                Some(tokio::spawn(run_periodic(pipeline, interval.0, None, async move {
                    let _ = stop_rx.changed().await;
                })))
            };

            let state = AppState::new(store)
                .with_pipeline(pipeline)
                .with_admin_key(admin_key)
                .with_rate_limit(RateLimitConfig {
                    max_requests: rate_limit,
                    ..RateLimitConfig::default()
                });
            let app = create_app(state);

            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding {}", bind))?;
            info!("🌐 Listening on {}", bind);
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(ctrl_c())
                .await?;

            let _ = stop_tx.send(true);
            if let Some(handle) = scheduler {
                let rounds = handle.await?;
                info!("Scheduler ran {} rounds", rounds);
            }
        }
        Commands::Ingest { source, interval } => match interval {
            Some(interval) => {
                info!("⏰ Ingesting every {}s, ctrl-c to stop", interval.0.as_secs());
                run_periodic(pipeline, interval.0, source, ctrl_c()).await;
            }
            None => {
                let args = FeedArgs {
                    command: FeedCommands::Run { source },
                };
                handle_command(args, &pipeline).await?;
            }
        },
        Commands::Sources => {
            handle_command(FeedArgs { command: FeedCommands::List }, &pipeline).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_duration() {
        assert_eq!("90".parse::<HumanDuration>().unwrap().0, Duration::from_secs(90));
        assert_eq!("1h30m".parse::<HumanDuration>().unwrap().0, Duration::from_secs(5400));
        assert_eq!("1d 2h".parse::<HumanDuration>().unwrap().0, Duration::from_secs(93600));
        assert!("10x".parse::<HumanDuration>().is_err());
        assert!("h".parse::<HumanDuration>().is_err());
        assert!("0m".parse::<HumanDuration>().is_err());
        assert!("999999999999999999d".parse::<HumanDuration>().is_err());
        assert!("18446744073709551615s 1s".parse::<HumanDuration>().is_err());
        assert!("18446744073709551615s1".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "nw",
            "--storage",
            "memory",
            "--languages",
            "es",
            "ingest",
            "es/clarin",
            "--interval",
            "30m",
        ])
        .unwrap();
        assert_eq!(cli.storage, "memory");
        assert_eq!(cli.languages, vec![Language::Es]);
        match cli.command {
            Commands::Ingest { source, interval } => {
                assert_eq!(source.as_deref(), Some("es/clarin"));
                assert_eq!(interval, Some(HumanDuration(Duration::from_secs(1800))));
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["nw", "--classifier", "chat", "--dedup-threshold", "0.7", "sources"]).unwrap();
        assert_eq!(cli.classifier, ClassifierKind::Chat);
        assert_eq!(cli.ingest_config().dedup.threshold, 0.7);
        assert!(Cli::try_parse_from(["nw", "--languages", "fr", "sources"]).is_err());
    }

    #[tokio::test]
    async fn test_build_pipeline_with_feeds_only() {
        let cli = Cli::try_parse_from(["nw", "--storage", "memory", "--languages", "en", "sources"]).unwrap();
        let store = nw_storage::create_storage("memory", None).await.unwrap();
        let pipeline = build_pipeline(&cli, store).unwrap();
        assert!(!pipeline.sources().is_empty());
        assert!(pipeline.sources().iter().all(|s| s.metadata().language == Language::En));
    }
}

use async_trait::async_trait;
use nw_core::{Article, Error, PushRegistration, Result};
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Expo accepts at most this many messages per request.
pub const PUSH_BATCH_SIZE: usize = 100;
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Announces a breaking article; returns how many devices were targeted.
    async fn notify_breaking(&self, article: &Article, registrations: &[PushRegistration]) -> Result<usize>;
}

/// Registrations interested in `article`.
pub fn targets_for<'a>(article: &Article, registrations: &'a [PushRegistration]) -> Vec<&'a PushRegistration> {
    registrations.iter().filter(|r| r.wants(article)).collect()
}

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_breaking(&self, article: &Article, registrations: &[PushRegistration]) -> Result<usize> {
        let targets = targets_for(article, registrations).len();
        info!("🚨 Breaking: {} ({} interested devices)", article.title, targets);
        Ok(targets)
    }
}

#[derive(Serialize)]
struct PushData<'a> {
    article_id: &'a str,
}

#[derive(Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    data: PushData<'a>,
}

pub struct PushNotifier {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl PushNotifier {
    pub fn new(endpoint: Option<String>, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_PUSH_ENDPOINT.to_string()),
            access_token: access_token.filter(|t| !t.is_empty()),
        })
    }

    fn messages<'a>(article: &'a Article, targets: &[&'a PushRegistration]) -> Vec<PushMessage<'a>> {
        let body = if article.summary.is_empty() {
            article.source.as_str()
        } else {
            article.summary.as_str()
        };
        targets
            .iter()
            .map(|&r| PushMessage {
                to: &r.token,
                title: &article.title,
                body,
                sound: "default",
                data: PushData { article_id: &article.id },
            })
            .collect()
    }

    async fn send_batch(&self, batch: &[PushMessage<'_>]) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(batch);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for PushNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushNotifier")
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn name(&self) -> &str {
        "push"
    }

    async fn notify_breaking(&self, article: &Article, registrations: &[PushRegistration]) -> Result<usize> {
        let targets = targets_for(article, registrations);
        if targets.is_empty() {
            return Ok(0);
        }

        let messages = Self::messages(article, &targets);
        let mut delivered = 0;
        for batch in messages.chunks(PUSH_BATCH_SIZE) {
            match self.send_batch(batch).await {
                Ok(()) => delivered += batch.len(),
                Err(e) => warn!("Push batch of {} failed: {}", batch.len(), e),
            }
        }
        info!("📣 Pushed '{}' to {}/{} devices", article.title, delivered, targets.len());
        Ok(delivered)
    }
}

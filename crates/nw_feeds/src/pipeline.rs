use chrono::{DateTime, Duration, Utc};
use nw_core::text::{clean_text, strip_source_suffix, title_tokens, trim_summary};
use nw_core::{
    article_id, canonical_url, Article, ArticleStatus, ArticleStore, Category, Classifier, DedupConfig, Error,
    PushRegistration, RawArticle, Result, SourceRef,
};
use nw_inference::BreakingDetector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dedup::{merge_into, Deduplicator};
use crate::html::html_to_text;
use crate::notify::Notifier;
use crate::sources::{parse_selector, BoxedSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub summary_max_chars: usize,
    /// Items published longer ago than this are dropped.
    pub max_age_hours: i64,
    pub breaking_max_age_hours: i64,
    pub dedup: DedupConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            summary_max_chars: 280,
            max_age_hours: 72,
            breaking_max_age_hours: 3,
            dedup: DedupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed_sources: usize,
    pub notified: usize,
    pub errors: Vec<String>,
}

impl IngestReport {
    fn record(&mut self, status: &ArticleStatus) {
        match status {
            ArticleStatus::New => self.new += 1,
            ArticleStatus::Updated => self.updated += 1,
            ArticleStatus::Merged { .. } => self.merged += 1,
            ArticleStatus::Unchanged => self.unchanged += 1,
        }
    }
}

/// Fetch, clean, classify, deduplicate and store one round of articles.
pub struct IngestPipeline {
    store: Arc<dyn ArticleStore>,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn Notifier>,
    sources: Vec<BoxedSource>,
    config: IngestConfig,
    breaking: BreakingDetector,
    dedup: Deduplicator,
    run_lock: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ArticleStore>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn Notifier>,
        sources: Vec<BoxedSource>,
        config: IngestConfig,
    ) -> Self {
        Self {
            breaking: BreakingDetector::new(config.breaking_max_age_hours),
            dedup: Deduplicator::new(config.dedup.clone()),
            store,
            classifier,
            notifier,
            sources,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn sources(&self) -> &[BoxedSource] {
        &self.sources
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Sources matching a `language[/source]` selector, or all of them.
    pub fn select_sources(&self, filter: Option<&str>) -> Result<Vec<&BoxedSource>> {
        let Some(selector) = filter else {
            return Ok(self.sources.iter().collect());
        };
        let (language, name) = parse_selector(selector)?;
        let selected: Vec<&BoxedSource> = self
            .sources
            .iter()
            .filter(|s| s.metadata().language == language)
            .filter(|s| name.as_ref().map_or(true, |n| s.cli_names().contains(n)))
            .collect();
        if selected.is_empty() {
            return Err(Error::InvalidInput(format!("No source matches {}", selector)));
        }
        Ok(selected)
    }

    /// Runs one ingestion round. Overlapping calls wait for each other.
    pub async fn run_once(&self, filter: Option<&str>) -> Result<IngestReport> {
        let _guard = self.run_lock.lock().await;
        let selected = self.select_sources(filter)?;
        let now = Utc::now();
        let mut report = IngestReport::default();

        let since = now - Duration::hours(self.config.dedup.window_hours);
        let mut window = self
            .store
            .recent_articles(since, self.config.dedup.window_limit)
            .await?;
        debug!("Dedup window holds {} articles", window.len());
        let mut registrations: Option<Vec<PushRegistration>> = None;

        for source in selected {
            let meta = source.metadata();
            info!("📡 Fetching {}", meta.name);
            let items = match source.fetch().await {
                Ok(items) => items,
                Err(e) => {
                    warn!("❌ Source {} failed: {}", meta.name, e);
                    report.failed_sources += 1;
                    report.errors.push(format!("{}: {}", meta.name, e));
                    continue;
                }
            };
            report.fetched += items.len();
            info!("📰 {} returned {} items", meta.name, items.len());

            for raw in items {
                let Some(article) = self.prepare(raw, now).await else {
                    report.skipped += 1;
                    continue;
                };
                let (status, article) = match self.ingest_article(article, &mut window, now).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Failed to store article from {}: {}", meta.name, e);
                        report.skipped += 1;
                        report.errors.push(format!("{}: {}", meta.name, e));
                        continue;
                    }
                };
                report.record(&status);

                if status == ArticleStatus::New && article.is_breaking {
                    if registrations.is_none() {
                        match self.store.push_registrations().await {
                            Ok(loaded) => registrations = Some(loaded),
                            Err(e) => {
                                warn!("Could not load push registrations, not notifying: {}", e);
                                report.errors.push(format!("push registrations: {}", e));
                                continue;
                            }
                        }
                    }
                    let registered = registrations.as_deref().unwrap_or_default();
                    match self.notifier.notify_breaking(&article, registered).await {
                        Ok(count) => report.notified += count,
                        Err(e) => warn!("Notifier {} failed: {}", self.notifier.name(), e),
                    }
                }
            }
        }

        info!(
            "✅ Ingest done: {} fetched, {} new, {} updated, {} merged, {} unchanged, {} skipped, {} failed sources",
            report.fetched,
            report.new,
            report.updated,
            report.merged,
            report.unchanged,
            report.skipped,
            report.failed_sources
        );
        Ok(report)
    }

    /// Cleans and classifies a raw item; `None` when it is unusable or stale.
    pub async fn prepare(&self, mut raw: RawArticle, now: DateTime<Utc>) -> Option<Article> {
        let url = match canonical_url(&raw.url) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping item with bad url: {}", e);
                return None;
            }
        };
        let title = strip_source_suffix(&clean_text(&raw.title));
        if title.is_empty() {
            return None;
        }
        let published_at = raw.published_at.unwrap_or(now).min(now);
        if now - published_at > Duration::hours(self.config.max_age_hours) {
            debug!("Skipping stale item: {}", title);
            return None;
        }

        let description = raw.description.as_deref().map(html_to_text).filter(|d| !d.is_empty());
        let content = raw.content.as_deref().map(html_to_text).filter(|c| !c.is_empty());
        let summary = description
            .as_deref()
            .or(content.as_deref())
            .map(|text| trim_summary(text, self.config.summary_max_chars))
            .unwrap_or_default();

        raw.title = title.clone();
        raw.description = description.clone();
        let category = self.classifier.classify(&raw).await;
        let is_breaking = self
            .breaking
            .is_breaking(&title, description.as_deref(), published_at, now);

        Some(Article {
            id: article_id(&url),
            title_tokens: title_tokens(&title, raw.language),
            sources: vec![SourceRef {
                name: raw.source.clone(),
                url: url.clone(),
                published_at,
            }],
            url,
            title,
            summary,
            content,
            image_url: raw.image_url.filter(|u| u.starts_with("http")),
            source: raw.source,
            category,
            language: raw.language,
            published_at,
            ingested_at: now,
            updated_at: now,
            is_breaking,
            likes: 0,
            views: 0,
        })
    }

    /// Stores `article` against the store and the current dedup window.
    pub async fn ingest_article(
        &self,
        article: Article,
        window: &mut Vec<Article>,
        now: DateTime<Utc>,
    ) -> Result<(ArticleStatus, Article)> {
        if let Some(existing) = self.store.find_by_url(&article.url).await? {
            // A merged story keeps the longest summary any outlet gave it.
            let summary = if existing.source_count() > 1
                && existing.summary.chars().count() >= article.summary.chars().count()
            {
                existing.summary.clone()
            } else {
                article.summary
            };
            if existing.title == article.title && existing.summary == summary {
                return Ok((ArticleStatus::Unchanged, existing));
            }
            let mut updated = existing.clone();
            updated.title = article.title;
            updated.title_tokens = article.title_tokens;
            updated.summary = summary;
            updated.image_url = article.image_url.or(existing.image_url);
            updated.content = article.content.or(existing.content);
            updated.is_breaking = article.is_breaking;
            if existing.category == Category::General {
                updated.category = article.category;
            }
            updated.updated_at = now;
            self.store.upsert_article(&updated).await?;
            replace_in_window(window, &updated);
            debug!("📝 Updated {}", updated.url);
            return Ok((ArticleStatus::Updated, updated));
        }

        let matched = self
            .dedup
            .find_match(&article, window)
            .map(|(matched, score)| (matched.id.clone(), score));
        if let Some((matched_id, score)) = matched {
            // The window copy predates likes and views recorded since it was loaded.
            let Some(before) = self.store.get_article(&matched_id).await? else {
                window.retain(|a| a.id != matched_id);
                self.store.upsert_article(&article).await?;
                window.push(article.clone());
                debug!("🆕 Stored {} (matched story was removed)", article.url);
                return Ok((ArticleStatus::New, article));
            };
            let merged = merge_into(&before, &article, now);
            if !merge_changed(&before, &merged) {
                return Ok((ArticleStatus::Unchanged, before));
            }
            self.store.upsert_article(&merged).await?;
            replace_in_window(window, &merged);
            debug!("🔗 Merged {} into {} (score {:.2})", article.url, merged.id, score);
            let into = merged.id.clone();
            return Ok((ArticleStatus::Merged { into }, merged));
        }

        self.store.upsert_article(&article).await?;
        window.push(article.clone());
        debug!("🆕 Stored {}", article.url);
        Ok((ArticleStatus::New, article))
    }
}

fn replace_in_window(window: &mut Vec<Article>, article: &Article) {
    match window.iter_mut().find(|a| a.id == article.id) {
        Some(slot) => *slot = article.clone(),
        None => window.push(article.clone()),
    }
}

/// Whether a merge produced anything worth writing back.
fn merge_changed(before: &Article, after: &Article) -> bool {
    before.sources.len() != after.sources.len()
        || before.summary != after.summary
        || before.image_url != after.image_url
        || before.content != after.content
        || before.is_breaking != after.is_breaking
        || before.category != after.category
        || before.published_at != after.published_at
}

//! Near-duplicate detection over title tokens and the merge policy applied
//! when two outlets report the same story.

use chrono::{DateTime, Utc};
use nw_core::{jaccard, Article, Category, DedupConfig, SourceRef};

#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    pub config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Best match for `candidate` in `window` scoring at least the threshold.
    /// Equal scores go to the most recently published article.
    pub fn find_match<'a>(&self, candidate: &Article, window: &'a [Article]) -> Option<(&'a Article, f64)> {
        let mut best: Option<(&'a Article, f64)> = None;
        for other in window {
            if other.id == candidate.id || other.language != candidate.language {
                continue;
            }
            let score = jaccard(&candidate.title_tokens[..], &other.title_tokens[..]);
            if score < self.config.threshold {
                continue;
            }
            best = match best {
                Some((current, current_score))
                    if current_score > score
                        || (current_score == score && current.published_at >= other.published_at) =>
                {
                    Some((current, current_score))
                }
                _ => Some((other, score)),
            };
        }
        best
    }
}

/// Folds `incoming` into `existing`, which keeps its identity and counters.
pub fn merge_into(existing: &Article, incoming: &Article, now: DateTime<Utc>) -> Article {
    let mut merged = existing.clone();

    merged.published_at = existing.published_at.min(incoming.published_at);
    merged.updated_at = now;
    if incoming.summary.chars().count() > existing.summary.chars().count() {
        merged.summary = incoming.summary.clone();
    }
    if merged.image_url.is_none() {
        merged.image_url = incoming.image_url.clone();
    }
    if merged.content.is_none() {
        merged.content = incoming.content.clone();
    }
    merged.is_breaking = existing.is_breaking || incoming.is_breaking;
    if existing.category == Category::General && incoming.category != Category::General {
        merged.category = incoming.category;
    }

    if merged.sources.is_empty() {
        merged.sources.push(SourceRef {
            name: existing.source.clone(),
            url: existing.url.clone(),
            published_at: existing.published_at,
        });
    }
    let known = merged
        .sources
        .iter()
        .any(|s| s.url == incoming.url || s.name.eq_ignore_ascii_case(&incoming.source));
    if !known {
        merged.sources.push(SourceRef {
            name: incoming.source.clone(),
            url: incoming.url.clone(),
            published_at: incoming.published_at,
        });
    }

    merged
}

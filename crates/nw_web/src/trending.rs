use chrono::{DateTime, Utc};
use nw_core::Article;
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;
pub const DEFAULT_HOURS: i64 = 24;
/// Thirty days.
pub const MAX_HOURS: i64 = 720;

#[derive(Debug, Clone, Serialize)]
pub struct TrendingArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: f64,
}

/// `(views + 3·likes + 5·(sources − 1) + 1) / (age_hours + 2)^1.5`, boosted
/// by half for breaking stories.
pub fn trending_score(article: &Article, now: DateTime<Utc>) -> f64 {
    let engagement = article.views as f64
        + 3.0 * article.likes as f64
        + 5.0 * (article.source_count() - 1) as f64
        + 1.0;
    let score = engagement / (article.age_hours(now) + 2.0).powf(1.5);
    if article.is_breaking {
        score * 1.5
    } else {
        score
    }
}

/// Highest scores first; equal scores go to the newer article.
pub fn rank(candidates: Vec<Article>, now: DateTime<Utc>, limit: usize) -> Vec<TrendingArticle> {
    let mut scored: Vec<TrendingArticle> = candidates
        .into_iter()
        .map(|article| TrendingArticle {
            score: trending_score(&article, now),
            article,
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.article.published_at.cmp(&a.article.published_at))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nw_core::{Category, Language, SourceRef};

    fn article(id: &str, age_hours: i64, views: u64, likes: u64, now: DateTime<Utc>) -> Article {
        let published_at = now - Duration::hours(age_hours);
        Article {
            id: id.to_string(),
            url: format!("https://a.com/{}", id),
            title: id.to_string(),
            summary: String::new(),
            content: None,
            image_url: None,
            source: "A".to_string(),
            category: Category::General,
            language: Language::En,
            published_at,
            ingested_at: published_at,
            updated_at: published_at,
            is_breaking: false,
            likes,
            views,
            sources: vec![],
            title_tokens: vec![],
        }
    }

    #[test]
    fn test_score() {
        let now = Utc::now();
        let fresh = article("a", 0, 0, 0, now);
        assert!((trending_score(&fresh, now) - 1.0 / 2f64.powf(1.5)).abs() < 1e-9);

        let mut merged = article("b", 2, 10, 2, now);
        merged.sources = vec![
            SourceRef { name: "A".into(), url: "u1".into(), published_at: now },
            SourceRef { name: "B".into(), url: "u2".into(), published_at: now },
        ];
        // (10 + 6 + 5 + 1) / 4^1.5 = 22 / 8
        assert!((trending_score(&merged, now) - 2.75).abs() < 1e-9);

        merged.is_breaking = true;
        assert!((trending_score(&merged, now) - 4.125).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_and_limits() {
        let now = Utc::now();
        let ranked = rank(
            vec![
                article("old-popular", 40, 100, 0, now),
                article("fresh", 0, 5, 1, now),
                article("quiet", 10, 0, 0, now),
            ],
            now,
            2,
        );
        let ids: Vec<_> = ranked.iter().map(|t| t.article.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "old-popular"]);
    }

    #[test]
    fn test_ties_prefer_newer() {
        let now = Utc::now();
        let a = article("a", 1, 0, 0, now);
        let mut b = article("b", 1, 0, 0, now);
        b.published_at = a.published_at + Duration::seconds(1);
        let ranked = rank(vec![a, b], now, 10);
        assert_eq!(ranked[0].article.id, "b");
    }
}

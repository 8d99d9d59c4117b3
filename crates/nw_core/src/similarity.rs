use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Jaccard index of two token sets. Two empty sets score 0 so that empty
/// titles never count as duplicates.
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let a: HashSet<&str> = a.iter().map(|s| s.as_ref()).collect();
    let b: HashSet<&str> = b.iter().map(|s| s.as_ref()).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Minimum Jaccard score for two titles to be the same story.
    pub threshold: f64,
    /// How far back stored articles are considered.
    pub window_hours: i64,
    /// Upper bound on stored articles loaded into the window.
    pub window_limit: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            window_hours: 48,
            window_limit: 500,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MARKER: Regex = Regex::new(
        r"(?i)\b(breaking|just in|urgent|developing story|urgente|última hora|ultima hora|en vivo)\b|\blive:"
    )
    .unwrap();
}

/// Flags fresh articles whose headline or description carries a breaking marker.
#[derive(Debug, Clone)]
pub struct BreakingDetector {
    pub max_age: Duration,
}

impl Default for BreakingDetector {
    fn default() -> Self {
        Self::new(3)
    }
}

impl BreakingDetector {
    pub fn new(max_age_hours: i64) -> Self {
        Self {
            max_age: Duration::hours(max_age_hours),
        }
    }

    pub fn has_marker(text: &str) -> bool {
        MARKER.is_match(text)
    }

    pub fn is_breaking(
        &self,
        title: &str,
        description: Option<&str>,
        published_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let fresh = now - published_at <= self.max_age;
        fresh && (Self::has_marker(title) || description.map_or(false, Self::has_marker))
    }
}

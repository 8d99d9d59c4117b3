use serde::{Deserialize, Serialize};

pub mod breaking;
pub mod models;

pub use breaking::BreakingDetector;
pub use models::{create_classifier, ChatClassifier, KeywordClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    #[default]
    Keyword,
    Chat,
}

impl std::str::FromStr for ClassifierKind {
    type Err = nw_core::Error;

    fn from_str(s: &str) -> nw_core::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "keywords" => Ok(Self::Keyword),
            "chat" | "openai" | "ai" => Ok(Self::Chat),
            other => Err(nw_core::Error::Config(format!(
                "unknown classifier '{}' (available: keyword, chat)",
                other
            ))),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub kind: ClassifierKind,
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL, e.g. `https://api.openai.com/v1`
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

pub mod prelude {
    pub use super::models::create_classifier;
    pub use super::{BreakingDetector, ClassifierKind, InferenceConfig};
    pub use nw_core::{Category, Classifier, RawArticle, Result, Error};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_kind_parsing() {
        assert_eq!("keyword".parse::<ClassifierKind>().unwrap(), ClassifierKind::Keyword);
        assert_eq!("OpenAI".parse::<ClassifierKind>().unwrap(), ClassifierKind::Chat);
        assert!("ollama".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = InferenceConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

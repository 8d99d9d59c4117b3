use nw_core::{Classifier, Error, Result};
use std::sync::Arc;
use tracing::info;

use crate::{ClassifierKind, InferenceConfig};

pub mod chat;
pub mod keyword;

pub use chat::ChatClassifier;
pub use keyword::KeywordClassifier;

pub fn create_classifier(config: &InferenceConfig) -> Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match config.kind {
        ClassifierKind::Keyword => Arc::new(KeywordClassifier::new()),
        ClassifierKind::Chat => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| Error::Config("the chat classifier requires an API key".to_string()))?;
            Arc::new(ChatClassifier::new(
                api_key,
                config.base_url.clone(),
                config.model.clone(),
            )?)
        }
    };
    info!("🧠 Classifier initialized (using {})", classifier.name());
    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_classifier() {
        let classifier = create_classifier(&InferenceConfig::default()).unwrap();
        assert_eq!(classifier.name(), "keyword");

        let config = InferenceConfig {
            kind: ClassifierKind::Chat,
            ..Default::default()
        };
        assert!(create_classifier(&config).is_err());

        let config = InferenceConfig {
            kind: ClassifierKind::Chat,
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        assert_eq!(create_classifier(&config).unwrap().name(), "chat");
    }
}

use async_trait::async_trait;
use nw_core::{Category, Classifier, Error, RawArticle, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::KeywordClassifier;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

/// Classifies through an OpenAI-compatible chat completions endpoint and
/// falls back to keywords whenever the call or the reply is unusable.
pub struct ChatClassifier {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    fallback: KeywordClassifier,
}

impl ChatClassifier {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("chat classifier API key is empty".to_string()));
        }
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            fallback: KeywordClassifier::new(),
        })
    }

    fn prompt(article: &RawArticle) -> String {
        let categories = Category::ALL
            .iter()
            .map(|c| c.slug())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Classify this news article into exactly one of: {}.\nReply with the category word only.\n\nTitle: {}\nDescription: {}",
            categories,
            article.title,
            article.description.as_deref().unwrap_or("")
        )
    }

    async fn request_category(&self, article: &RawArticle) -> Result<Category> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::prompt(article),
            }],
            temperature: 0.0,
            max_tokens: 5,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let response = response.json::<ChatResponse>().await?;
        let reply = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::Inference("empty completion".to_string()))?;
        parse_category_reply(reply)
            .ok_or_else(|| Error::Inference(format!("unrecognised category reply: {}", reply)))
    }
}

/// Takes the first word of a model reply and maps it onto a category.
pub fn parse_category_reply(reply: &str) -> Option<Category> {
    reply
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .and_then(Category::from_alias)
}

impl fmt::Debug for ChatClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClassifier")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Classifier for ChatClassifier {
    fn name(&self) -> &str {
        "chat"
    }

    async fn classify(&self, article: &RawArticle) -> Category {
        match self.request_category(article).await {
            Ok(category) => {
                debug!("Chat classifier put '{}' in {}", article.title, category);
                category
            }
            Err(e) => {
                warn!("Chat classification failed for '{}', using keywords: {}", article.title, e);
                self.fallback.classify_sync(article)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_core::Language;

    #[test]
    fn test_classifier_requires_api_key() {
        assert!(ChatClassifier::new("  ".to_string(), None, None).is_err());
        let classifier = ChatClassifier::new("test-key".to_string(), Some("http://localhost:1/v1/".to_string()), None).unwrap();
        assert_eq!(classifier.base_url, "http://localhost:1/v1");
        assert_eq!(classifier.model, DEFAULT_MODEL);
        assert!(!format!("{:?}", classifier).contains("test-key"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back_to_keywords() {
        let classifier = ChatClassifier::new(
            "test-key".to_string(),
            Some("http://127.0.0.1:9/v1".to_string()),
            None,
        )
        .unwrap();
        let article = RawArticle {
            url: "http://test.com".to_string(),
            title: "Senate passes election bill".to_string(),
            description: None,
            content: None,
            image_url: None,
            source: "test".to_string(),
            published_at: None,
            category_hint: None,
            language: Language::En,
        };
        assert!(classifier.request_category(&article).await.is_err());
        assert_eq!(classifier.classify(&article).await, Category::Politics);
    }

    #[test]
    fn test_parse_category_reply() {
        assert_eq!(parse_category_reply("Sports"), Some(Category::Sports));
        assert_eq!(parse_category_reply(" technology.\n"), Some(Category::Technology));
        assert_eq!(parse_category_reply("\"politics\" is my answer"), Some(Category::Politics));
        assert_eq!(parse_category_reply("I am not sure"), None);
        assert_eq!(parse_category_reply(""), None);
    }

    #[test]
    fn test_prompt_lists_categories() {
        let article = RawArticle {
            url: "http://test.com".to_string(),
            title: "Senate passes bill".to_string(),
            description: None,
            content: None,
            image_url: None,
            source: "test".to_string(),
            published_at: None,
            category_hint: None,
            language: Language::En,
        };
        let prompt = ChatClassifier::prompt(&article);
        assert!(prompt.contains("entertainment"));
        assert!(prompt.contains("Senate passes bill"));
    }
}

use async_trait::async_trait;
use nw_core::text::title_tokens;
use nw_core::{Category, Classifier, RawArticle};

/// Checked in order; earlier tables win ties.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Politics,
        &[
            "election", "elections", "senate", "congress", "president", "parliament", "minister",
            "vote", "voters", "campaign", "democrats", "republicans", "governor", "lawmakers",
            "eleccion", "elecciones", "senado", "congreso", "presidente", "diputados", "ministro",
            "gobierno", "oposicion", "campana",
        ],
    ),
    (
        Category::Business,
        &[
            "market", "markets", "stocks", "economy", "inflation", "bank", "rates", "earnings",
            "shares", "investors", "tariffs", "gdp", "fed", "mercado", "mercados", "economia",
            "inflacion", "dolar", "banco", "acciones", "empresas", "bolsa", "tasa",
        ],
    ),
    (
        Category::Technology,
        &[
            "ai", "tech", "software", "apple", "google", "microsoft", "openai", "startup", "chip",
            "chips", "iphone", "app", "cyber", "hackers", "robot", "tecnologia", "inteligencia",
            "artificial", "aplicacion",
        ],
    ),
    (
        Category::Science,
        &[
            "science", "study", "researchers", "space", "nasa", "climate", "scientists", "planet",
            "species", "telescope", "ciencia", "estudio", "cientificos", "espacio", "clima",
        ],
    ),
    (
        Category::Health,
        &[
            "health", "covid", "virus", "vaccine", "hospital", "disease", "cancer", "medical",
            "outbreak", "salud", "vacuna", "enfermedad", "medicos", "dengue",
        ],
    ),
    (
        Category::Sports,
        &[
            "game", "match", "league", "cup", "football", "soccer", "nba", "nfl", "championship",
            "coach", "tournament", "olympics", "futbol", "partido", "liga", "copa", "torneo",
            "seleccion", "goles", "mundial", "boca", "river",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "film", "movie", "music", "celebrity", "album", "actor", "actress", "netflix",
            "oscar", "oscars", "concert", "series", "pelicula", "musica", "cine", "serie",
            "concierto",
        ],
    ),
    (
        Category::World,
        &[
            "war", "ukraine", "russia", "china", "gaza", "israel", "nato", "embassy", "refugees",
            "guerra", "ucrania", "rusia", "onu", "embajada",
        ],
    ),
];

#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_sync(&self, article: &RawArticle) -> Category {
        if let Some(hint) = article
            .category_hint
            .as_deref()
            .and_then(Category::from_alias)
            .filter(|c| *c != Category::General)
        {
            return hint;
        }

        let title = title_tokens(&article.title, article.language);
        let description = article
            .description
            .as_deref()
            .map(|d| title_tokens(d, article.language))
            .unwrap_or_default();

        let mut best = (Category::General, 0usize);
        for (category, words) in KEYWORDS {
            let score = title.iter().filter(|t| words.contains(&t.as_str())).count() * 2
                + description.iter().filter(|t| words.contains(&t.as_str())).count();
            if score > best.1 {
                best = (*category, score);
            }
        }
        best.0
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, article: &RawArticle) -> Category {
        self.classify_sync(article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_core::Language;

    fn raw(title: &str, description: Option<&str>, hint: Option<&str>, language: Language) -> RawArticle {
        RawArticle {
            url: "http://test.com".to_string(),
            title: title.to_string(),
            description: description.map(str::to_string),
            content: None,
            image_url: None,
            source: "test".to_string(),
            published_at: None,
            category_hint: hint.map(str::to_string),
            language,
        }
    }

    #[tokio::test]
    async fn test_keyword_classifier() {
        let classifier = KeywordClassifier::new();

        let article = raw("Senate passes election bill", None, None, Language::En);
        assert_eq!(classifier.classify(&article).await, Category::Politics);

        let article = raw("Boca gana el partido de la copa", None, None, Language::Es);
        assert_eq!(classifier.classify(&article).await, Category::Sports);

        let article = raw("A quiet afternoon", Some("Nothing happened"), None, Language::En);
        assert_eq!(classifier.classify(&article).await, Category::General);
    }

    #[test]
    fn test_hint_wins_unless_general() {
        let classifier = KeywordClassifier::new();
        let article = raw("Senate passes election bill", None, Some("sports"), Language::En);
        assert_eq!(classifier.classify_sync(&article), Category::Sports);

        let article = raw("Senate passes election bill", None, Some("general"), Language::En);
        assert_eq!(classifier.classify_sync(&article), Category::Politics);
    }

    #[test]
    fn test_title_outweighs_description() {
        let classifier = KeywordClassifier::new();
        let article = raw(
            "New vaccine approved",
            Some("Shares of the maker rose"),
            None,
            Language::En,
        );
        assert_eq!(classifier.classify_sync(&article), Category::Health);
    }
}

//! Text cleanup shared by the sources and the dedup stage.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::Language;

lazy_static! {
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref TRUNCATION: Regex = Regex::new(r"\[\+\d+\s*chars\]").unwrap();
    static ref NUMERIC_ENTITY: Regex = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref SOURCE_SUFFIX: Regex = Regex::new(r"^(.*\S)\s+[-|–—]\s+([^-|–—]{2,60})$").unwrap();
}

const EN_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "he", "her",
    "his", "in", "is", "it", "its", "of", "on", "or", "says", "she", "that", "the", "their",
    "they", "this", "to", "was", "were", "will", "with", "after", "over", "new", "amid", "into",
    "about", "up", "out", "more", "than", "who", "what", "how", "why", "we", "you",
];

const ES_STOPWORDS: &[&str] = &[
    "a", "al", "como", "con", "de", "del", "el", "en", "es", "la", "las", "lo", "los", "mas",
    "para", "por", "que", "se", "sin", "sobre", "su", "sus", "un", "una", "uno", "y", "ya", "tras",
    "ante", "entre", "hasta", "le", "les", "pero", "fue", "son", "esta", "este", "esto", "dijo",
];

fn stopwords(language: Language) -> &'static [&'static str] {
    match language {
        Language::En => EN_STOPWORDS,
        Language::Es => ES_STOPWORDS,
    }
}

pub fn decode_entities(input: &str) -> String {
    let named = input
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&hellip;", "…")
        .replace("&mdash;", "—")
        .replace("&ndash;", "–");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = match body.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => body.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_default()
    });
    // Ampersand last so that "&amp;lt;" decodes to "&lt;" and not "<".
    numeric.replace("&amp;", "&")
}

/// Drops markup, decodes entities, removes truncation markers such as
/// `[+1234 chars]` and collapses whitespace.
pub fn clean_text(input: &str) -> String {
    let without_tags = TAG.replace_all(input, " ");
    let decoded = decode_entities(&without_tags);
    let without_markers = TRUNCATION.replace_all(&decoded, " ");
    WHITESPACE.replace_all(&without_markers, " ").trim().to_string()
}

/// Cuts `input` to at most `max_chars` characters, preferring a sentence end
/// that keeps at least half the budget, then a word boundary.
pub fn trim_summary(input: &str, max_chars: usize) -> String {
    let input = input.trim();
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= max_chars {
        return input.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let cut = &chars[..max_chars - 1];
    let sentence_end = cut
        .iter()
        .rposition(|c| matches!(c, '.' | '!' | '?'))
        .filter(|&i| i + 1 >= max_chars / 2);
    if let Some(end) = sentence_end {
        return cut[..=end].iter().collect();
    }

    let word_end = cut.iter().rposition(|c| c.is_whitespace()).unwrap_or(cut.len());
    let mut out: String = cut[..word_end].iter().collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Normalized, sorted, unique title tokens used for near-duplicate matching.
pub fn title_tokens(title: &str, language: Language) -> Vec<String> {
    let stop = stopwords(language);
    let folded: String = title.to_lowercase().chars().map(fold_diacritic).collect();
    let mut tokens: Vec<String> = folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !stop.contains(t))
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Drops a trailing " - Outlet" or " | Outlet" suffix that aggregators append
/// to headlines. Kept when the remaining headline would be shorter than three
/// words or the suffix is longer than four.
pub fn strip_source_suffix(title: &str) -> String {
    let title = title.trim();
    if let Some(caps) = SOURCE_SUFFIX.captures(title) {
        let head = caps[1].trim();
        let suffix = caps[2].trim();
        if head.split_whitespace().count() >= 3 && suffix.split_whitespace().count() <= 4 {
            return head.to_string();
        }
    }
    title.to_string()
}

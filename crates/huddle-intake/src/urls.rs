//! Generic URL extraction for fire-and-forget KB ingest (spec.md §4.3 step 3).

use regex::Regex;
use std::sync::OnceLock;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"']+"#).expect("URL pattern is always valid")
    })
}

/// Extract every `http(s)://` URL in `content`, trimming common trailing
/// punctuation that isn't part of the URL (closing parens, sentence-ending
/// punctuation).
pub fn extract_urls(content: &str) -> Vec<String> {
    url_regex()
        .find_iter(content)
        .map(|m| trim_trailing_punctuation(m.as_str()).to_string())
        .collect()
}

fn trim_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ')' | ']' | '"' | '\''))
}

/// Whether `content` looks like a question, for the optional KB-context
/// prepend (spec.md §4.3 step 5).
pub fn looks_like_question(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.ends_with('?') {
        return true;
    }
    const INTERROGATIVES: &[&str] = &[
        "who", "what", "when", "where", "why", "how", "which", "whose", "can", "could", "is",
        "are", "do", "does", "did", "will", "would", "should",
    ];
    trimmed
        .split_whitespace()
        .next()
        .map(|first| INTERROGATIVES.contains(&first.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_url() {
        let urls = extract_urls("check this out https://example.com/a/b");
        assert_eq!(urls, vec!["https://example.com/a/b"]);
    }

    #[test]
    fn extracts_multiple_urls_and_trims_punctuation() {
        let urls = extract_urls("see (https://a.com/x) and https://b.com/y.");
        assert_eq!(urls, vec!["https://a.com/x", "https://b.com/y"]);
    }

    #[test]
    fn no_urls_returns_empty() {
        assert!(extract_urls("no links here").is_empty());
    }

    #[test]
    fn question_mark_is_a_question() {
        assert!(looks_like_question("is this working?"));
    }

    #[test]
    fn interrogative_prefix_is_a_question() {
        assert!(looks_like_question("How do I configure this"));
    }

    #[test]
    fn statement_is_not_a_question() {
        assert!(!looks_like_question("The build passed."));
    }
}

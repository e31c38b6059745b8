use docscout_core::models::Document;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum tokens to use for embedding (BERT limit)
pub const MAX_TOKENS: usize = 512;

/// Words of body text kept after the summary
const CONTENT_EXCERPT_WORDS: usize = 300;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static MARKUP_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[#*`\[\]()_~<>|]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Preprocess a document into text suitable for embedding
pub fn preprocess_document(doc: &Document) -> String {
    let mut parts = Vec::new();

    // Title carries the most signal
    if !doc.title.is_empty() {
        parts.push(clean_text(&doc.title));
    }

    if let Some(summary) = &doc.summary {
        if !summary.is_empty() {
            parts.push(clean_text(summary));
        }
    }

    if let Some(content) = &doc.content {
        let excerpt = truncate_to_tokens(content, CONTENT_EXCERPT_WORDS);
        if !excerpt.is_empty() {
            parts.push(clean_text(&excerpt));
        }
    }

    if !doc.categories.is_empty() {
        parts.push(doc.categories.join(" "));
    }

    let combined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    truncate_to_tokens(&combined, MAX_TOKENS)
}

/// Preprocess a search query
pub fn preprocess_query(query: &str) -> String {
    let cleaned = clean_text(query);
    truncate_to_tokens(&cleaned, MAX_TOKENS)
}

/// Strip URLs and markup, normalize whitespace
///
/// Case and punctuation are kept; sentence encoders use both.
pub fn clean_text(text: &str) -> String {
    let text = URL_PATTERN.replace_all(text, "");
    let text = MARKUP_PATTERN.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Truncate text to approximately N tokens
/// This is a simple word-based approximation (1 token ~= 1 word for English)
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.len() <= max_tokens {
        return words.join(" ");
    }

    words[..max_tokens].join(" ")
}

/// Word-set Jaccard similarity
pub fn calculate_text_similarity(text1: &str, text2: &str) -> f32 {
    let words1: std::collections::HashSet<&str> = text1.split_whitespace().collect();
    let words2: std::collections::HashSet<&str> = text2.split_whitespace().collect();

    if words1.is_empty() && words2.is_empty() {
        return 1.0;
    }

    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();

    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_core::models::SourceKind;

    #[test]
    fn test_clean_text() {
        let input = "A **bold** claim, see [link](http://example.com) and `code`.";
        let output = clean_text(input);
        assert!(!output.contains('*'));
        assert!(!output.contains('['));
        assert!(!output.contains("http"));
        assert!(output.contains("bold claim,"));
        assert!(!output.contains("  "));
    }

    #[test]
    fn test_preprocess_document_order_and_limits() {
        let content = (0..1000).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let mut doc = Document::new(SourceKind::Feed, "id", "Title here")
            .with_summary("Short summary.")
            .with_content(content);
        doc.categories = vec!["science".into()];

        let text = preprocess_document(&doc);
        assert!(text.starts_with("Title here Short summary. w0 w1"));
        assert!(text.ends_with("science"));
        assert!(text.split_whitespace().count() <= MAX_TOKENS);
        assert!(!text.contains("w300"));
    }

    #[test]
    fn test_truncate_to_tokens() {
        let text = (0..1000).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let truncated = truncate_to_tokens(&text, 100);
        assert_eq!(truncated.split_whitespace().count(), 100);
    }

    #[test]
    fn test_calculate_text_similarity() {
        let similarity = calculate_text_similarity("rust web framework", "rust web server framework");
        assert!(similarity > 0.5);

        let similarity2 = calculate_text_similarity("rust web framework", "completely different words");
        assert!(similarity2 < 0.3);
    }
}

//! BM25 scoring for keyword-based retrieval
//!
//! Implements the Okapi BM25 ranking function over a fixed corpus. Term
//! statistics are computed once, so ranking many queries against the same
//! documents only tokenizes the query.

use docscout_core::models::Document;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "if",
        "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "such", "that", "the",
        "their", "then", "there", "these", "they", "this", "to", "was", "were", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// BM25 scoring parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Document length normalization
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// BM25 scorer over a fixed corpus
pub struct BM25Scorer {
    params: Bm25Params,
    /// Term frequencies for each document, in corpus order
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    /// Number of documents containing each term
    doc_frequencies: HashMap<String, usize>,
    avg_doc_len: f32,
}

impl BM25Scorer {
    /// Create a scorer from a collection of documents
    pub fn new(docs: &[Document]) -> Self {
        let texts: Vec<String> = docs.iter().map(Document::searchable_text).collect();
        Self::from_texts(&texts)
    }

    /// Create a scorer from raw texts
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::with_params(texts, Bm25Params::default())
    }

    pub fn with_params<S: AsRef<str>>(texts: &[S], params: Bm25Params) -> Self {
        let mut term_freqs = Vec::with_capacity(texts.len());
        let mut doc_lens = Vec::with_capacity(texts.len());
        let mut doc_frequencies: HashMap<String, usize> = HashMap::new();
        let mut total_length = 0usize;

        for text in texts {
            let tokens = tokenize(text.as_ref());
            total_length += tokens.len();
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_frequencies.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let avg_doc_len = if total_length > 0 {
            total_length as f32 / texts.len() as f32
        } else {
            1.0
        };

        Self {
            params,
            term_freqs,
            doc_lens,
            doc_frequencies,
            avg_doc_len,
        }
    }

    /// Number of documents in the corpus
    pub fn len(&self) -> usize {
        self.term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.term_freqs.is_empty()
    }

    /// Inverse document frequency, never negative
    pub fn idf(&self, term: &str) -> f32 {
        let total = self.len() as f32;
        let n = *self.doc_frequencies.get(term).unwrap_or(&0) as f32;
        ((total - n + 0.5) / (n + 0.5) + 1.0).ln()
    }

    /// Score the document at `index` against a query
    pub fn score_index(&self, index: usize, query: &str) -> f32 {
        self.score_tokens(index, &tokenize(query))
    }

    fn score_tokens(&self, index: usize, query_tokens: &[String]) -> f32 {
        let (Some(freqs), Some(&doc_len)) = (self.term_freqs.get(index), self.doc_lens.get(index))
        else {
            return 0.0;
        };

        if doc_len == 0 || query_tokens.is_empty() {
            return 0.0;
        }

        let Bm25Params { k1, b } = self.params;
        let doc_len = doc_len as f32;
        let mut score = 0.0;

        for term in query_tokens {
            let freq = *freqs.get(term).unwrap_or(&0) as f32;
            if freq == 0.0 {
                continue;
            }

            let numerator = freq * (k1 + 1.0);
            let denominator = freq + k1 * (1.0 - b + b * doc_len / self.avg_doc_len);

            score += self.idf(term) * (numerator / denominator);
        }

        score
    }

    /// Score any document against a query using this corpus' statistics
    pub fn score(&self, doc: &Document, query: &str) -> f32 {
        let single = Self::with_params(&[doc.searchable_text()], self.params);
        let query_tokens = tokenize(query);
        let Some(freqs) = single.term_freqs.first() else {
            return 0.0;
        };

        let doc_len = single.doc_lens[0] as f32;
        if doc_len == 0.0 || query_tokens.is_empty() {
            return 0.0;
        }

        let Bm25Params { k1, b } = self.params;
        query_tokens
            .iter()
            .filter_map(|term| freqs.get(term).map(|&f| (term, f as f32)))
            .map(|(term, freq)| {
                let denominator = freq + k1 * (1.0 - b + b * doc_len / self.avg_doc_len);
                self.idf(term) * (freq * (k1 + 1.0) / denominator)
            })
            .sum()
    }

    /// Scores for every document, in corpus order
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let query_tokens = tokenize(query);
        (0..self.len())
            .map(|i| self.score_tokens(i, &query_tokens))
            .collect()
    }

    /// `(index, score)` pairs, best first; ties keep corpus order
    pub fn rank(&self, query: &str) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self.scores(query).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Score documents of this corpus and return them sorted
    pub fn score_all(&self, docs: &[Document], query: &str) -> Vec<(Document, f32)> {
        self.rank(query)
            .into_iter()
            .filter_map(|(i, score)| docs.get(i).map(|doc| (doc.clone(), score)))
            .collect()
    }
}

/// Tokenize text into lowercase terms, dropping stop words and single characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() > 1 && !STOP_WORDS.contains(s))
        .map(|s| s.to_string())
        .collect()
}

/// Score keyword results using BM25
///
/// Builds the corpus from `docs` themselves, then ranks them against the query
pub fn score_keyword_results(docs: Vec<Document>, query: &str) -> Vec<(Document, f32)> {
    if docs.is_empty() {
        return Vec::new();
    }

    let scorer = BM25Scorer::new(&docs);
    scorer.score_all(&docs, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_core::models::SourceKind;

    fn create_test_doc(id: &str, title: &str, summary: &str) -> Document {
        Document::new(SourceKind::Arxiv, id, title).with_summary(summary)
    }

    #[test]
    fn test_bm25_basic_scoring() {
        let docs = vec![
            create_test_doc("1", "Logging at scale", "A logging pipeline for distributed systems"),
            create_test_doc("2", "Web servers", "A fast web server framework"),
            create_test_doc("3", "Log parsing", "Parse log files efficiently"),
        ];

        let scorer = BM25Scorer::new(&docs);

        let score1 = scorer.score_index(0, "logging");
        let score2 = scorer.score_index(1, "logging");
        let score3 = scorer.score_index(2, "logging");

        assert!(score1 > score2);
        assert!(score1 > score3);
        assert_eq!(score2, 0.0);
    }

    #[test]
    fn test_bm25_multi_term_query() {
        let docs = vec![
            create_test_doc("1", "Graph neural networks", "Message passing on graphs"),
            create_test_doc("2", "Neural machine translation", "Attention based translation"),
            create_test_doc("3", "Graph databases", "Storing property graphs"),
        ];

        let results = score_keyword_results(docs, "neural graph");
        assert_eq!(results[0].0.id, "1");
    }

    #[test]
    fn test_score_matches_score_index_for_corpus_docs() {
        let docs = vec![
            create_test_doc("1", "Sentence embeddings", "Siamese BERT networks"),
            create_test_doc("2", "Topic models", "Latent Dirichlet allocation"),
        ];
        let scorer = BM25Scorer::new(&docs);

        let a = scorer.score(&docs[0], "bert embeddings");
        let b = scorer.score_index(0, "bert embeddings");
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_idf_never_negative() {
        // A term present in every document still has positive weight
        let scorer = BM25Scorer::from_texts(&["common rare", "common", "common"]);
        assert!(scorer.idf("common") > 0.0);
        assert!(scorer.idf("rare") > scorer.idf("common"));
        assert!(scorer.idf("absent") > scorer.idf("rare"));
    }

    #[test]
    fn test_rank_ties_keep_order() {
        let scorer = BM25Scorer::from_texts(&["apple pie", "banana split", "apple pie"]);
        let ranked = scorer.rank("apple");
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_empty_inputs() {
        let scorer = BM25Scorer::from_texts::<&str>(&[]);
        assert!(scorer.rank("anything").is_empty());

        let scorer = BM25Scorer::from_texts(&["some text", "more text"]);
        assert_eq!(scorer.scores(""), vec![0.0, 0.0]);
        assert_eq!(scorer.scores("the of and"), vec![0.0, 0.0]);
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("Hello, World! This is a test-string");
        assert_eq!(tokens, vec!["hello", "world", "test", "string"]);
    }
}

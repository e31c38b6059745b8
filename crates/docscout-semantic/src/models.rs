use chrono::{DateTime, Utc};
use docscout_core::models::{Document, ScoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Embedding entry for a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    /// Document identifier (`source:id`)
    pub doc_id: String,

    /// Embedding vector; persisted by the vector index, not the metadata
    #[serde(skip)]
    pub vector: Vec<f32>,

    pub generated_at: DateTime<Utc>,

    /// Source text that was embedded
    pub source_text: String,

    /// Text hash to detect changes
    pub text_hash: u64,
}

impl EmbeddingEntry {
    pub fn new(doc_id: String, vector: Vec<f32>, source_text: String) -> Self {
        let text_hash = hash_text(&source_text);

        Self {
            doc_id,
            vector,
            generated_at: Utc::now(),
            source_text,
            text_hash,
        }
    }

    /// Check if the source text has changed
    pub fn text_changed(&self, new_text: &str) -> bool {
        hash_text(new_text) != self.text_hash
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Semantic search result with scores
#[derive(Debug, Clone)]
pub struct SemanticSearchResult {
    pub document: Document,

    /// Cosine similarity
    pub semantic_score: f32,

    /// Max-normalized BM25 score, hybrid search only
    pub keyword_score: Option<f32>,

    /// Score results are ordered by
    pub hybrid_score: f32,

    /// Cosine distance (lower is better)
    pub distance: f32,
}

impl SemanticSearchResult {
    pub fn semantic_only(document: Document, semantic_score: f32) -> Self {
        Self {
            document,
            semantic_score,
            keyword_score: None,
            hybrid_score: semantic_score,
            distance: 1.0 - semantic_score,
        }
    }

    /// Weighted blend: `w * semantic + (1 - w) * keyword`
    pub fn hybrid(
        document: Document,
        semantic_score: f32,
        keyword_score: f32,
        semantic_weight: f32,
    ) -> Self {
        let hybrid_score =
            (semantic_score * semantic_weight) + (keyword_score * (1.0 - semantic_weight));

        Self {
            document,
            semantic_score,
            keyword_score: Some(keyword_score),
            hybrid_score,
            distance: 1.0 - semantic_score,
        }
    }

    pub fn into_scored(self) -> ScoredDocument {
        ScoredDocument::new(self.document, self.hybrid_score)
    }
}

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_documents: usize,

    /// Index size on disk in bytes, as of the last save
    pub index_size_bytes: u64,

    pub last_updated: DateTime<Utc>,

    pub model_name: String,

    pub dimension: usize,

    pub created_at: DateTime<Utc>,
}

impl IndexStats {
    pub fn new(model_name: String, dimension: usize) -> Self {
        Self {
            total_documents: 0,
            index_size_bytes: 0,
            last_updated: Utc::now(),
            model_name,
            dimension,
            created_at: Utc::now(),
        }
    }

    /// Update stats after indexing
    pub fn update(&mut self, doc_count: usize, size_bytes: u64) {
        self.total_documents = doc_count;
        self.index_size_bytes = size_bytes;
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_core::models::SourceKind;

    #[test]
    fn test_text_changed() {
        let entry = EmbeddingEntry::new("feed:a".into(), vec![0.1], "original text".into());
        assert!(!entry.text_changed("original text"));
        assert!(entry.text_changed("edited text"));
    }

    #[test]
    fn test_hybrid_blend() {
        let doc = Document::new(SourceKind::Arxiv, "1", "t");
        let result = SemanticSearchResult::hybrid(doc, 0.5, 1.0, 0.6);
        assert!((result.hybrid_score - 0.8).abs() < 1e-6);
        assert!((result.distance - 0.5).abs() < 1e-6);
        assert!((result.into_scored().score - 0.8).abs() < 1e-6);
    }
}

// Keyword and semantic retrieval for DocScout
//
// BM25 ranking over fetched candidates, sentence embeddings via fastembed,
// and a persistent usearch index for semantic and hybrid search.

pub mod bm25;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod models;
pub mod preprocessing;
pub mod search;

pub use bm25::{score_keyword_results, BM25Scorer, Bm25Params};
pub use embeddings::{cosine_similarity, Embedder, EmbeddingGenerator};
pub use error::{Result, SemanticError};
pub use index::VectorIndex;
pub use models::{EmbeddingEntry, IndexStats, SemanticSearchResult};
pub use preprocessing::{preprocess_document, preprocess_query};
pub use search::{rank_by_similarity, SemanticSearchEngine};

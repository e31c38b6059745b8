use crate::embeddings::{cosine_similarity, Embedder, EmbeddingGenerator};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{EmbeddingEntry, IndexStats, SemanticSearchResult};
use crate::preprocessing::preprocess_document;
use docscout_core::config::SemanticSettings;
use docscout_core::models::{sort_by_score_desc, Document, ScoredDocument};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Semantic search engine over a persistent vector index
pub struct SemanticSearchEngine {
    embedder: Arc<dyn Embedder>,

    index: Arc<RwLock<VectorIndex>>,

    settings: SemanticSettings,

    /// Documents seen this session, by `doc_id`
    documents: Arc<RwLock<HashMap<String, Document>>>,
}

impl SemanticSearchEngine {
    /// Engine backed by a fastembed model, reusing the saved index if there is one
    pub fn new(settings: SemanticSettings) -> Result<Self> {
        let embedder = Arc::new(EmbeddingGenerator::new(settings.model.clone()));
        Self::with_embedder(embedder, settings)
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>, settings: SemanticSettings) -> Result<Self> {
        let index_path = settings.index_path.clone();

        let index = match VectorIndex::load(index_path.clone(), embedder.dimension()) {
            Ok(idx) if idx.stats().model_name == embedder.model_name() => {
                info!("Loaded existing semantic index");
                idx
            }
            Ok(_) => {
                warn!("Saved index was built with another model, starting fresh");
                VectorIndex::new(embedder.dimension(), embedder.model_name().to_string(), index_path)?
            }
            Err(e) => {
                debug!("Could not load existing index: {}. Creating new one.", e);
                VectorIndex::new(embedder.dimension(), embedder.model_name().to_string(), index_path)?
            }
        };

        Ok(Self {
            embedder,
            index: Arc::new(RwLock::new(index)),
            settings,
            documents: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Embed and index documents, skipping ones whose text hasn't changed
    pub async fn index_documents(&self, docs: &[Document]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let stale: Vec<Document> = {
            let index = self.index.read().await;
            docs.iter()
                .filter(|doc| match index.get_metadata(&doc.doc_id()) {
                    Some(entry) => entry.text_changed(&preprocess_document(doc)),
                    None => true,
                })
                .cloned()
                .collect()
        };

        {
            let mut cache = self.documents.write().await;
            for doc in docs {
                cache.insert(doc.doc_id(), doc.clone());
            }
        }

        if stale.is_empty() {
            debug!("All {} documents already indexed", docs.len());
            return Ok(0);
        }

        info!("Generating embeddings for {} documents", stale.len());
        let entries = self.embedder.embed_documents(&stale).await?;
        let count = entries.len();

        self.index.write().await.add_batch(entries)?;
        info!("Indexed {} documents", count);

        Ok(count)
    }

    /// Semantic search over the documents loaded this session
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SemanticSearchResult>> {
        debug!("Semantic search query: {}", query);

        let query_vector = self.embedder.embed_query(query).await?;
        // Entries saved by earlier runs have no document; look past them
        let raw_results = {
            let index = self.index.read().await;
            index.search(&query_vector, index.len())?
        };

        let cache = self.documents.read().await;
        let mut results = Vec::new();

        for (doc_id, similarity) in raw_results {
            if similarity < self.settings.min_similarity {
                continue;
            }
            match cache.get(&doc_id) {
                Some(doc) => results.push(SemanticSearchResult::semantic_only(doc.clone(), similarity)),
                None => debug!("Document {} not loaded this session", doc_id),
            }
        }

        results.sort_by(|a, b| b.semantic_score.total_cmp(&a.semantic_score));
        results.truncate(limit);

        Ok(results)
    }

    /// Blend BM25 and cosine scores for a set of keyword results
    ///
    /// Keyword scores are divided by the best keyword score so both sides
    /// are on a comparable scale before weighting. Cosine scores are taken
    /// directly against the documents loaded this session.
    pub async fn hybrid_search(
        &self,
        query: &str,
        keyword_results: Vec<(Document, f32)>,
        limit: usize,
    ) -> Result<Vec<SemanticSearchResult>> {
        debug!("Hybrid search query: {}", query);

        let mut seen = HashSet::new();
        let keyword_results: Vec<(Document, f32)> = keyword_results
            .into_iter()
            .filter(|(doc, _)| seen.insert(doc.doc_id()))
            .collect();

        let mut candidates: Vec<Document> =
            keyword_results.iter().map(|(doc, _)| doc.clone()).collect();
        {
            let mut session = self.documents.write().await;
            for doc in &candidates {
                session.insert(doc.doc_id(), doc.clone());
            }

            // Semantic-only candidates: loaded this session, missed by BM25
            let mut extras: Vec<&Document> = session
                .iter()
                .filter(|(doc_id, _)| !seen.contains(*doc_id))
                .map(|(_, doc)| doc)
                .collect();
            extras.sort_by_key(|doc| doc.doc_id());
            candidates.extend(extras.into_iter().cloned());
        }

        let query_vector = self.embedder.embed_query(query).await?;
        let entries = self.embedder.embed_documents(&candidates).await?;

        let similarities: HashMap<String, f32> = entries
            .iter()
            .map(|e| (e.doc_id.clone(), cosine_similarity(&query_vector, &e.vector)))
            .collect();
        self.store_entries(entries).await?;

        let max_keyword_score = keyword_results
            .iter()
            .map(|(_, score)| *score)
            .fold(0.0f32, f32::max);

        let keyword_count = keyword_results.len();
        let mut hybrid_results = Vec::with_capacity(candidates.len());

        for (doc, score) in keyword_results {
            let keyword_score = if max_keyword_score > 0.0 {
                score / max_keyword_score
            } else {
                0.0
            };
            let semantic_score = similarities.get(&doc.doc_id()).copied().unwrap_or(0.0);
            hybrid_results.push(SemanticSearchResult::hybrid(
                doc,
                semantic_score,
                keyword_score,
                self.settings.semantic_weight,
            ));
        }

        for doc in candidates.into_iter().skip(keyword_count) {
            let semantic_score = similarities.get(&doc.doc_id()).copied().unwrap_or(0.0);
            if semantic_score > 0.0 && semantic_score >= self.settings.min_similarity {
                hybrid_results.push(SemanticSearchResult::hybrid(
                    doc,
                    semantic_score,
                    0.0,
                    self.settings.semantic_weight,
                ));
            }
        }

        hybrid_results.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        hybrid_results.truncate(limit);

        debug!("Hybrid search returned {} results", hybrid_results.len());

        Ok(hybrid_results)
    }

    /// Add new or changed entries to the index
    async fn store_entries(&self, entries: Vec<EmbeddingEntry>) -> Result<()> {
        let mut index = self.index.write().await;
        let fresh: Vec<EmbeddingEntry> = entries
            .into_iter()
            .filter(|entry| match index.get_metadata(&entry.doc_id) {
                Some(old) => old.text_hash != entry.text_hash,
                None => true,
            })
            .collect();

        if !fresh.is_empty() {
            debug!("Indexing {} new or changed documents", fresh.len());
            index.add_batch(fresh)?;
        }
        Ok(())
    }

    pub async fn is_indexed(&self, doc_id: &str) -> bool {
        self.index.read().await.contains(doc_id)
    }

    pub async fn remove_document(&self, doc_id: &str) -> Result<()> {
        self.index.write().await.remove(doc_id)?;
        self.documents.write().await.remove(doc_id);
        Ok(())
    }

    pub async fn stats(&self) -> IndexStats {
        self.index.read().await.stats().clone()
    }

    pub async fn indexed_count(&self) -> usize {
        self.index.read().await.len()
    }

    /// Save the index to disk
    pub async fn save(&self) -> Result<()> {
        self.index.write().await.save()
    }

    /// Clear the entire index
    pub async fn clear(&self) -> Result<()> {
        self.index.write().await.clear()?;
        self.documents.write().await.clear();
        Ok(())
    }

    /// Rebuild the index from scratch and save it
    pub async fn rebuild(&self, docs: &[Document]) -> Result<usize> {
        info!("Rebuilding semantic index...");

        self.clear().await?;
        let count = self.index_documents(docs).await?;
        self.save().await?;

        info!("Index rebuild complete: {} documents", count);
        Ok(count)
    }
}

/// Rank documents by cosine similarity to a query without an index
///
/// Embeds the query and every document in one pass. Documents with no
/// usable text score 0.0. Output is sorted best first.
pub async fn rank_by_similarity(
    embedder: &dyn Embedder,
    docs: &[Document],
    query: &str,
) -> Result<Vec<ScoredDocument>> {
    if docs.is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed_query(query).await?;
    let entries = embedder.embed_documents(docs).await?;

    let similarities: HashMap<&str, f32> = entries
        .iter()
        .map(|e| (e.doc_id.as_str(), cosine_similarity(&query_vector, &e.vector)))
        .collect();

    let mut results: Vec<ScoredDocument> = docs
        .iter()
        .map(|doc| {
            let score = similarities.get(doc.doc_id().as_str()).copied().unwrap_or(0.0);
            ScoredDocument::new(doc.clone(), score)
        })
        .collect();

    sort_by_score_desc(&mut results);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::test_support::HashingEmbedder;
    use docscout_core::models::SourceKind;
    use tempfile::TempDir;

    fn doc(id: &str, title: &str) -> Document {
        Document::new(SourceKind::Feed, id, title)
    }

    fn engine(dir: &TempDir) -> SemanticSearchEngine {
        let settings = SemanticSettings {
            index_path: dir.path().join("semantic"),
            ..Default::default()
        };
        SemanticSearchEngine::with_embedder(Arc::new(HashingEmbedder { dimension: 64 }), settings)
            .unwrap()
    }

    #[tokio::test]
    async fn test_semantic_search_basic() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        engine
            .index_documents(&[
                doc("1", "solar panels power homes"),
                doc("2", "football match ends in draw"),
            ])
            .await
            .unwrap();

        let results = engine.search("solar panels", 10).await.unwrap();
        assert_eq!(results[0].document.id, "1");
    }

    #[tokio::test]
    async fn test_unchanged_documents_not_reembedded() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let docs = vec![doc("1", "alpha beta"), doc("2", "gamma delta")];

        assert_eq!(engine.index_documents(&docs).await.unwrap(), 2);
        assert_eq!(engine.index_documents(&docs).await.unwrap(), 0);

        let edited = vec![doc("1", "alpha beta epsilon")];
        assert_eq!(engine.index_documents(&edited).await.unwrap(), 1);
        assert_eq!(engine.indexed_count().await, 2);
    }

    #[tokio::test]
    async fn test_hybrid_search_blends_scores() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);

        let keyword_results = vec![
            (doc("1", "wind turbines offshore"), 2.0),
            (doc("2", "stock market rally"), 1.0),
        ];

        let results = engine
            .hybrid_search("wind turbines", keyword_results, 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "1");
        assert_eq!(results[0].keyword_score, Some(1.0));
        assert_eq!(results[1].keyword_score, Some(0.5));
        assert!(results[0].hybrid_score >= results[1].hybrid_score);
    }

    /// Index many near-duplicates of the query, save, and start a new session
    async fn engine_with_saved_crowd(dir: &TempDir) -> SemanticSearchEngine {
        {
            let engine = engine(dir);
            let crowd: Vec<Document> = (0..40)
                .map(|i| doc(&format!("old-{}", i), "wind turbines offshore wind turbines"))
                .collect();
            engine.index_documents(&crowd).await.unwrap();
            engine.save().await.unwrap();
        }
        engine(dir)
    }

    #[tokio::test]
    async fn test_hybrid_scores_current_documents_despite_saved_entries() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with_saved_crowd(&dir).await;
        assert_eq!(engine.indexed_count().await, 40);

        let keyword_results = vec![
            (doc("1", "wind turbines offshore"), 2.0),
            (doc("2", "stock market rally"), 1.0),
        ];

        let results = engine
            .hybrid_search("wind turbines", keyword_results, 1)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "1");
        assert!(results[0].semantic_score > 0.5);
        assert_eq!(engine.indexed_count().await, 42);
    }

    #[tokio::test]
    async fn test_search_looks_past_saved_entries() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with_saved_crowd(&dir).await;

        engine
            .index_documents(&[doc("new", "wind turbines offshore")])
            .await
            .unwrap();

        let results = engine.search("wind turbines", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "new");
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        {
            let engine = engine(&dir);
            engine.index_documents(&[doc("1", "rust async")]).await.unwrap();
            engine.save().await.unwrap();
        }

        let engine = engine(&dir);
        assert!(engine.is_indexed("feed:1").await);
        assert_eq!(engine.stats().await.model_name, "hashing");
    }

    #[tokio::test]
    async fn test_rank_by_similarity() {
        let embedder = HashingEmbedder { dimension: 64 };
        let docs = vec![
            doc("a", "central bank raises interest rates"),
            doc("b", "new species of frog discovered"),
            doc("c", ""),
        ];

        let ranked = rank_by_similarity(&embedder, &docs, "interest rates").await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].document.id, "a");
        assert_eq!(ranked[2].score, 0.0);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

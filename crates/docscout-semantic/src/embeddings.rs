use crate::error::{Result, SemanticError};
use crate::models::EmbeddingEntry;
use crate::preprocessing::{preprocess_document, preprocess_query};
use async_trait::async_trait;
use docscout_core::models::Document;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Anything that turns text into fixed-size vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SemanticError::EmbeddingError("No embeddings generated".to_string()))
    }

    /// Embed a search query
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let processed_query = preprocess_query(query);

        if processed_query.is_empty() {
            return Err(SemanticError::PreprocessingError(
                "Empty query after preprocessing".to_string(),
            ));
        }

        self.embed_text(&processed_query).await
    }

    /// Embed documents in one batch, skipping ones with no usable text
    async fn embed_documents(&self, docs: &[Document]) -> Result<Vec<EmbeddingEntry>> {
        let mut source_texts = Vec::new();
        let mut doc_ids = Vec::new();

        for doc in docs {
            let source_text = preprocess_document(doc);
            if source_text.is_empty() {
                debug!("Skipping {} - no text to embed", doc.doc_id());
                continue;
            }
            source_texts.push(source_text);
            doc_ids.push(doc.doc_id());
        }

        if source_texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embed_batch(source_texts.clone()).await?;
        if vectors.len() != source_texts.len() {
            return Err(SemanticError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                source_texts.len(),
                vectors.len()
            )));
        }

        Ok(vectors
            .into_iter()
            .zip(source_texts)
            .zip(doc_ids)
            .map(|((vector, source_text), doc_id)| EmbeddingEntry::new(doc_id, vector, source_text))
            .collect())
    }
}

/// Embedding generator using fastembed
pub struct EmbeddingGenerator {
    /// The underlying embedding model, loaded on first use
    model: Arc<RwLock<Option<TextEmbedding>>>,

    model_name: String,

    dimension: usize,
}

impl EmbeddingGenerator {
    /// Create a new embedding generator (lazy initialization)
    pub fn new(model_name: impl Into<String>) -> Self {
        let model_name = model_name.into();
        let dimension = match model_name.as_str() {
            "sentence-transformers/all-MiniLM-L6-v2" => 384,
            "sentence-transformers/all-MiniLM-L12-v2" => 384,
            "BAAI/bge-small-en-v1.5" => 384,
            "BAAI/bge-base-en-v1.5" => 768,
            "nomic-ai/nomic-embed-text-v1.5" => 768,
            _ => 384,
        };

        Self {
            model: Arc::new(RwLock::new(None)),
            model_name,
            dimension,
        }
    }

    fn model_type(&self) -> EmbeddingModel {
        match self.model_name.as_str() {
            "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            "sentence-transformers/all-MiniLM-L12-v2" => EmbeddingModel::AllMiniLML12V2,
            "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "nomic-ai/nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
            _ => {
                warn!(
                    "Unknown model {}, defaulting to all-MiniLM-L6-v2",
                    self.model_name
                );
                EmbeddingModel::AllMiniLML6V2
            }
        }
    }

    /// Initialize the model (downloads if needed)
    pub async fn initialize(&self) -> Result<()> {
        let mut model_guard = self.model.write().await;

        if model_guard.is_some() {
            debug!("Embedding model already initialized");
            return Ok(());
        }

        info!("Initializing embedding model: {}", self.model_name);

        let init_options = InitOptions::new(self.model_type()).with_show_download_progress(true);

        let embedding_model = TextEmbedding::try_new(init_options)
            .map_err(|e| SemanticError::ModelLoadError(e.to_string()))?;

        *model_guard = Some(embedding_model);

        info!("Embedding model initialized successfully");
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.model.read().await.is_some()
    }
}

#[async_trait]
impl Embedder for EmbeddingGenerator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if !self.is_initialized().await {
            self.initialize().await?;
        }

        let model_guard = self.model.read().await;
        let model = model_guard
            .as_ref()
            .ok_or(SemanticError::ModelNotInitialized)?;

        debug!("Embedding {} texts", texts.len());
        model
            .embed(texts, None)
            .map_err(|e| SemanticError::EmbeddingError(e.to_string()))
    }
}

/// Calculate cosine similarity between two vectors
///
/// Mismatched lengths and zero vectors give 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Convert cosine similarity to distance (for consistency with usearch)
pub fn similarity_to_distance(similarity: f32) -> f32 {
    1.0 - similarity
}

/// Convert distance to similarity score
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 - distance
}

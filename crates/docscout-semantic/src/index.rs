use crate::error::{Result, SemanticError};
use crate::models::{EmbeddingEntry, IndexStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use usearch::ffi::{IndexOptions, MetricKind, ScalarKind};
use usearch::Index as USearchIndex;

const INDEX_FILE: &str = "index.usearch";
const METADATA_FILE: &str = "metadata.msgpack";
const MAPPINGS_FILE: &str = "mappings.json";
const STATS_FILE: &str = "stats.json";

/// Smallest capacity reserved when the index has to grow
const MIN_CAPACITY: usize = 64;

#[derive(Serialize, Deserialize)]
struct Mappings {
    id_to_doc: HashMap<u64, String>,
    next_id: u64,
}

/// Vector index for semantic search using usearch
pub struct VectorIndex {
    /// usearch HNSW index, cosine metric
    index: USearchIndex,

    /// Mapping from usearch internal ID to document ID
    id_to_doc: HashMap<u64, String>,

    /// Mapping from document ID to usearch internal ID
    doc_to_id: HashMap<String, u64>,

    /// Source text and timestamps for each document
    metadata: HashMap<String, EmbeddingEntry>,

    next_id: u64,

    dimension: usize,

    stats: IndexStats,

    /// Directory the index is saved to
    index_path: PathBuf,
}

fn new_usearch(dimension: usize) -> Result<USearchIndex> {
    let options = IndexOptions {
        dimensions: dimension,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        connectivity: 16,
        expansion_add: 128,
        expansion_search: 64,
        ..Default::default()
    };

    USearchIndex::new(&options)
        .map_err(|e| SemanticError::IndexError(format!("Failed to create usearch index: {}", e)))
}

impl VectorIndex {
    /// Create a new empty vector index
    pub fn new(dimension: usize, model_name: String, index_path: PathBuf) -> Result<Self> {
        Ok(Self {
            index: new_usearch(dimension)?,
            id_to_doc: HashMap::new(),
            doc_to_id: HashMap::new(),
            metadata: HashMap::new(),
            next_id: 0,
            dimension,
            stats: IndexStats::new(model_name, dimension),
            index_path,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Add a document embedding, replacing any previous one for the same document
    pub fn add(&mut self, entry: EmbeddingEntry) -> Result<()> {
        if entry.vector.len() != self.dimension {
            return Err(SemanticError::IndexError(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                entry.vector.len()
            )));
        }

        if self.doc_to_id.contains_key(&entry.doc_id) {
            debug!("Replacing existing entry for {}", entry.doc_id);
            self.remove(&entry.doc_id)?;
        }

        self.ensure_capacity(1)?;

        let id = self.next_id;
        self.index
            .add(id, &entry.vector)
            .map_err(|e| SemanticError::IndexError(e.to_string()))?;

        self.id_to_doc.insert(id, entry.doc_id.clone());
        self.doc_to_id.insert(entry.doc_id.clone(), id);
        self.next_id += 1;
        self.metadata.insert(entry.doc_id.clone(), entry);

        Ok(())
    }

    /// Add multiple document embeddings
    pub fn add_batch(&mut self, entries: Vec<EmbeddingEntry>) -> Result<()> {
        self.ensure_capacity(entries.len())?;
        for entry in entries {
            self.add(entry)?;
        }
        Ok(())
    }

    /// usearch refuses inserts past its reserved capacity
    fn ensure_capacity(&mut self, additional: usize) -> Result<()> {
        let needed = self.index.size() + additional;
        let capacity = self.index.capacity();
        if needed > capacity {
            let target = needed.max(capacity * 2).max(MIN_CAPACITY);
            self.index
                .reserve(target)
                .map_err(|e| SemanticError::IndexError(e.to_string()))?;
        }
        Ok(())
    }

    /// Remove a document from the index
    pub fn remove(&mut self, doc_id: &str) -> Result<()> {
        let Some(id) = self.doc_to_id.remove(doc_id) else {
            return Err(SemanticError::DocumentNotFound {
                doc_id: doc_id.to_string(),
            });
        };

        self.index
            .remove(id)
            .map_err(|e| SemanticError::IndexError(e.to_string()))?;

        self.id_to_doc.remove(&id);
        self.metadata.remove(doc_id);

        Ok(())
    }

    /// k nearest documents as `(doc_id, cosine similarity)`, most similar first
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query_vector.len() != self.dimension {
            return Err(SemanticError::SearchError(format!(
                "Query vector dimension mismatch: expected {}, got {}",
                self.dimension,
                query_vector.len()
            )));
        }

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let results = self
            .index
            .search(query_vector, k)
            .map_err(|e| SemanticError::SearchError(e.to_string()))?;

        let output = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .filter_map(|(id, distance)| {
                self.id_to_doc
                    .get(id)
                    .map(|doc_id| (doc_id.clone(), 1.0 - distance))
            })
            .collect();

        Ok(output)
    }

    pub fn get_metadata(&self, doc_id: &str) -> Option<&EmbeddingEntry> {
        self.metadata.get(doc_id)
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.doc_to_id.contains_key(doc_id)
    }

    pub fn doc_ids(&self) -> Vec<String> {
        self.doc_to_id.keys().cloned().collect()
    }

    /// Save the index to its directory
    pub fn save(&mut self) -> Result<()> {
        info!("Saving semantic index to {:?}", self.index_path);

        std::fs::create_dir_all(&self.index_path)?;

        let index_file = self.index_path.join(INDEX_FILE);
        self.index
            .save(&index_file.to_string_lossy())
            .map_err(|e| SemanticError::IndexError(format!("Failed to save index: {}", e)))?;

        let metadata_data = rmp_serde::to_vec(&self.metadata).map_err(|e| {
            SemanticError::SerializationError(format!("Failed to serialize metadata: {}", e))
        })?;
        std::fs::write(self.index_path.join(METADATA_FILE), metadata_data)?;

        let mappings = Mappings {
            id_to_doc: self.id_to_doc.clone(),
            next_id: self.next_id,
        };
        std::fs::write(
            self.index_path.join(MAPPINGS_FILE),
            serde_json::to_string_pretty(&mappings)?,
        )?;

        let index_size = Self::calculate_index_size(&self.index_path)?;
        self.stats.update(self.len(), index_size);
        std::fs::write(
            self.index_path.join(STATS_FILE),
            serde_json::to_string_pretty(&self.stats)?,
        )?;

        info!("Semantic index saved: {} documents", self.len());
        Ok(())
    }

    /// Load an index saved by [`VectorIndex::save`]
    pub fn load(index_path: PathBuf, dimension: usize) -> Result<Self> {
        info!("Loading semantic index from {:?}", index_path);

        if !index_path.exists() {
            return Err(SemanticError::IndexNotFound {
                path: index_path.to_string_lossy().to_string(),
            });
        }

        let index_file = index_path.join(INDEX_FILE);
        let metadata_file = index_path.join(METADATA_FILE);
        let mappings_file = index_path.join(MAPPINGS_FILE);
        if !index_file.exists() || !metadata_file.exists() || !mappings_file.exists() {
            return Err(SemanticError::CorruptedIndex);
        }

        let index = new_usearch(dimension)?;
        index
            .load(&index_file.to_string_lossy())
            .map_err(|e| SemanticError::IndexError(format!("Failed to load index: {}", e)))?;

        if index.dimensions() != dimension {
            return Err(SemanticError::IndexError(format!(
                "Saved index has dimension {}, expected {}",
                index.dimensions(),
                dimension
            )));
        }

        let metadata: HashMap<String, EmbeddingEntry> =
            rmp_serde::from_slice(&std::fs::read(&metadata_file)?).map_err(|e| {
                SemanticError::SerializationError(format!("Failed to deserialize metadata: {}", e))
            })?;

        let mappings: Mappings = serde_json::from_str(&std::fs::read_to_string(&mappings_file)?)?;
        let doc_to_id = mappings
            .id_to_doc
            .iter()
            .map(|(id, doc_id)| (doc_id.clone(), *id))
            .collect();

        let stats_file = index_path.join(STATS_FILE);
        let stats = if stats_file.exists() {
            serde_json::from_str(&std::fs::read_to_string(&stats_file)?)?
        } else {
            IndexStats::new("unknown".to_string(), dimension)
        };

        info!("Semantic index loaded: {} documents", metadata.len());

        Ok(Self {
            index,
            id_to_doc: mappings.id_to_doc,
            doc_to_id,
            metadata,
            next_id: mappings.next_id,
            dimension,
            stats,
            index_path,
        })
    }

    fn calculate_index_size(path: &Path) -> Result<u64> {
        let mut total_size = 0u64;

        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let metadata = entry?.metadata()?;
                if metadata.is_file() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }

    /// Drop every document, keeping dimension and path
    pub fn clear(&mut self) -> Result<()> {
        self.index = new_usearch(self.dimension)?;
        self.id_to_doc.clear();
        self.doc_to_id.clear();
        self.metadata.clear();
        self.next_id = 0;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>) -> EmbeddingEntry {
        EmbeddingEntry::new(id.to_string(), vector, format!("text for {}", id))
    }

    #[test]
    fn test_vector_index_basic() {
        let temp_dir = TempDir::new().unwrap();
        let mut index =
            VectorIndex::new(3, "test-model".to_string(), temp_dir.path().to_path_buf()).unwrap();

        index.add(entry("arxiv:1", vec![1.0, 0.0, 0.0])).unwrap();
        index.add(entry("arxiv:2", vec![0.0, 1.0, 0.0])).unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.contains("arxiv:1"));
        assert!(index.add(entry("arxiv:3", vec![1.0])).is_err());
    }

    #[test]
    fn test_vector_search() {
        let temp_dir = TempDir::new().unwrap();
        let mut index =
            VectorIndex::new(3, "test-model".to_string(), temp_dir.path().to_path_buf()).unwrap();

        index.add(entry("doc1", vec![1.0, 0.0, 0.0])).unwrap();
        index.add(entry("doc2", vec![0.9, 0.1, 0.0])).unwrap();
        index.add(entry("doc3", vec![0.0, 0.0, 1.0])).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "doc1");
        assert!((results[0].1 - 1.0).abs() < 1e-3);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_upsert_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let mut index =
            VectorIndex::new(2, "test-model".to_string(), temp_dir.path().to_path_buf()).unwrap();

        index.add(entry("a", vec![1.0, 0.0])).unwrap();
        index.add(entry("a", vec![0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 1);

        let results = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > 0.99);

        index.remove("a").unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.remove("a"),
            Err(SemanticError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("semantic");

        let mut index = VectorIndex::new(3, "test-model".to_string(), path.clone()).unwrap();
        index.add(entry("x", vec![0.0, 1.0, 0.0])).unwrap();
        index.add(entry("y", vec![1.0, 0.0, 0.0])).unwrap();
        index.save().unwrap();
        assert_eq!(index.stats().total_documents, 2);

        let loaded = VectorIndex::load(path, 3).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get_metadata("x").unwrap().source_text, "text for x");

        let results = loaded.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results[0].0, "y");
    }

    #[test]
    fn test_load_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            VectorIndex::load(temp_dir.path().join("nope"), 3),
            Err(SemanticError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let mut index =
            VectorIndex::new(2, "test-model".to_string(), temp_dir.path().to_path_buf()).unwrap();
        index.add(entry("a", vec![1.0, 0.0])).unwrap();
        index.clear().unwrap();
        assert!(index.is_empty());
        index.add(entry("b", vec![1.0, 0.0])).unwrap();
        assert_eq!(index.len(), 1);
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Main configuration structure
///
/// This gets loaded from config file, env vars, and CLI args.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub semantic: SemanticSettings,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_file(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load config from an explicit file, which must exist
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Environment variables beat the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("DOCSCOUT_INFERENCE_TOKEN").or_else(|| non_empty("HF_TOKEN")) {
            self.inference.token = Some(token);
        }
        if let Some(url) = non_empty("DOCSCOUT_INFERENCE_URL") {
            self.inference.api_url = url;
        }
        if let Some(path) = non_empty("DOCSCOUT_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> crate::Result<PathBuf> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = self.to_toml()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// XDG config dir on Linux, Application Support on macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find config directory".into()))?
            .join("docscout");

        Ok(config_dir.join("config.toml"))
    }
}

fn data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("docscout")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// arXiv API base (the `/query` path is appended)
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,

    /// Feeds used when a command is given no `--feed`
    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,

    /// How many candidates to pull from a source before ranking
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_arxiv_url() -> String {
    docscout_api::arxiv::ARXIV_API_BASE.to_string()
}

fn default_user_agent() -> String {
    docscout_api::http::DEFAULT_USER_AGENT.to_string()
}

fn default_source_timeout() -> u64 {
    30
}

fn default_max_results() -> usize {
    100
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            arxiv_url: default_arxiv_url(),
            feeds: Vec::new(),
            user_agent: default_user_agent(),
            timeout_secs: default_source_timeout(),
            max_results: default_max_results(),
        }
    }
}

impl SourcesConfig {
    pub fn http_settings(&self) -> docscout_api::HttpSettings {
        docscout_api::HttpSettings {
            user_agent: self.user_agent.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results printed per command
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// BM25 term frequency saturation
    #[serde(default = "default_k1")]
    pub bm25_k1: f32,

    /// BM25 document length normalization
    #[serde(default = "default_b")]
    pub bm25_b: f32,
}

fn default_limit() -> usize {
    10
}

fn default_k1() -> f32 {
    1.2
}

fn default_b() -> f32 {
    0.75
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            bm25_k1: default_k1(),
            bm25_b: default_b(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSettings {
    /// Sentence embedding model
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Weight of the cosine score in hybrid search (0.0-1.0)
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    /// Results below this cosine similarity are dropped
    #[serde(default)]
    pub min_similarity: f32,

    /// Where the persistent vector index lives
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_semantic_weight() -> f32 {
    0.6
}

fn default_index_path() -> PathBuf {
    data_dir().join("semantic")
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            semantic_weight: default_semantic_weight(),
            min_similarity: 0.0,
            index_path: default_index_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Hosted inference base URL; the model id is appended
    #[serde(default = "default_inference_url")]
    pub api_url: String,

    /// API token; usually supplied through the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// NLI model used for pair classification and zero-shot ranking
    #[serde(default = "default_nli_model")]
    pub nli_model: String,

    #[serde(default = "default_summarization_model")]
    pub summarization_model: String,

    /// `{}` is replaced with the candidate label
    #[serde(default = "default_hypothesis_template")]
    pub hypothesis_template: String,

    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,

    /// Article text is cut to this many characters before inference
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(default = "default_summary_min")]
    pub summary_min_length: usize,

    #[serde(default = "default_summary_max")]
    pub summary_max_length: usize,
}

fn default_inference_url() -> String {
    docscout_api::inference::INFERENCE_API_BASE.to_string()
}

fn default_nli_model() -> String {
    "facebook/bart-large-mnli".to_string()
}

fn default_summarization_model() -> String {
    "facebook/bart-large-cnn".to_string()
}

fn default_hypothesis_template() -> String {
    "This example is {}.".to_string()
}

fn default_inference_timeout() -> u64 {
    60
}

fn default_max_input_chars() -> usize {
    3000
}

fn default_summary_min() -> usize {
    30
}

fn default_summary_max() -> usize {
    130
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: default_inference_url(),
            token: None,
            nli_model: default_nli_model(),
            summarization_model: default_summarization_model(),
            hypothesis_template: default_hypothesis_template(),
            timeout_secs: default_inference_timeout(),
            max_input_chars: default_max_input_chars(),
            summary_min_length: default_summary_min(),
            summary_max_length: default_summary_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Cache TTL in hours, 0 = never expire
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u64,

    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Serve whatever is cached, even if stale, and never hit the network
    #[serde(default)]
    pub offline_mode: bool,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    24
}

fn default_cache_path() -> PathBuf {
    data_dir().join("cache.db")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_hours: default_cache_ttl(),
            path: default_cache_path(),
            offline_mode: false,
        }
    }
}

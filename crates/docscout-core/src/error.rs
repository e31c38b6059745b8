use thiserror::Error;

/// All the ways a DocScout pipeline can fail
#[derive(Error, Debug)]
pub enum Error {
    #[error("API request failed: {0}")]
    ApiError(#[from] docscout_api::ApiError),

    #[error("Cache operation failed: {0}")]
    CacheError(#[from] docscout_cache::CacheError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

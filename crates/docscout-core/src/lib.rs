// Core pipeline logic: document model, config, fetching and export
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod providers;
pub mod search;
pub mod search_with_cache;

pub use config::Config;
pub use error::Error;
pub use export::{ExportFormat, Exporter};
pub use models::{Document, ScoredDocument, SearchMode, SourceKind};
pub use providers::{ArxivProvider, FeedProvider};
pub use search::{DocumentProvider, SearchEngine};
pub use search_with_cache::CachedSearchEngine;

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;

// SQLite-based caching layer
// Keeps network calls down and makes offline mode possible

pub mod cache;

pub use cache::{CacheError, CacheStats, DocumentCache};

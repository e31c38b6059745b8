// HTTP clients for every outside source DocScout reads from
pub mod arxiv;
pub mod datasets;
pub mod error;
pub mod feeds;
pub mod http;
pub mod inference;
pub mod pages;
pub mod retry;

// Re-export common types
pub use arxiv::{ArxivClient, ArxivEntry, ArxivQuery, ArxivSort};
pub use datasets::{DatasetClient, NliRow, RowsRequest};
pub use error::{ApiError, Result};
pub use feeds::{FeedClient, FeedEntry, FetchedFeed};
pub use http::HttpSettings;
pub use inference::{InferenceClient, LabelScore, SummaryParams};
pub use pages::{truncate_chars, ExtractedPage, PageClient};
pub use retry::RetryConfig;

// Provider implementations for each document source
pub mod arxiv;
pub mod feed;

pub use arxiv::ArxivProvider;
pub use feed::FeedProvider;

// Feed provider - one RSS/Atom/JSON feed as a document source
use async_trait::async_trait;
use docscout_api::{FeedClient, FeedEntry, HttpSettings};

use crate::{
    models::{Document, SourceKind},
    search::DocumentProvider,
    Result,
};

/// Fetches the latest entries of a single feed
///
/// Feeds can't be queried, so `fetch` returns the newest `limit` entries
/// and leaves matching to the ranking step.
pub struct FeedProvider {
    client: FeedClient,
    url: String,
}

impl FeedProvider {
    pub fn new(settings: &HttpSettings, url: impl Into<String>) -> Result<Self> {
        Ok(Self::from_client(FeedClient::new(settings)?, url))
    }

    pub fn from_client(client: FeedClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DocumentProvider for FeedProvider {
    fn name(&self) -> String {
        format!("feed:{}", self.url)
    }

    async fn fetch(&self, _query: &str, limit: usize) -> Result<Vec<Document>> {
        let feed = self.client.fetch(&self.url).await?;
        Ok(feed
            .entries
            .into_iter()
            .take(limit)
            .map(feed_entry_to_document)
            .collect())
    }
}

/// Convert a feed entry to our internal Document model
pub fn feed_entry_to_document(entry: FeedEntry) -> Document {
    // Entries without an id fall back to their link
    let id = if entry.id.is_empty() {
        entry.link.clone()
    } else {
        entry.id
    };

    Document {
        source: SourceKind::Feed,
        id,
        title: entry.title,
        link: entry.link,
        summary: entry.summary,
        content: entry.content,
        authors: entry.authors,
        categories: entry.categories,
        published_at: entry.published,
    }
}

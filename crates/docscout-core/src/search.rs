use crate::{
    models::{dedup_documents, Document},
    Result,
};
use tracing::{debug, warn};

/// A place documents come from
///
/// Each source (arXiv, feeds, ...) implements this. A provider may ignore the
/// query when its source can't be searched; ranking happens downstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Short stable name, used as the cache namespace
    fn name(&self) -> String;

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Document>>;
}

/// Collects candidate documents from every registered provider
pub struct SearchEngine {
    providers: Vec<Box<dyn DocumentProvider>>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn add_provider(&mut self, provider: Box<dyn DocumentProvider>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Fetch from all providers concurrently
    ///
    /// A failing provider is logged and skipped; it only becomes an error
    /// when every provider fails.
    pub async fn fetch_all(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        use futures::future::join_all;

        let fetches: Vec<_> = self
            .providers
            .iter()
            .map(|provider| provider.fetch(query, limit))
            .collect();

        let results = join_all(fetches).await;

        let mut docs = Vec::new();
        let mut last_error = None;
        let mut failures = 0;

        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(mut d) => {
                    debug!("{} returned {} documents", provider.name(), d.len());
                    docs.append(&mut d);
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures > 0 && failures == self.providers.len() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(dedup_documents(docs))
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

// Candidate fetching with caching support
use crate::{
    models::{dedup_documents, Document},
    search::DocumentProvider,
    Result,
};
use docscout_cache::DocumentCache;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetch engine that checks the cache before hitting the network
///
/// Each provider's results are remembered per query under the provider's
/// name. In offline mode providers are never called. In refresh mode
/// providers are always called and the cache only answers when they fail.
pub struct CachedSearchEngine {
    providers: Vec<Box<dyn DocumentProvider>>,
    cache: Option<Arc<DocumentCache>>,
    offline: bool,
    refresh: bool,
}

impl CachedSearchEngine {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            cache: None,
            offline: false,
            refresh: false,
        }
    }

    pub fn with_cache(cache: Arc<DocumentCache>) -> Self {
        Self {
            providers: Vec::new(),
            cache: Some(cache),
            offline: false,
            refresh: false,
        }
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Always fetch fresh results, keeping the cache as a fallback
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn add_provider(&mut self, provider: Box<dyn DocumentProvider>) {
        self.providers.push(provider);
    }

    /// Fetch candidates with a cache-first strategy
    pub async fn fetch_all(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let fetches: Vec<_> = self
            .providers
            .iter()
            .map(|provider| self.fetch_one(provider.as_ref(), query, limit))
            .collect();

        let results = join_all(fetches).await;

        let mut docs = Vec::new();
        let mut last_error = None;
        let mut failures = 0;

        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(mut d) => docs.append(&mut d),
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

        // Offline with nothing remembered for this query: fall back to full-text
        if self.offline && docs.is_empty() {
            if let Some(cache) = &self.cache {
                docs = cache.search::<Document>(query, limit)?;
                info!("Offline full-text fallback found {} documents", docs.len());
            }
        }

        Ok(dedup_documents(docs))
    }

    async fn fetch_one(
        &self,
        provider: &dyn DocumentProvider,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let namespace = provider.name();

        if let Some(cache) = &self.cache {
            if self.offline || !self.refresh {
                debug!("Checking cache for {} query: {}", namespace, query);
                if let Some(docs) = self.cached_results(cache, &namespace, query) {
                    info!("Cache hit! {} returned {} cached documents", namespace, docs.len());
                    return Ok(docs.into_iter().take(limit).collect());
                }
            }
        }

        if self.offline {
            debug!("Offline mode, skipping {}", namespace);
            return Ok(Vec::new());
        }

        info!("Fetching from {}", namespace);
        let docs = match provider.fetch(query, limit).await {
            Ok(docs) => docs,
            Err(e) => {
                let stale = self
                    .cache
                    .as_deref()
                    .filter(|_| self.refresh)
                    .and_then(|cache| self.cached_results(cache, &namespace, query));
                match stale {
                    Some(docs) => {
                        warn!("{} failed: {}, serving {} cached documents", namespace, e, docs.len());
                        return Ok(docs.into_iter().take(limit).collect());
                    }
                    None => return Err(e),
                }
            }
        };

        if let Some(cache) = &self.cache {
            self.store(cache, &namespace, query, &docs);
        }

        Ok(docs)
    }

    /// All documents a remembered query points to, or None if any are gone
    fn cached_results(
        &self,
        cache: &DocumentCache,
        namespace: &str,
        query: &str,
    ) -> Option<Vec<Document>> {
        let keys = cache.query_results(namespace, query).ok()?;
        keys.iter()
            .map(|key| {
                let (source, id) = key.split_once(':')?;
                cache.get::<Document>(source, id).ok()
            })
            .collect()
    }

    fn store(&self, cache: &DocumentCache, namespace: &str, query: &str, docs: &[Document]) {
        let mut keys = Vec::with_capacity(docs.len());
        for doc in docs {
            let source = doc.source.to_string();
            match cache.set(&source, &doc.id, doc, &doc.searchable_text()) {
                Ok(()) => keys.push(doc.doc_id()),
                Err(e) => debug!("Failed to cache {}: {}", doc.doc_id(), e),
            }
        }

        if let Err(e) = cache.set_query_results(namespace, query, &keys) {
            debug!("Failed to cache query {}: {}", query, e);
        } else {
            info!("Cached {} documents from {}", keys.len(), namespace);
        }
    }
}

impl Default for CachedSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

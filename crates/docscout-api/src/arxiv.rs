use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{build_client, check_status, HttpSettings};
use crate::retry::{with_retry_if, RetryConfig};

pub const ARXIV_API_BASE: &str = "https://export.arxiv.org/api";

/// Field prefixes understood by the arXiv query syntax
const FIELD_PREFIXES: &[&str] = &[
    "ti:", "au:", "abs:", "co:", "jr:", "cat:", "rn:", "id:", "all:",
];

/// arXiv sort criteria
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArxivSort {
    #[default]
    Relevance,
    LastUpdated,
    Submitted,
}

impl ArxivSort {
    fn as_param(&self) -> &'static str {
        match self {
            ArxivSort::Relevance => "relevance",
            ArxivSort::LastUpdated => "lastUpdatedDate",
            ArxivSort::Submitted => "submittedDate",
        }
    }
}

/// A search against the arXiv API
#[derive(Debug, Clone)]
pub struct ArxivQuery {
    pub query: String,
    pub start: usize,
    pub max_results: usize,
    pub sort: ArxivSort,
    pub descending: bool,
}

impl ArxivQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            start: 0,
            max_results: 50,
            sort: ArxivSort::default(),
            descending: true,
        }
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn sort(mut self, sort: ArxivSort) -> Self {
        self.sort = sort;
        self
    }

    /// Build the `search_query` parameter
    ///
    /// Plain words are AND-ed over all fields; a query already written in
    /// arXiv field syntax is sent untouched.
    pub fn search_query(&self) -> String {
        let trimmed = self.query.trim();
        if trimmed.split_whitespace().any(is_field_term) {
            return trimmed.to_string();
        }

        trimmed
            .split_whitespace()
            .map(|w| format!("all:{}", w))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// `ti:bm25`, `(au:smith` and the like; a prefix only counts at the start of a word
fn is_field_term(word: &str) -> bool {
    let word = word.trim_start_matches('(').to_lowercase();
    FIELD_PREFIXES.iter().any(|p| word.starts_with(p))
}

/// One paper from an arXiv Atom response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivEntry {
    /// Versioned arXiv identifier, e.g. `2106.09685v2`
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub abs_url: String,
    pub pdf_url: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ArxivClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        Self::with_base_url(settings, ARXIV_API_BASE.to_string())
    }

    pub fn with_base_url(settings: &HttpSettings, base_url: String) -> Result<Self> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Search papers
    pub async fn search(&self, query: &ArxivQuery) -> Result<Vec<ArxivEntry>> {
        let url = format!("{}/query", self.base_url);
        let search_query = query.search_query();
        debug!("arXiv search_query={}", search_query);

        let body = with_retry_if(
            &self.retry_config,
            || async {
                let response = self
                    .client
                    .get(&url)
                    .query(&[
                        ("search_query", search_query.as_str()),
                        ("start", &query.start.to_string()),
                        ("max_results", &query.max_results.to_string()),
                        ("sortBy", query.sort.as_param()),
                        (
                            "sortOrder",
                            if query.descending {
                                "descending"
                            } else {
                                "ascending"
                            },
                        ),
                    ])
                    .send()
                    .await?;

                let response = check_status(response, &query.query).await?;
                Ok::<_, ApiError>(response.bytes().await?)
            },
            ApiError::is_retryable,
        )
        .await?;

        parse_atom(&body)
    }
}

/// Parse an arXiv Atom document
pub fn parse_atom(body: &[u8]) -> Result<Vec<ArxivEntry>> {
    let feed = feed_rs::parser::parse(body).map_err(|e| ApiError::ParseError(e.to_string()))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let abs_url = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("alternate"))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone())
                .unwrap_or_else(|| entry.id.clone());

            let pdf_url = entry
                .links
                .iter()
                .find(|l| {
                    l.title.as_deref() == Some("pdf")
                        || l.media_type.as_deref() == Some("application/pdf")
                })
                .map(|l| l.href.clone());

            ArxivEntry {
                arxiv_id: arxiv_id_from_url(&entry.id),
                title: entry
                    .title
                    .map(|t| normalize_whitespace(&t.content))
                    .unwrap_or_default(),
                summary: entry
                    .summary
                    .map(|t| normalize_whitespace(&t.content))
                    .unwrap_or_default(),
                authors: entry.authors.into_iter().map(|p| p.name).collect(),
                categories: entry.categories.into_iter().map(|c| c.term).collect(),
                abs_url,
                pdf_url,
                published: entry.published,
                updated: entry.updated,
            }
        })
        .collect();

    Ok(entries)
}

/// `http://arxiv.org/abs/2106.09685v2` -> `2106.09685v2`
fn arxiv_id_from_url(id: &str) -> String {
    match id.split_once("/abs/") {
        Some((_, rest)) => rest.to_string(),
        None => id.rsplit('/').next().unwrap_or(id).to_string(),
    }
}

/// Atom titles and abstracts come hard-wrapped
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

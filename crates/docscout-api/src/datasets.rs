// Dataset hub client - reads rows of public datasets page by page
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::http::{build_client, check_status, HttpSettings};
use crate::retry::{with_retry_if, RetryConfig};

pub const DATASETS_API_BASE: &str = "https://datasets-server.huggingface.co";

/// The rows endpoint refuses pages larger than this
pub const MAX_PAGE_SIZE: usize = 100;

/// Which slice of which dataset to read
#[derive(Debug, Clone)]
pub struct RowsRequest {
    pub dataset: String,
    pub config: String,
    pub split: String,
    pub offset: usize,
    pub length: usize,
}

impl RowsRequest {
    pub fn new(dataset: impl Into<String>, config: impl Into<String>, split: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            config: config.into(),
            split: split.into(),
            offset: 0,
            length: MAX_PAGE_SIZE,
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    rows: Vec<RowEnvelope>,
    #[serde(default)]
    num_rows_total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RowEnvelope {
    row: serde_json::Value,
}

/// A premise/hypothesis pair with the dataset's integer label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NliRow {
    pub premise: String,
    pub hypothesis: String,
    pub label: i64,
}

pub struct DatasetClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry_config: RetryConfig,
}

impl DatasetClient {
    pub fn new(settings: &HttpSettings, token: Option<String>) -> Result<Self> {
        Self::with_base_url(settings, token, DATASETS_API_BASE.to_string())
    }

    pub fn with_base_url(
        settings: &HttpSettings,
        token: Option<String>,
        base_url: String,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Read up to `request.length` raw rows starting at `request.offset`
    pub async fn rows(&self, request: &RowsRequest) -> Result<Vec<serde_json::Value>> {
        let mut rows = Vec::with_capacity(request.length);
        let mut offset = request.offset;

        while rows.len() < request.length {
            let page_len = (request.length - rows.len()).min(MAX_PAGE_SIZE);
            let page = self.fetch_page(request, offset, page_len).await?;
            let fetched = page.rows.len();
            debug!("Fetched {} rows at offset {}", fetched, offset);

            rows.extend(page.rows.into_iter().map(|r| r.row));
            offset += fetched;

            let exhausted = page
                .num_rows_total
                .map(|total| offset >= total)
                .unwrap_or(false);
            if fetched < page_len || fetched == 0 || exhausted {
                break;
            }
        }

        info!(
            "Loaded {} rows from {}/{}/{}",
            rows.len(),
            request.dataset,
            request.config,
            request.split
        );
        Ok(rows)
    }

    /// Read rows and keep those shaped like an NLI example
    pub async fn nli_rows(&self, request: &RowsRequest) -> Result<Vec<NliRow>> {
        let rows = self.rows(request).await?;
        let total = rows.len();

        let parsed: Vec<NliRow> = rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect();

        if parsed.len() < total {
            warn!(
                "{} of {} rows lacked premise/hypothesis/label fields",
                total - parsed.len(),
                total
            );
        }
        Ok(parsed)
    }

    async fn fetch_page(&self, request: &RowsRequest, offset: usize, length: usize) -> Result<RowsPage> {
        let url = format!("{}/rows", self.base_url);

        with_retry_if(
            &self.retry_config,
            || async {
                let mut builder = self.client.get(&url).query(&[
                    ("dataset", request.dataset.as_str()),
                    ("config", request.config.as_str()),
                    ("split", request.split.as_str()),
                    ("offset", &offset.to_string()),
                    ("length", &length.to_string()),
                ]);

                if let Some(ref token) = self.token {
                    builder = builder.bearer_auth(token);
                }

                let response = builder.send().await?;
                let response = check_status(response, &request.dataset).await?;
                let body = response.text().await?;
                Ok::<_, ApiError>(serde_json::from_str::<RowsPage>(&body)?)
            },
            ApiError::is_retryable,
        )
        .await
    }
}

// Hosted model inference - sequence-pair classification and summarization
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::http::{build_client, check_status, HttpSettings};
use crate::retry::{with_retry_if, RetryConfig};

pub const INFERENCE_API_BASE: &str = "https://router.huggingface.co/hf-inference/models";

/// A class label with its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Length bounds for abstractive summaries, in model tokens
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SummaryParams {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for SummaryParams {
    fn default() -> Self {
        Self {
            min_length: 30,
            max_length: 130,
        }
    }
}

#[derive(Serialize)]
struct PairRequest<'a> {
    inputs: PairInputs<'a>,
    parameters: PairParameters,
}

#[derive(Serialize)]
struct PairInputs<'a> {
    text: &'a str,
    text_pair: &'a str,
}

#[derive(Serialize)]
struct PairParameters {
    top_k: usize,
}

/// Classification endpoints answer either flat or wrapped in a batch
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Flat(Vec<LabelScore>),
    Batched(Vec<Vec<LabelScore>>),
}

#[derive(Serialize)]
struct SummaryRequest<'a> {
    inputs: &'a str,
    parameters: SummaryParams,
}

#[derive(Deserialize)]
struct SummaryOutput {
    summary_text: String,
}

pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry_config: RetryConfig,
}

impl InferenceClient {
    pub fn new(settings: &HttpSettings, token: Option<String>) -> Result<Self> {
        Self::with_base_url(settings, token, INFERENCE_API_BASE.to_string())
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

    /// Classify a (premise, hypothesis) pair, returning every label's score
    pub async fn classify_pair(
        &self,
        model: &str,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>> {
        let body = PairRequest {
            inputs: PairInputs {
                text: premise,
                text_pair: hypothesis,
            },
            parameters: PairParameters { top_k: 10 },
        };

        let text = self.post(model, &body).await?;
        let parsed: ClassificationResponse = serde_json::from_str(&text)?;

        let scores = match parsed {
            ClassificationResponse::Flat(scores) => scores,
            ClassificationResponse::Batched(mut batch) => {
                if batch.is_empty() {
                    return Err(ApiError::ParseError("empty classification batch".into()));
                }
                batch.swap_remove(0)
            }
        };

        if scores.is_empty() {
            return Err(ApiError::ParseError("model returned no labels".into()));
        }
        Ok(scores)
    }

    /// Abstractive summary of `text`
    pub async fn summarize(&self, model: &str, text: &str, params: &SummaryParams) -> Result<String> {
        let body = SummaryRequest {
            inputs: text,
            parameters: *params,
        };

        let text = self.post(model, &body).await?;
        let outputs: Vec<SummaryOutput> = serde_json::from_str(&text)?;

        outputs
            .into_iter()
            .next()
            .map(|o| o.summary_text.trim().to_string())
            .ok_or_else(|| ApiError::ParseError("model returned no summary".into()))
    }

    async fn post<B: Serialize>(&self, model: &str, body: &B) -> Result<String> {
        let url = format!("{}/{}", self.base_url, model);
        debug!("POST {}", url);

        with_retry_if(
            &self.retry_config,
            || async {
                let mut request = self.client.post(&url).json(body);
                if let Some(ref token) = self.token {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await?;
                let response = check_status(response, model).await?;
                Ok::<_, ApiError>(response.text().await?)
            },
            ApiError::is_retryable,
        )
        .await
    }
}

// Abstractive summaries with an extractive fallback
use crate::error::{NliError, Result};
use async_trait::async_trait;
use docscout_api::{truncate_chars, InferenceClient, SummaryParams};
use serde::Serialize;
use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

#[async_trait]
pub trait Summarizer: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Summarization model served by the hosted inference API
pub struct RemoteSummarizer {
    client: InferenceClient,
    model: String,
    params: SummaryParams,
    max_input_chars: usize,
}

impl RemoteSummarizer {
    pub fn new(client: InferenceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            params: SummaryParams::default(),
            max_input_chars: 3000,
        }
    }

    pub fn with_params(mut self, params: SummaryParams) -> Self {
        self.params = params;
        self
    }

    /// Input beyond this many characters is cut
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }
}

#[async_trait]
impl Summarizer for RemoteSummarizer {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(NliError::EmptyInput);
        }

        let input = truncate_chars(text, self.max_input_chars);
        Ok(self.client.summarize(&self.model, input, &self.params).await?)
    }
}

/// Lead-sentence summary, no model needed
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_sentences: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    /// First `max_sentences` non-empty sentences, joined by single spaces
    pub fn extract(&self, text: &str) -> String {
        text.unicode_sentences()
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|s| !s.is_empty())
            .take(self.max_sentences)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let summary = self.extract(text);
        if summary.is_empty() {
            return Err(NliError::EmptyInput);
        }
        Ok(summary)
    }
}

/// A summary and what produced it
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub text: String,
    pub method: String,
    pub fell_back: bool,
}

/// Try `primary`, falling back to lead sentences on error or empty output
pub async fn summarize_with_fallback(
    primary: &dyn Summarizer,
    fallback: &ExtractiveSummarizer,
    text: &str,
) -> Result<SummaryOutcome> {
    match primary.summarize(text).await {
        Ok(summary) if !summary.trim().is_empty() => {
            info!("{} produced a {} char summary", primary.name(), summary.chars().count());
            return Ok(SummaryOutcome {
                text: summary.trim().to_string(),
                method: primary.name().to_string(),
                fell_back: false,
            });
        }
        Ok(_) => warn!("{} returned an empty summary, using extractive", primary.name()),
        Err(e) => warn!("{} failed: {}, using extractive", primary.name(), e),
    }

    Ok(SummaryOutcome {
        text: fallback.summarize(text).await?,
        method: fallback.name().to_string(),
        fell_back: true,
    })
}

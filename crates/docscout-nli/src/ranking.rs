use crate::error::{NliError, Result};
use crate::zero_shot::ZeroShotClassifier;
use docscout_api::truncate_chars;
use docscout_core::models::{sort_by_score_desc, Document, ScoredDocument};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

/// What an article is ranked by
#[derive(Debug, Clone)]
pub enum RankTarget {
    /// Zero-shot probability of `label` among `candidates`
    Label {
        label: String,
        candidates: Vec<String>,
        multi_label: bool,
    },
    /// Entailment probability of a free-form hypothesis
    Hypothesis(String),
}

impl RankTarget {
    /// Rank by one label; `candidates` gains the label if it lacks it
    pub fn label(label: impl Into<String>, mut candidates: Vec<String>, multi_label: bool) -> Self {
        let label = label.into();
        if !candidates.contains(&label) {
            candidates.insert(0, label.clone());
        }
        RankTarget::Label {
            label,
            candidates,
            multi_label,
        }
    }
}

/// Orders news articles by how well they match a target
pub struct NewsRanker {
    classifier: ZeroShotClassifier,
    max_chars: usize,
    concurrency: usize,
}

impl NewsRanker {
    pub fn new(classifier: ZeroShotClassifier) -> Self {
        Self {
            classifier,
            max_chars: 3000,
            concurrency: 2,
        }
    }

    /// Characters of article text sent to the model
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Articles scored at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Text an article is judged on: title plus summary
    pub fn article_text(&self, doc: &Document) -> String {
        let mut text = doc.title.trim().to_string();
        if let Some(summary) = doc.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !text.is_empty() {
                text.push_str(". ");
            }
            text.push_str(summary);
        }
        truncate_chars(&text, self.max_chars).to_string()
    }

    /// Score every article, best first
    ///
    /// An article the model fails on is kept with score 0.0 and no label.
    pub async fn rank(&self, docs: Vec<Document>, target: &RankTarget) -> Result<Vec<ScoredDocument>> {
        if let RankTarget::Label { candidates, .. } = target {
            if candidates.is_empty() {
                return Err(NliError::NoCandidateLabels);
            }
        }

        info!("Ranking {} articles", docs.len());

        let mut results: Vec<ScoredDocument> = stream::iter(docs)
            .map(|doc| async move {
                let text = self.article_text(&doc);
                match self.score(&text, target).await {
                    Ok((score, label)) => ScoredDocument::new(doc, score).with_label(label),
                    Err(e) => {
                        warn!("Could not score {}: {}", doc.doc_id(), e);
                        ScoredDocument::new(doc, 0.0)
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        sort_by_score_desc(&mut results);
        Ok(results)
    }

    async fn score(&self, text: &str, target: &RankTarget) -> Result<(f32, String)> {
        if text.is_empty() {
            return Err(NliError::EmptyInput);
        }

        match target {
            RankTarget::Label {
                label,
                candidates,
                multi_label,
            } => {
                let classification = self.classifier.classify(text, candidates, *multi_label).await?;
                let score = classification.score_of(label).unwrap_or(0.0);
                let best = classification
                    .top()
                    .map(|(l, _)| l.to_string())
                    .unwrap_or_else(|| label.clone());
                Ok((score, best))
            }
            RankTarget::Hypothesis(hypothesis) => {
                let prediction = self.classifier.model().predict(text, hypothesis).await?;
                Ok((prediction.entailment, prediction.label().to_string()))
            }
        }
    }
}

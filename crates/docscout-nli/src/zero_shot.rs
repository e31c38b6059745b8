//! Zero-shot classification by entailment
//!
//! Each candidate label is turned into a hypothesis ("This example is
//! {label}.") and paired with the input as premise. The entailment
//! probabilities become label scores.

use crate::error::{NliError, Result};
use crate::model::{NliModel, NliPrediction};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_HYPOTHESIS_TEMPLATE: &str = "This example is {}.";

/// Label scores for one input, best first
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub sequence: String,
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

impl Classification {
    /// Pair labels with scores and sort descending; ties keep label order
    fn new(sequence: String, labels: &[String], scores: Vec<f32>) -> Self {
        let mut pairs: Vec<(String, f32)> = labels.iter().cloned().zip(scores).collect();
        pairs.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (labels, scores) = pairs.into_iter().unzip();
        Self {
            sequence,
            labels,
            scores,
        }
    }

    pub fn top(&self) -> Option<(&str, f32)> {
        self.labels
            .first()
            .zip(self.scores.first())
            .map(|(l, s)| (l.as_str(), *s))
    }

    pub fn score_of(&self, label: &str) -> Option<f32> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.scores[i])
    }
}

/// Exactly one label is true: entailment probabilities renormalized across labels
///
/// Equivalent to a softmax over log-entailment. If the model gives every
/// label zero entailment the scores are uniform.
pub fn single_label_scores(predictions: &[NliPrediction]) -> Vec<f32> {
    let sum: f32 = predictions.iter().map(|p| p.entailment).sum();
    if sum <= 0.0 {
        let uniform = 1.0 / predictions.len().max(1) as f32;
        return vec![uniform; predictions.len()];
    }
    predictions.iter().map(|p| p.entailment / sum).collect()
}

/// Labels scored independently: entailment against contradiction, neutral ignored
///
/// A pair judged purely neutral scores 0.0.
pub fn multi_label_scores(predictions: &[NliPrediction]) -> Vec<f32> {
    predictions
        .iter()
        .map(|p| {
            let denominator = p.entailment + p.contradiction;
            if denominator > 0.0 {
                p.entailment / denominator
            } else {
                0.0
            }
        })
        .collect()
}

/// Zero-shot text classifier over any NLI model
pub struct ZeroShotClassifier {
    model: Arc<dyn NliModel>,
    template: String,
    concurrency: usize,
}

impl ZeroShotClassifier {
    pub fn new(model: Arc<dyn NliModel>) -> Self {
        Self {
            model,
            template: DEFAULT_HYPOTHESIS_TEMPLATE.to_string(),
            concurrency: 4,
        }
    }

    /// Use a custom hypothesis template; it must contain `{}`
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{}") {
            return Err(NliError::InvalidTemplate(template));
        }
        self.template = template;
        Ok(self)
    }

    /// Maximum label requests in flight at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn model(&self) -> &Arc<dyn NliModel> {
        &self.model
    }

    pub fn hypothesis(&self, label: &str) -> String {
        self.template.replacen("{}", label, 1)
    }

    /// Score every candidate label for `sequence`
    pub async fn classify(
        &self,
        sequence: &str,
        candidate_labels: &[String],
        multi_label: bool,
    ) -> Result<Classification> {
        if candidate_labels.is_empty() {
            return Err(NliError::NoCandidateLabels);
        }

        debug!(
            "Classifying against {} labels (multi_label={})",
            candidate_labels.len(),
            multi_label
        );

        let predictions: Vec<NliPrediction> = stream::iter(candidate_labels)
            .map(|label| {
                let hypothesis = self.hypothesis(label);
                async move { self.model.predict(sequence, &hypothesis).await }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let scores = if multi_label || candidate_labels.len() == 1 {
            multi_label_scores(&predictions)
        } else {
            single_label_scores(&predictions)
        };

        Ok(Classification::new(sequence.to_string(), candidate_labels, scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockNliModel;

    fn p(e: f32, n: f32, c: f32) -> NliPrediction {
        NliPrediction::new(e, n, c).unwrap()
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn mock_with(entailments: &'static [(&'static str, f32)]) -> MockNliModel {
        let mut mock = MockNliModel::new();
        mock.expect_predict().returning(move |_, hypothesis| {
            let e = entailments
                .iter()
                .find(|(label, _)| hypothesis.contains(label))
                .map(|(_, e)| *e)
                .unwrap_or(0.0);
            NliPrediction::new(e, 0.0, 1.0 - e)
        });
        mock
    }

    #[test]
    fn test_single_label_scores_sum_to_one() {
        let scores = single_label_scores(&[p(0.9, 0.05, 0.05), p(0.3, 0.3, 0.4), p(0.0, 1.0, 0.0)]);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((scores[0] - 0.75).abs() < 1e-5);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_single_label_all_zero_is_uniform() {
        let scores = single_label_scores(&[p(0.0, 1.0, 0.0), p(0.0, 0.0, 1.0)]);
        assert_eq!(scores, vec![0.5, 0.5]);
    }

    #[test]
    fn test_multi_label_scores_independent() {
        let scores = multi_label_scores(&[p(0.6, 0.2, 0.2), p(0.2, 0.6, 0.2), p(0.0, 1.0, 0.0)]);
        assert!((scores[0] - 0.75).abs() < 1e-5);
        assert!((scores[1] - 0.5).abs() < 1e-5);
        assert_eq!(scores[2], 0.0);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[tokio::test]
    async fn test_classify_sorts_descending() {
        let classifier = ZeroShotClassifier::new(Arc::new(mock_with(&[
            ("politics", 0.2),
            ("sport", 0.7),
            ("business", 0.1),
        ])));

        let result = classifier
            .classify(
                "The striker scored twice",
                &labels(&["politics", "sport", "business"]),
                false,
            )
            .await
            .unwrap();

        assert_eq!(result.labels, vec!["sport", "politics", "business"]);
        assert_eq!(result.top().unwrap().0, "sport");
        let sum: f32 = result.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(result.scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn test_template_is_applied() {
        let mut mock = MockNliModel::new();
        mock.expect_predict().times(1).returning(|premise, hypothesis| {
            assert_eq!(premise, "text");
            assert_eq!(hypothesis, "The topic is science.");
            NliPrediction::new(0.8, 0.1, 0.1)
        });

        let classifier = ZeroShotClassifier::new(Arc::new(mock))
            .with_template("The topic is {}.")
            .unwrap();

        let result = classifier
            .classify("text", &labels(&["science"]), false)
            .await
            .unwrap();
        // A single label is scored on its own, not normalized to 1
        assert!((result.scores[0] - 8.0 / 9.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_labels_rejected() {
        let classifier = ZeroShotClassifier::new(Arc::new(MockNliModel::new()));
        assert!(matches!(
            classifier.classify("text", &[], false).await,
            Err(NliError::NoCandidateLabels)
        ));
    }

    #[test]
    fn test_bad_template_rejected() {
        let result = ZeroShotClassifier::new(Arc::new(MockNliModel::new())).with_template("no slot");
        assert!(matches!(result, Err(NliError::InvalidTemplate(_))));
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let mut mock = MockNliModel::new();
        mock.expect_predict()
            .returning(|_, _| Err(NliError::InvalidOutput("boom".into())));

        let classifier = ZeroShotClassifier::new(Arc::new(mock));
        assert!(classifier
            .classify("text", &labels(&["a", "b"]), true)
            .await
            .is_err());
    }
}

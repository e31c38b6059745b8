use crate::error::{NliError, Result};
use async_trait::async_trait;
use docscout_api::{InferenceClient, LabelScore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relation between a premise and a hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NliLabel {
    Entailment,
    Neutral,
    Contradiction,
}

impl NliLabel {
    /// Dataset order: 0 entailment, 1 neutral, 2 contradiction
    pub const ALL: [NliLabel; 3] = [NliLabel::Entailment, NliLabel::Neutral, NliLabel::Contradiction];

    pub fn index(self) -> usize {
        match self {
            NliLabel::Entailment => 0,
            NliLabel::Neutral => 1,
            NliLabel::Contradiction => 2,
        }
    }

    /// SNLI/MNLI integer label; -1 and anything else unknown is unlabeled
    pub fn from_dataset_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(NliLabel::Entailment),
            1 => Some(NliLabel::Neutral),
            2 => Some(NliLabel::Contradiction),
            _ => None,
        }
    }

    /// Label string as emitted by a hosted classifier
    ///
    /// Generic `LABEL_n` names follow the MNLI head order
    /// (contradiction, neutral, entailment).
    pub fn from_model_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "entailment" | "label_2" => Some(NliLabel::Entailment),
            "neutral" | "label_1" => Some(NliLabel::Neutral),
            "contradiction" | "label_0" => Some(NliLabel::Contradiction),
            _ => None,
        }
    }
}

impl std::fmt::Display for NliLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NliLabel::Entailment => write!(f, "entailment"),
            NliLabel::Neutral => write!(f, "neutral"),
            NliLabel::Contradiction => write!(f, "contradiction"),
        }
    }
}

/// Probabilities for the three NLI classes, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NliPrediction {
    pub entailment: f32,
    pub neutral: f32,
    pub contradiction: f32,
}

impl NliPrediction {
    /// Normalize raw class scores; fails when they can't form a distribution
    pub fn new(entailment: f32, neutral: f32, contradiction: f32) -> Result<Self> {
        let scores = [entailment, neutral, contradiction];
        if scores.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(NliError::InvalidOutput(format!("{:?}", scores)));
        }

        let sum: f32 = scores.iter().sum();
        if sum <= 0.0 {
            return Err(NliError::InvalidOutput("all class scores are zero".into()));
        }

        Ok(Self {
            entailment: entailment / sum,
            neutral: neutral / sum,
            contradiction: contradiction / sum,
        })
    }

    /// Build from a classifier's label scores; missing classes count as 0
    pub fn from_scores(scores: &[LabelScore]) -> Result<Self> {
        let mut probs = [0.0f32; 3];
        let mut matched = false;

        for score in scores {
            match NliLabel::from_model_label(&score.label) {
                Some(label) => {
                    probs[label.index()] += score.score;
                    matched = true;
                }
                None => debug!("Ignoring unknown label {}", score.label),
            }
        }

        if !matched {
            let labels: Vec<_> = scores.iter().map(|s| s.label.as_str()).collect();
            return Err(NliError::InvalidOutput(format!(
                "no NLI labels in {:?}",
                labels
            )));
        }

        Self::new(probs[0], probs[1], probs[2])
    }

    pub fn probability(&self, label: NliLabel) -> f32 {
        match label {
            NliLabel::Entailment => self.entailment,
            NliLabel::Neutral => self.neutral,
            NliLabel::Contradiction => self.contradiction,
        }
    }

    /// Most likely class; ties go to the earlier class in dataset order
    pub fn label(&self) -> NliLabel {
        let mut best = NliLabel::Entailment;
        for label in NliLabel::ALL {
            if self.probability(label) > self.probability(best) {
                best = label;
            }
        }
        best
    }
}

/// A premise/hypothesis classifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NliModel: Send + Sync {
    fn name(&self) -> String;

    async fn predict(&self, premise: &str, hypothesis: &str) -> Result<NliPrediction>;

    /// Predict several pairs in order, stopping at the first failure
    async fn predict_batch(&self, pairs: &[(String, String)]) -> Result<Vec<NliPrediction>> {
        let mut predictions = Vec::with_capacity(pairs.len());
        for (premise, hypothesis) in pairs {
            predictions.push(self.predict(premise, hypothesis).await?);
        }
        Ok(predictions)
    }
}

/// NLI model served by the hosted inference API
pub struct RemoteNliModel {
    client: InferenceClient,
    model: String,
}

impl RemoteNliModel {
    pub fn new(client: InferenceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl NliModel for RemoteNliModel {
    fn name(&self) -> String {
        self.model.clone()
    }

    async fn predict(&self, premise: &str, hypothesis: &str) -> Result<NliPrediction> {
        let scores = self
            .client
            .classify_pair(&self.model, premise, hypothesis)
            .await?;
        NliPrediction::from_scores(&scores)
    }
}

use crate::model::{NliLabel, NliModel};
use docscout_api::NliRow;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// One premise/hypothesis pair with its gold label, if it has one
#[derive(Debug, Clone, PartialEq)]
pub struct NliExample {
    pub premise: String,
    pub hypothesis: String,
    pub label: Option<NliLabel>,
}

impl From<NliRow> for NliExample {
    fn from(row: NliRow) -> Self {
        Self {
            label: NliLabel::from_dataset_label(row.label),
            premise: row.premise,
            hypothesis: row.hypothesis,
        }
    }
}

pub fn examples_from_rows(rows: Vec<NliRow>) -> Vec<NliExample> {
    rows.into_iter().map(NliExample::from).collect()
}

/// Accuracy and per-class metrics over an evaluation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    /// Examples the model was scored on
    pub total: usize,
    pub correct: usize,
    /// Examples without a gold label
    pub skipped: usize,
    /// Examples the model failed to answer
    pub failed: usize,
    /// `confusion[gold][predicted]`, indexed by [`NliLabel::index`]
    pub confusion: [[usize; 3]; 3],
}

impl EvaluationReport {
    pub fn record(&mut self, gold: NliLabel, predicted: NliLabel) {
        self.total += 1;
        if gold == predicted {
            self.correct += 1;
        }
        self.confusion[gold.index()][predicted.index()] += 1;
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    /// Of the pairs predicted as `label`, the share that were
    pub fn precision(&self, label: NliLabel) -> f64 {
        let i = label.index();
        let predicted: usize = self.confusion.iter().map(|row| row[i]).sum();
        if predicted == 0 {
            return 0.0;
        }
        self.confusion[i][i] as f64 / predicted as f64
    }

    /// Of the pairs labeled `label`, the share predicted as such
    pub fn recall(&self, label: NliLabel) -> f64 {
        let i = label.index();
        let actual: usize = self.confusion[i].iter().sum();
        if actual == 0 {
            return 0.0;
        }
        self.confusion[i][i] as f64 / actual as f64
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "accuracy: {:.4} ({}/{}), skipped: {}, failed: {}",
            self.accuracy(),
            self.correct,
            self.total,
            self.skipped,
            self.failed
        )?;
        writeln!(f, "{:<15}{:>10}{:>10}", "label", "precision", "recall")?;
        for label in NliLabel::ALL {
            writeln!(
                f,
                "{:<15}{:>10.4}{:>10.4}",
                label.to_string(),
                self.precision(label),
                self.recall(label)
            )?;
        }
        Ok(())
    }
}

/// Run `model` over every labeled example
///
/// Unlabeled examples are skipped. A failed prediction is logged and
/// counted in `failed`, not in `total`.
pub async fn evaluate(model: &dyn NliModel, examples: &[NliExample]) -> EvaluationReport {
    let mut report = EvaluationReport::default();

    info!("Evaluating {} on {} examples", model.name(), examples.len());

    for (i, example) in examples.iter().enumerate() {
        let Some(gold) = example.label else {
            report.skipped += 1;
            continue;
        };

        match model.predict(&example.premise, &example.hypothesis).await {
            Ok(prediction) => report.record(gold, prediction.label()),
            Err(e) => {
                warn!("Example {} failed: {}", i, e);
                report.failed += 1;
            }
        }

        if (i + 1) % 100 == 0 {
            debug!("{} examples done, running accuracy {:.4}", i + 1, report.accuracy());
        }
    }

    info!(
        "Accuracy {:.4} over {} examples ({} skipped, {} failed)",
        report.accuracy(),
        report.total,
        report.skipped,
        report.failed
    );
    report
}

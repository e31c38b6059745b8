// Natural language inference for DocScout
//
// NLI predictions from a hosted model, zero-shot classification built on
// them, article ranking, summarization and evaluation against labeled pairs.

pub mod error;
pub mod eval;
pub mod model;
pub mod ranking;
pub mod summarize;
pub mod zero_shot;

pub use error::{NliError, Result};
pub use eval::{evaluate, examples_from_rows, EvaluationReport, NliExample};
pub use model::{NliLabel, NliModel, NliPrediction, RemoteNliModel};
pub use ranking::{NewsRanker, RankTarget};
pub use summarize::{
    summarize_with_fallback, ExtractiveSummarizer, RemoteSummarizer, Summarizer, SummaryOutcome,
};
pub use zero_shot::{Classification, ZeroShotClassifier, DEFAULT_HYPOTHESIS_TEMPLATE};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NliError>;

#[derive(Error, Debug)]
pub enum NliError {
    #[error("Inference request failed: {0}")]
    ApiError(#[from] docscout_api::ApiError),

    #[error("At least one candidate label is required")]
    NoCandidateLabels,

    #[error("Hypothesis template has no {{}} placeholder: {0}")]
    InvalidTemplate(String),

    #[error("Model returned unusable scores: {0}")]
    InvalidOutput(String),

    #[error("Nothing to summarize")]
    EmptyInput,
}

use shared_types::MergeSelectionError;
use thiserror::Error;

/// Failure of an operation at the component boundary.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid merge selection: {0}")]
    InvalidSelection(#[from] MergeSelectionError),

    #[error("Contact store error: {0}")]
    Store(#[from] anyhow::Error),
}

pub type IntakeResult<T> = Result<T, IntakeError>;

use crate::domain::step::StepId;
use crate::domain::submission::SubmissionErrorKind;
use crate::domain::validation::FieldViolation;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Unknown step: {0}")]
    UnknownStep(StepId),
    #[error("Invalid step registry: {0}")]
    InvalidRegistry(String),
    #[error("Validation failed for {} field(s)", .0.len())]
    ValidationFailed(BTreeSet<FieldViolation>),
    #[error("Cannot {action} from step '{step}'")]
    IllegalTransition { action: &'static str, step: StepId },
    #[error("Workflow already completed")]
    WorkflowCompleted,
    #[error("Workflow aborted")]
    WorkflowAborted,
    #[error("A submission is already in progress")]
    SubmissionAlreadyInProgress,
    #[error("Submission failed ({kind}), retryable: {retryable}")]
    SubmissionFailed {
        kind: SubmissionErrorKind,
        retryable: bool,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// True for misuse of a workflow that already reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutError::WorkflowCompleted | CheckoutError::WorkflowAborted
        )
    }

    /// True for failures the user can recover from in the same workflow.
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckoutError::ValidationFailed(_) | CheckoutError::SubmissionAlreadyInProgress => {
                true
            }
            CheckoutError::SubmissionFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for CheckoutError {
    fn from(e: rocksdb::Error) -> Self {
        CheckoutError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;

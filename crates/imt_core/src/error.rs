use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::ValidationFailure;

/// Structured infrastructure error shared by the store, database, config and export layers.
///
/// `code` is stable and machine-matchable (`DB_WRITE_FAILED`, `CONFIG_INVALID`, ...);
/// `details` carries the underlying cause as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Shorthand for wrapping a foreign error as the `details` of a coded error.
    pub fn wrap(code: &str, message: &str, cause: impl fmt::Display) -> Self {
        Self::new(code, message).with_details(cause.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Outcome of a failed submission.
///
/// Validation failures are user-correctable; persistence failures carry the store's error;
/// cancellation is distinct from both and leaves the draft resubmittable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("draft failed validation: {0}")]
    Validation(ValidationFailure),

    #[error("failed to persist incident: {0}")]
    Persistence(AppError),

    #[error("submission cancelled")]
    Cancelled,

    #[error("submit is only available on the final step (on step {step} of {total})")]
    NotOnFinalStep { step: u8, total: u8 },
}

impl SubmitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubmitError::Cancelled)
    }

    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            SubmitError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ValidationFailure> for SubmitError {
    fn from(failure: ValidationFailure) -> Self {
        SubmitError::Validation(failure)
    }
}

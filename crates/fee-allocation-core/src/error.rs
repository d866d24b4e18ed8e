use rust_decimal::Decimal;
use thiserror::Error;

#[cfg(feature = "allocation")]
use crate::allocation::validation::ValidationError;

#[derive(Debug, Error)]
pub enum FeeAllocationError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[cfg(feature = "allocation")]
    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error("Confirmation mismatch: entered {entered}, expected {expected}")]
    ConfirmationMismatch { expected: Decimal, entered: String },

    #[error("Payment submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Operation '{operation}' is not allowed while {state}")]
    InvalidState { operation: String, state: String },

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[cfg(feature = "allocation")]
fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for FeeAllocationError {
    fn from(e: serde_json::Error) -> Self {
        FeeAllocationError::SerializationError(e.to_string())
    }
}

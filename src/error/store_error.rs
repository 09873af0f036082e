use thiserror::Error;

/// Fatal errors for direct variable-store calls.
///
/// Everything else the engine reports travels as a [`super::Diagnostic`]
/// next to the primary result; only these variants propagate as `Err`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid value type: {0}")]
    InvalidValueType(String),
    #[error("Variable quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

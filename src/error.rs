//! Error types for the fulfillment service

use thiserror::Error;

/// Result type alias for fulfillment operations
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[derive(Error, Debug)]
pub enum FulfillmentError {

    // =============================
    // Core Turn Errors
    // =============================

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Handler not found for intent: {0}")]
    HandlerNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FulfillmentError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        FulfillmentError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

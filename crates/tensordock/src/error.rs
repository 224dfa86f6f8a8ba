//! Error taxonomy for TensorDock API calls.

use thiserror::Error;

/// Message used when the API reports failure without saying why.
pub const GENERIC_API_ERROR: &str = "endpoint returned error";

/// Errors that can occur while talking to the TensorDock API.
#[derive(Error, Debug)]
pub enum TensorDockError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// Response body was not a JSON object.
    #[error("Unparseable API response: {0}")]
    Normalization(String),

    /// Request rejected locally before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// API answered with `success: false`.
    #[error("API error: {0}")]
    Api(String),

    /// Normalized response did not match the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TensorDockError {
    /// Build an [`TensorDockError::Api`] from the envelope's `error` field.
    pub(crate) fn api(message: &str) -> Self {
        if message.trim().is_empty() {
            Self::Api(GENERIC_API_ERROR.to_string())
        } else {
            Self::Api(message.to_string())
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = TensorDockError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_falls_back_to_generic_message() {
        assert_eq!(
            TensorDockError::api("").to_string(),
            "API error: endpoint returned error"
        );
        assert_eq!(
            TensorDockError::api("insufficient balance").to_string(),
            "API error: insufficient balance"
        );
    }
}

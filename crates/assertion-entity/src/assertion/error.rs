//! Structured last-error payload stored on an assertion.

use serde::{Deserialize, Serialize};

use assertion_core::error::{AppError, ErrorKind};

/// The registry's rejection of the last sync attempt, or a synthetic
/// code 0 entry for transport failures and timeouts.
///
/// Stored as `{"statusCode": <int>, "error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrcidError {
    /// HTTP status code returned by the registry, `0` when none was received.
    #[serde(rename = "statusCode")]
    pub status_code: i32,
    /// Error body or exception message.
    pub error: String,
}

impl OrcidError {
    /// Create a payload for a registry response.
    pub fn new(status_code: i32, error: impl Into<String>) -> Self {
        Self {
            status_code,
            error: error.into(),
        }
    }

    /// Create a payload for a failure that never produced a registry response.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Serialize to the stored JSON document.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored JSON document.
    ///
    /// Both fields are required; anything else means the stored payload was
    /// not written by the sync path and is reported as an internal error.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|e| {
            AppError::with_source(
                ErrorKind::Internal,
                format!("Malformed stored registry error payload: {raw}"),
                e,
            )
        })
    }
}

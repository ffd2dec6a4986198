//! Registry client errors.

use assertion_entity::assertion::OrcidError;

/// Failure of a registry call.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry answered with a non-success status.
    #[error("registry returned {status_code}: {error}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        error: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("registry request timed out")]
    Timeout,

    /// The request could not be sent or the connection failed.
    #[error("registry request failed: {0}")]
    Transport(String),

    /// The registry answered successfully but the response was unusable.
    #[error("unexpected registry response: {0}")]
    Decode(String),
}

impl RegistryError {
    /// The payload stored on the assertion for this failure.
    ///
    /// Registry rejections keep their status code; everything else is
    /// recorded with code 0.
    pub fn to_orcid_error(&self) -> OrcidError {
        match self {
            Self::Api { status_code, error } => OrcidError::new(i32::from(*status_code), error.clone()),
            other => OrcidError::transient(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

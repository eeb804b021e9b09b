//! Errors raised by remote calls

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("parsing {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        operation: &'static str,
        kind: &'static str,
    },
}

impl ApiError {
    pub fn decode(what: &'static str, source: serde_json::Error) -> Self {
        ApiError::Decode { what, source }
    }

    /// Returns true if the remote reported the record as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. } | ApiError::Status { status: 404, .. })
    }
}

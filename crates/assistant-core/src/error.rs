//! # Error Types
//!
//! Errors raised by the session API client and the chat state store.

use thiserror::Error;

/// Session / chat API error
#[derive(Error, Debug)]
pub enum ApiError {
    /// Server answered with a non-2xx status
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// Connection, DNS, timeout and other transport failures
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body is not the expected JSON shape
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request rejected by the mock backend
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Create a rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Transport-level failure (everything except a malformed body)
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    /// HTTP status, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Chat state store error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Chat id is not in the chat list
    #[error("Chat not found: {id}")]
    UnknownChat { id: String },
}

impl StoreError {
    pub fn unknown_chat(id: impl Into<String>) -> Self {
        Self::UnknownChat { id: id.into() }
    }
}

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

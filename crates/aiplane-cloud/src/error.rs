//! Core error types
//!
//! Operational failures during reconciliation are reported as
//! [`Diagnostic`](crate::Diagnostic) values. `CloudError` covers the
//! remaining construction and input errors.

use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Invalid resource identity '{id}': {reason}")]
    InvalidIdentity { id: String, reason: String },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;

//! OpenAI provider error types
//!
//! These cover provider construction only. Failures of individual API
//! calls are reported as [`aiplane_cloud::Diagnostic`] values.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] aiplane_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, OpenAiError>;

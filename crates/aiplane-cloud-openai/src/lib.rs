//! OpenAI platform provider for aiplane
//!
//! Implements [`aiplane_cloud::ResourceApi`] against the OpenAI REST API:
//! organization projects, users, invites, API keys, service accounts,
//! files, fine-tuning jobs, batches, assistants and vector stores.
//!
//! # Features
//!
//! - Per-credential client-side rate limiting (GCRA, via `governor`)
//! - Retries for 429/5xx/connect failures with exponential backoff and jitter
//! - `Retry-After` / `retry-after-ms` honoured as a lower bound on the wait
//! - Error bodies classified once into [`aiplane_cloud::RemoteErrorKind`]
//!
//! # Example
//!
//! ```ignore
//! use aiplane_cloud::{CredentialConfig, CredentialRouter, Reconciler};
//! use aiplane_cloud_openai::{EngineConfig, OpenAiProvider};
//! use std::sync::Arc;
//!
//! let provider = OpenAiProvider::new(EngineConfig::default())?;
//! let router = CredentialRouter::new(CredentialConfig::default());
//! let reconciler = Reconciler::new(Arc::new(provider), router);
//! ```

pub mod catalog;
pub mod engine;
pub mod error;
pub mod limiter;
pub mod provider;
pub mod retry;
pub mod transport;

pub use catalog::{DeleteStyle, Endpoint, endpoints};
pub use engine::{ApiRequest, ApiResponse, DEFAULT_BASE_URL, EngineConfig, ExecutionEngine, Intent};
pub use error::{OpenAiError, Result};
pub use limiter::{RateLimitConfig, SharedLimiter};
pub use provider::OpenAiProvider;
pub use retry::{RetryPolicy, parse_retry_after};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
};

//! HTTP execution engine
//!
//! Turns an [`ApiRequest`] into HTTP attempts: waits on the shared limiter,
//! retries 429/5xx/transport failures with backoff, and classifies every
//! failure into a [`Diagnostic`].

use crate::limiter::{RateLimitConfig, SharedLimiter};
use crate::retry::{RetryPolicy, parse_retry_after};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use aiplane_cloud::{Credential, Diagnostic, DiagnosticCode, RemoteErrorKind};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const NON_JSON_HINT: &str =
    "the response was not JSON; the base URL or the credential is probably wrong";

/// Engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Versioned API base, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub organization: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// What a request does; decides how a 404 is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Read,
    Write,
    /// A 404 means the object is already gone
    Delete,
}

/// One logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path below the versioned base, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub intent: Intent,
    /// Resource identity for diagnostics (`type:id`)
    pub resource: Option<String>,
    /// Extra headers, e.g. beta opt-ins
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>, intent: Intent) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            intent,
            resource: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, Intent::Read)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path, Intent::Write)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path, Intent::Delete)
    }

    /// Whether resending after an ambiguous failure is harmless.
    pub fn is_idempotent(&self) -> bool {
        !(self.method == HttpMethod::Post && self.intent == Intent::Write)
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Successful API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` for empty bodies
    pub body: Value,
    /// Set when a delete found the object already gone
    pub gone: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Executes API calls with retry, backoff and shared rate limiting
pub struct ExecutionEngine {
    transport: Arc<dyn HttpTransport>,
    config: EngineConfig,
    limiter: SharedLimiter,
    abort: CancellationToken,
}

impl ExecutionEngine {
    pub fn new(transport: Arc<dyn HttpTransport>, config: EngineConfig) -> Self {
        let limiter = SharedLimiter::new(&config.rate_limit);
        Self {
            transport,
            config,
            limiter,
            abort: CancellationToken::new(),
        }
    }

    /// Share an abort token with the rest of the run.
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }

    /// Share a limiter with other engines.
    pub fn with_limiter(mut self, limiter: SharedLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn limiter(&self) -> &SharedLimiter {
        &self.limiter
    }

    /// Execute one logical call, retrying retryable failures.
    pub async fn execute(
        &self,
        credential: &Credential,
        request: ApiRequest,
    ) -> Result<ApiResponse, Diagnostic> {
        let label = request.resource.clone().unwrap_or_else(|| request.path.clone());
        let http = self
            .build(credential, &request)
            .map_err(|d| d.for_resource(&label))?;
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter
                .acquire(credential.fingerprint(), &self.abort)
                .await
                .map_err(|d| d.for_resource(&label))?;

            tracing::debug!(
                "{} {} (attempt {}/{})",
                request.method,
                request.path,
                attempt,
                max_attempts
            );

            let (failure, retry_after) = match self.transport.send(http.clone()).await {
                Ok(response) if response.is_success() => {
                    return parse_success(response, credential.token())
                        .map_err(|d| d.for_resource(&label));
                }
                Ok(response) if response.status == 404 && request.intent == Intent::Delete => {
                    tracing::debug!("{} {} returned 404, already gone", request.method, request.path);
                    return Ok(ApiResponse {
                        status: 404,
                        body: Value::Null,
                        gone: true,
                    });
                }
                Ok(response) => {
                    let retry_after = parse_retry_after(&response.headers, Utc::now());
                    (classify(&response, credential.token()), retry_after)
                }
                Err(err) if err.is_in_flight() && !request.is_idempotent() => {
                    tracing::warn!(
                        "{} {} failed after sending, not retrying: {}",
                        request.method,
                        request.path,
                        err
                    );
                    return Err(Diagnostic::fatal(
                        DiagnosticCode::ServerError,
                        format!(
                            "{}; the server may have applied the request, check before running again",
                            err
                        ),
                    )
                    .with_resource(&label));
                }
                Err(err) => (transport_failure(&err), None),
            };
            let failure = failure.for_resource(&label);

            if !failure.retryable() {
                return Err(failure);
            }
            if attempt >= max_attempts {
                tracing::warn!(
                    "{} {} failed after {} attempts: {}",
                    request.method,
                    request.path,
                    attempt,
                    failure.message
                );
                let message = format!("giving up after {} attempts: {}", attempt, failure.message);
                return Err(Diagnostic { message, ..failure });
            }

            let delay = self.config.retry.delay_for(attempt - 1, retry_after);
            tracing::warn!(
                "{} {} failed with {} (attempt {}/{}), retrying in {:?}",
                request.method,
                request.path,
                failure.code,
                attempt,
                max_attempts,
                delay
            );
            tokio::select! {
                _ = self.abort.cancelled() => {
                    return Err(Diagnostic::fatal(
                        DiagnosticCode::Aborted,
                        format!("aborted while backing off from {} {}", request.method, request.path),
                    )
                    .with_resource(&label));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn build(&self, credential: &Credential, request: &ApiRequest) -> Result<HttpRequest, Diagnostic> {
        let base = self.config.base_url.trim_end_matches('/');
        let raw = format!("{}{}", base, request.path);
        let url = reqwest::Url::parse_with_params(&raw, &request.query).map_err(|e| {
            Diagnostic::fatal(
                DiagnosticCode::InvalidRequest,
                format!("invalid request URL '{}': {}", raw, e),
            )
        })?;

        let mut http = HttpRequest::new(request.method, url.to_string())
            .with_header("authorization", format!("Bearer {}", credential.token()))
            .with_header("accept", "application/json")
            .with_timeout(self.config.timeout);
        if let Some(org) = &self.config.organization {
            http = http.with_header("openai-organization", org);
        }
        for (name, value) in &request.headers {
            http = http.with_header(name, value);
        }
        if let Some(body) = &request.body {
            let body = serde_json::to_string(body).map_err(|e| {
                Diagnostic::fatal(DiagnosticCode::InvalidRequest, format!("unserializable body: {}", e))
            })?;
            http = http
                .with_header("content-type", "application/json")
                .with_body(body);
        }
        Ok(http)
    }
}

fn parse_success(response: HttpResponse, secret: &str) -> Result<ApiResponse, Diagnostic> {
    if response.body.trim().is_empty() {
        return Ok(ApiResponse {
            status: response.status,
            body: Value::Null,
            gone: false,
        });
    }
    match serde_json::from_str(&response.body) {
        Ok(body) => Ok(ApiResponse {
            status: response.status,
            body,
            gone: false,
        }),
        Err(_) => Err(Diagnostic::fatal(DiagnosticCode::UnexpectedResponseFormat, NON_JSON_HINT)
            .with_status(response.status)
            .with_body(&response.body, Some(secret))),
    }
}

/// Classify a non-success response.
fn classify(response: &HttpResponse, secret: &str) -> Diagnostic {
    let status = response.status;
    let envelope = serde_json::from_str::<ErrorEnvelope>(&response.body).ok();

    let code = match status {
        401 | 403 => DiagnosticCode::PermissionDenied,
        404 => DiagnosticCode::NotFound,
        429 => DiagnosticCode::RateLimited,
        s if s >= 500 => DiagnosticCode::ServerError,
        _ => DiagnosticCode::InvalidRequest,
    };

    let Some(ErrorEnvelope { error }) = envelope else {
        let code = if code.retryable() {
            code
        } else {
            DiagnosticCode::UnexpectedResponseFormat
        };
        let message = if code.retryable() {
            format!("HTTP {}", status)
        } else {
            NON_JSON_HINT.to_string()
        };
        return Diagnostic::fatal(code, message)
            .with_status(status)
            .with_body(&response.body, Some(secret));
    };

    let remote = remote_kind(status, &error);
    let message = error
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status));

    Diagnostic::fatal(code, message)
        .with_status(status)
        .with_body(&response.body, Some(secret))
        .with_remote(remote)
}

/// Map the error body onto a [`RemoteErrorKind`]. This is the only place
/// that inspects error wording.
fn remote_kind(status: u16, error: &ErrorBody) -> RemoteErrorKind {
    if status == 404 {
        return RemoteErrorKind::ResourceGone;
    }

    let code = error.code().unwrap_or_default().to_ascii_lowercase();
    let kind = error.kind.clone().unwrap_or_default().to_ascii_lowercase();
    let message = error.message.clone().unwrap_or_default().to_ascii_lowercase();

    const TERMINAL_PHRASES: &[&str] = &[
        "already accepted",
        "already been accepted",
        "already been deleted",
        "already archived",
        "already been archived",
        "already completed",
        "already been cancelled",
        "already cancelled",
        "already finished",
        "cannot cancel",
        "cannot be cancelled",
    ];
    if code.contains("already_accepted")
        || code.contains("terminal")
        || TERMINAL_PHRASES.iter().any(|p| message.contains(p))
    {
        return RemoteErrorKind::TerminalState;
    }
    if code.contains("not_found") || message.contains("does not exist") || message.contains("no such") {
        return RemoteErrorKind::ResourceGone;
    }
    if status == 409 || code.contains("conflict") || kind.contains("conflict") {
        return RemoteErrorKind::Conflict;
    }
    RemoteErrorKind::Unclassified
}

fn transport_failure(err: &TransportError) -> Diagnostic {
    if err.retryable() {
        Diagnostic::fatal(DiagnosticCode::ServerError, err.message().to_string())
    } else {
        Diagnostic::fatal(DiagnosticCode::InvalidRequest, err.message().to_string())
    }
}

//! Structured diagnostics
//!
//! Every failure surfaced by the engine, poller, iterator or reconciler is a
//! [`Diagnostic`]. Diagnostics are collected rather than short-circuited so a
//! batch run reports every failure, not just the first one.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Maximum number of body characters retained on a diagnostic.
pub const MAX_BODY_CHARS: usize = 512;

const REDACTED: &str = "[REDACTED]";

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    Warning,
    Info,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    MissingCredential,
    PermissionDenied,
    RateLimited,
    ServerError,
    InvalidRequest,
    UnexpectedResponseFormat,
    PaginationLoop,
    InvalidStateTransition,
    TimedOut,
    NotFound,
    /// An async job reached a terminal state other than `succeeded`.
    OperationFailed,
    /// The caller aborted the run while a call was waiting.
    Aborted,
}

impl DiagnosticCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::PermissionDenied => "permission_denied",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidRequest => "invalid_request",
            Self::UnexpectedResponseFormat => "unexpected_response_format",
            Self::PaginationLoop => "pagination_loop",
            Self::InvalidStateTransition => "invalid_state_transition",
            Self::TimedOut => "timed_out",
            Self::NotFound => "not_found",
            Self::OperationFailed => "operation_failed",
            Self::Aborted => "aborted",
        }
    }

    /// Retryable kinds are retried inside the execution engine and only
    /// surface once attempts are exhausted.
    pub const fn retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }
}

impl Display for DiagnosticCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a remote API error body.
///
/// Produced once by the provider's execution engine so callers match on
/// variants instead of error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The object no longer exists.
    ResourceGone,
    /// The object reached a state in which it can no longer be deleted
    /// (for example an invite that was already accepted).
    TerminalState,
    /// The request conflicts with current remote state.
    Conflict,
    Unclassified,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,

    /// Resource identity this diagnostic belongs to (type:id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// HTTP status code, for HTTP failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Truncated, redacted response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteErrorKind>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            resource: None,
            status: None,
            body: None,
            remote: None,
        }
    }

    pub fn fatal(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, code, message)
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach the resource identity unless one is already set.
    pub fn for_resource(mut self, resource: &str) -> Self {
        if self.resource.is_none() {
            self.resource = Some(resource.to_string());
        }
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a response body, truncated and with `secret` removed.
    pub fn with_body(mut self, body: &str, secret: Option<&str>) -> Self {
        self.body = Some(sanitize_body(body, secret));
        self
    }

    pub fn with_remote(mut self, remote: RemoteErrorKind) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Convert to a warning, keeping every other field.
    pub fn downgrade(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub const fn retryable(&self) -> bool {
        self.code.retryable()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code)?;
        if let Some(resource) = &self.resource {
            write!(f, " {}", resource)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Count fatal diagnostics in a slice.
pub fn fatal_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_fatal()).count()
}

fn sanitize_body(body: &str, secret: Option<&str>) -> String {
    let redacted = match secret {
        Some(secret) if !secret.is_empty() => body.replace(secret, REDACTED),
        _ => body.to_string(),
    };
    if redacted.chars().count() <= MAX_BODY_CHARS {
        return redacted;
    }
    let mut truncated: String = redacted.chars().take(MAX_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_codes() {
        assert!(DiagnosticCode::RateLimited.retryable());
        assert!(DiagnosticCode::ServerError.retryable());
        assert!(!DiagnosticCode::InvalidRequest.retryable());
        assert!(!DiagnosticCode::PermissionDenied.retryable());
    }

    #[test]
    fn test_body_is_truncated_and_redacted() {
        let body = format!("token sk-secret-123 {}", "x".repeat(1000));
        let diag = Diagnostic::fatal(DiagnosticCode::ServerError, "boom")
            .with_body(&body, Some("sk-secret-123"));

        let stored = diag.body.unwrap();
        assert!(!stored.contains("sk-secret-123"));
        assert!(stored.contains("[REDACTED]"));
        assert!(stored.ends_with("..."));
        assert_eq!(stored.chars().count(), MAX_BODY_CHARS + 3);
    }

    #[test]
    fn test_downgrade_keeps_code() {
        let diag = Diagnostic::fatal(DiagnosticCode::PermissionDenied, "denied")
            .with_status(403)
            .downgrade();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.code, DiagnosticCode::PermissionDenied);
        assert_eq!(diag.status, Some(403));
    }

    #[test]
    fn test_display() {
        let diag = Diagnostic::fatal(DiagnosticCode::NotFound, "no such project")
            .with_resource("project:proj_1")
            .with_status(404);
        assert_eq!(
            diag.to_string(),
            "fatal [not_found] project:proj_1: no such project (HTTP 404)"
        );
    }

    #[test]
    fn test_for_resource_does_not_overwrite() {
        let diag = Diagnostic::fatal(DiagnosticCode::NotFound, "gone")
            .with_resource("invite:inv_1")
            .for_resource("invite:other");
        assert_eq!(diag.resource.as_deref(), Some("invite:inv_1"));
    }
}

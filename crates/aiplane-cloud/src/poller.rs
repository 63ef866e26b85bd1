//! Async operation polling
//!
//! One poller serves every async resource type (fine-tuning jobs, batches,
//! vector store ingestion). Status strings are normalised into
//! [`OperationStatus`], whose transitions must be monotone.

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::state::AttributeMap;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Normalised status of a long-running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Validating,
    Queued,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
}

impl OperationStatus {
    /// Parse a wire status, including the per-resource aliases.
    pub fn parse(raw: &str) -> Option<Self> {
        let status = match raw {
            "validating" | "validating_files" => Self::Validating,
            "queued" | "pending" => Self::Queued,
            "in_progress" | "running" | "finalizing" | "cancelling" => Self::InProgress,
            "succeeded" | "completed" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    fn rank(self) -> u8 {
        match self {
            Self::Validating => 0,
            Self::Queued => 1,
            Self::InProgress => 2,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired => 3,
        }
    }

    /// Whether `next` may follow `self`. Repeating a status is allowed;
    /// terminal statuses only repeat.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl Display for OperationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A long-running remote operation as last observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncOperation {
    pub id: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    /// Latest raw attributes returned by the API
    pub attributes: AttributeMap,
}

impl AsyncOperation {
    /// Build from an API object carrying a `status` field.
    pub fn from_attributes(attributes: AttributeMap) -> Result<Self, Diagnostic> {
        let id = attributes
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Diagnostic::fatal(
                    DiagnosticCode::UnexpectedResponseFormat,
                    "async operation has no `id`",
                )
            })?
            .to_string();
        let raw_status = attributes
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let status = OperationStatus::parse(raw_status).ok_or_else(|| {
            Diagnostic::fatal(
                DiagnosticCode::UnexpectedResponseFormat,
                format!("operation {} has unknown status '{}'", id, raw_status),
            )
        })?;

        let timestamp = |key: &str| attributes.get(key).and_then(|v| v.as_i64());
        let finished_at = ["finished_at", "completed_at", "failed_at", "cancelled_at", "expired_at"]
            .iter()
            .find_map(|key| timestamp(key));

        Ok(Self {
            created_at: timestamp("created_at"),
            finished_at,
            id,
            status,
            attributes,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Poll interval configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub multiplier: u32,
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2,
            max_interval: Duration::from_secs(30),
        }
    }
}

/// Result of waiting on an operation.
///
/// On timeout `operation` is the last observed, non-terminal state and
/// `diagnostic` carries a `TimedOut` warning.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub operation: AsyncOperation,
    pub diagnostic: Option<Diagnostic>,
}

impl PollOutcome {
    pub fn timed_out(&self) -> bool {
        self.diagnostic
            .as_ref()
            .is_some_and(|d| d.code == DiagnosticCode::TimedOut)
    }
}

/// Waits for async operations to reach a terminal status
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
    abort: CancellationToken,
}

impl Poller {
    pub fn new(config: PollConfig, abort: CancellationToken) -> Self {
        Self { config, abort }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `id` until it reaches a terminal status or `timeout` elapses.
    ///
    /// `cancel` is issued once, best effort, on timeout.
    pub async fn await_operation<'a, P, Fut>(
        &self,
        id: &str,
        mut poll: P,
        cancel: Option<BoxFuture<'a, Result<AsyncOperation, Diagnostic>>>,
        timeout: Duration,
    ) -> Result<PollOutcome, Diagnostic>
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = Result<AsyncOperation, Diagnostic>>,
    {
        let deadline = Instant::now() + timeout;
        let mut interval = self.config.initial_interval;
        let mut last: Option<AsyncOperation> = None;

        loop {
            if self.abort.is_cancelled() {
                return Err(aborted(id));
            }

            let current = poll().await?;
            if let Some(previous) = &last {
                if !previous.status.can_transition_to(current.status) {
                    return Err(Diagnostic::fatal(
                        DiagnosticCode::InvalidStateTransition,
                        format!(
                            "operation {} moved from {} to {}",
                            id, previous.status, current.status
                        ),
                    ));
                }
            }
            tracing::debug!("Operation {} is {}", id, current.status);

            if current.is_terminal() {
                tracing::info!("Operation {} finished: {}", id, current.status);
                return Ok(PollOutcome {
                    operation: current,
                    diagnostic: None,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Operation {} still {} after {:?}",
                    id,
                    current.status,
                    timeout
                );
                if let Some(cancel) = cancel {
                    match cancel.await {
                        Ok(op) => tracing::info!("Requested cancellation of {} ({})", id, op.status),
                        Err(err) => tracing::warn!("Cancelling {} failed: {}", id, err),
                    }
                }
                let diagnostic = Diagnostic::warning(
                    DiagnosticCode::TimedOut,
                    format!(
                        "operation {} did not finish within {:?}; last status {}",
                        id, timeout, current.status
                    ),
                );
                return Ok(PollOutcome {
                    operation: current,
                    diagnostic: Some(diagnostic),
                });
            }
            last = Some(current);

            if self.abort.is_cancelled() {
                return Err(aborted(id));
            }
            let wait = interval.min(deadline - now);
            tokio::select! {
                _ = self.abort.cancelled() => return Err(aborted(id)),
                _ = tokio::time::sleep(wait) => {}
            }
            interval = (interval * self.config.multiplier).min(self.config.max_interval);
        }
    }
}

fn aborted(id: &str) -> Diagnostic {
    Diagnostic::fatal(
        DiagnosticCode::Aborted,
        format!("aborted while waiting for operation {}", id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn op(status: &str) -> AsyncOperation {
        let serde_json::Value::Object(attrs) = json!({"id": "ftjob-1", "status": status}) else {
            unreachable!()
        };
        AsyncOperation::from_attributes(attrs).unwrap()
    }

    fn scripted(
        statuses: Vec<AsyncOperation>,
    ) -> (
        Arc<AtomicUsize>,
        impl FnMut() -> std::future::Ready<Result<AsyncOperation, Diagnostic>>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let remaining = Arc::new(Mutex::new(VecDeque::from(statuses)));
        let poll = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut remaining = remaining.lock().unwrap();
            let next = if remaining.len() > 1 {
                remaining.pop_front().unwrap()
            } else {
                remaining.front().cloned().unwrap()
            };
            std::future::ready(Ok(next))
        };
        (calls, poll)
    }

    #[test]
    fn test_status_aliases() {
        assert_eq!(OperationStatus::parse("validating_files"), Some(OperationStatus::Validating));
        assert_eq!(OperationStatus::parse("running"), Some(OperationStatus::InProgress));
        assert_eq!(OperationStatus::parse("finalizing"), Some(OperationStatus::InProgress));
        assert_eq!(OperationStatus::parse("completed"), Some(OperationStatus::Succeeded));
        assert_eq!(OperationStatus::parse("bogus"), None);
    }

    #[test]
    fn test_transitions_are_monotone() {
        use OperationStatus::*;
        assert!(Validating.can_transition_to(Queued));
        assert!(Queued.can_transition_to(InProgress));
        assert!(Queued.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(Succeeded.can_transition_to(Succeeded));

        assert!(!InProgress.can_transition_to(Queued));
        assert!(!Succeeded.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(Succeeded));
    }

    #[test]
    fn test_unknown_status_is_unexpected_format() {
        let serde_json::Value::Object(attrs) = json!({"id": "x", "status": "weird"}) else {
            unreachable!()
        };
        let err = AsyncOperation::from_attributes(attrs).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::UnexpectedResponseFormat);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_succeeded_with_backoff() {
        let mut done = op("succeeded").attributes;
        done.insert("fine_tuned_model".into(), json!("ft:gpt-4o-mini:org::abc"));
        let succeeded = AsyncOperation::from_attributes(done).unwrap();

        let (calls, poll) = scripted(vec![op("queued"), op("in_progress"), succeeded]);
        let poller = Poller::default();

        let start = Instant::now();
        let outcome = poller
            .await_operation("ftjob-1", poll, None, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(outcome.operation.status, OperationStatus::Succeeded);
        assert_eq!(
            outcome.operation.attributes.get("fine_tuned_model"),
            Some(&json!("ft:gpt-4o-mini:org::abc"))
        );
        assert!(outcome.diagnostic.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_and_reports_last_status() {
        let (_, poll) = scripted(vec![op("in_progress")]);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let cancel: BoxFuture<'_, Result<AsyncOperation, Diagnostic>> = Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(op("cancelling"))
        });

        let outcome = Poller::default()
            .await_operation("ftjob-1", poll, Some(cancel), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(outcome.timed_out());
        assert_eq!(outcome.operation.status, OperationStatus::InProgress);
        assert!(!outcome.diagnostic.unwrap().is_fatal());
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_regression_is_invalid_transition() {
        let (_, poll) = scripted(vec![op("in_progress"), op("queued")]);
        let err = Poller::default()
            .await_operation("ftjob-1", poll, None, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::InvalidStateTransition);
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_during_sleep() {
        let (calls, poll) = scripted(vec![op("in_progress")]);
        let token = CancellationToken::new();
        let poller = Poller::new(PollConfig::default(), token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(4500)).await;
            token.cancel();
        });

        let err = poller
            .await_operation("ftjob-1", poll, None, Duration::from_secs(600))
            .await
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Aborted);
        // polls at 0s, 1s and 3s; aborted while sleeping towards 7s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_abort_before_first_poll() {
        let (calls, poll) = scripted(vec![op("queued")]);
        let token = CancellationToken::new();
        token.cancel();
        let err = Poller::new(PollConfig::default(), token)
            .await_operation("ftjob-1", poll, None, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

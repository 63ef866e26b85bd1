//! aiplane core
//!
//! Provider-neutral engine for declaratively managing AI-platform resources
//! (projects, keys, invites, files, fine-tuning jobs, batches, ...).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  aiplane CLI                     │
//! │           (plan / apply / import / list)         │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                aiplane-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │            Lifecycle Reconciler           │   │
//! │  │  plan() / reconcile() / import / list     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐ ┌───────────┐ ┌───────────┐   │
//! │  │  Credential  │ │ Paginator │ │  Poller   │   │
//! │  │    Router    │ │           │ │           │   │
//! │  └──────────────┘ └───────────┘ └───────────┘   │
//! │           trait ResourceApi { ... }             │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ aiplane-cloud- │
//!           │    openai      │
//!           └────────────────┘
//! ```

pub mod action;
pub mod credential;
pub mod diagnostic;
pub mod error;
pub mod pagination;
pub mod poller;
pub mod provider;
pub mod reconciler;
pub mod spec;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use credential::{Credential, CredentialConfig, CredentialRouter, CredentialSource, Scope};
pub use diagnostic::{Diagnostic, DiagnosticCode, RemoteErrorKind, Severity, fatal_count};
pub use error::{CloudError, Result};
pub use pagination::{Page, PageCursor, SortOrder, paginate};
pub use poller::{AsyncOperation, OperationStatus, PollConfig, PollOutcome, Poller};
pub use provider::{CallContext, DeleteOutcome, ResourceApi, ResourceConfig, ResourceSet};
pub use reconciler::{
    DataSourceResult, ReconcileItem, ReconcileOptions, ReconcileReport, Reconciler,
    Reconciliation, plan,
};
pub use spec::{Capabilities, ResourceId, ResourceSpec};
pub use state::{AttributeDiff, AttributeMap, DesiredState, RemoteState, ResourceStatus, diff};

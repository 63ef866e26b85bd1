//! Lifecycle reconciler
//!
//! Maps a desired state and an observed state onto create, update, replace,
//! delete or import calls. Decisions depend only on [`Capabilities`] flags,
//! never on resource type names.
//!
//! [`Capabilities`]: crate::spec::Capabilities

use crate::action::{Action, ActionType, Plan, PlanSummary};
use crate::credential::CredentialRouter;
use crate::diagnostic::{Diagnostic, DiagnosticCode, RemoteErrorKind, fatal_count};
use crate::pagination::{PageCursor, paginate};
use crate::poller::{AsyncOperation, OperationStatus, PollOutcome, Poller};
use crate::provider::{CallContext, DeleteOutcome, ResourceApi};
use crate::spec::{ResourceId, ResourceSpec};
use crate::state::{AttributeDiff, AttributeMap, DesiredState, RemoteState, ResourceStatus, diff};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Tunables for a reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// How long to wait for an async create before reporting a timeout
    pub async_timeout: Duration,
    /// Maximum number of resources reconciled at once
    pub concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            async_timeout: Duration::from_secs(3600),
            concurrency: 4,
        }
    }
}

/// Result of reconciling one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub action: Action,
    pub status: ResourceStatus,
    /// Observed state after the pass; `None` once the resource is absent
    pub state: Option<RemoteState>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reconciliation {
    pub fn is_success(&self) -> bool {
        self.fatal_count() == 0
    }

    pub fn fatal_count(&self) -> usize {
        fatal_count(&self.diagnostics)
    }

    fn failed(action: Action, observed: Option<&RemoteState>, diagnostic: Diagnostic) -> Self {
        Self {
            action,
            status: observed.map_or(ResourceStatus::Absent, |r| r.status),
            state: observed.cloned(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// One entry of a batch run
#[derive(Debug, Clone)]
pub struct ReconcileItem {
    /// Manifest key (`type:name`)
    pub key: String,
    pub spec: ResourceSpec,
    pub desired: Option<DesiredState>,
    pub observed: Option<RemoteState>,
    pub credential: Option<String>,
}

/// Per-resource results of a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub results: Vec<(String, Reconciliation)>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.fatal_count() == 0
    }

    pub fn fatal_count(&self) -> usize {
        self.results.iter().map(|(_, r)| r.fatal_count()).sum()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.results.iter().flat_map(|(_, r)| r.diagnostics.iter())
    }

    pub fn plan(&self) -> Plan {
        Plan::new(self.results.iter().map(|(_, r)| r.action.clone()).collect())
    }

    pub fn summary(&self) -> PlanSummary {
        self.plan().summary()
    }
}

/// Value returned by a data-source read, with any diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceResult<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> DataSourceResult<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// Permission failures become warnings with the fallback value; other
    /// failures stay fatal.
    fn degraded(fallback: T, diagnostic: Diagnostic) -> Self {
        let diagnostic = if diagnostic.code == DiagnosticCode::PermissionDenied {
            tracing::warn!("Read denied, using fallback: {}", diagnostic.message);
            diagnostic.downgrade()
        } else {
            diagnostic
        };
        Self {
            value: fallback,
            diagnostics: vec![diagnostic],
        }
    }
}

/// What the dispatch step produced
struct Outcome {
    status: ResourceStatus,
    state: Option<RemoteState>,
    diagnostics: Vec<Diagnostic>,
}

impl Outcome {
    fn present(state: RemoteState) -> Self {
        Self {
            status: ResourceStatus::Present,
            state: Some(state.with_status(ResourceStatus::Present)),
            diagnostics: Vec::new(),
        }
    }

    fn absent(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            status: ResourceStatus::Absent,
            state: None,
            diagnostics,
        }
    }

    /// Created remotely but not yet settled; a later pass resumes it.
    fn creating(state: RemoteState, diagnostic: Diagnostic) -> Self {
        Self {
            status: ResourceStatus::Creating,
            state: Some(state.with_status(ResourceStatus::Creating)),
            diagnostics: vec![diagnostic],
        }
    }

    fn kept(observed: &RemoteState, diagnostic: Diagnostic) -> Self {
        Self {
            status: observed.status,
            state: Some(observed.clone()),
            diagnostics: vec![diagnostic],
        }
    }

    fn has_fatal(&self) -> bool {
        fatal_count(&self.diagnostics) > 0
    }
}

/// Compute the action for one resource without calling the API.
pub fn plan(
    spec: &ResourceSpec,
    desired: Option<&DesiredState>,
    observed: Option<&RemoteState>,
) -> Action {
    let label = observed.map_or_else(|| spec.type_name.clone(), RemoteState::key);
    let action = |action_type| {
        let action = Action::new(&label, action_type, &spec.type_name);
        match observed {
            Some(r) => action.with_resource_id(r.id.to_string()),
            None => action,
        }
    };

    match (desired, observed) {
        (None, None) => action(ActionType::NoOp).with_description("nothing to do"),
        (Some(_), None) => action(ActionType::Create),
        (None, Some(_)) => action(ActionType::Delete),
        (Some(_), Some(r)) if r.status == ResourceStatus::Creating => {
            action(ActionType::NoOp).with_description(format!("{} is still being created", label))
        }
        (Some(d), Some(r)) => {
            let changes = diff(spec, d, r);
            if changes.is_empty() {
                action(ActionType::NoOp)
            } else if spec.capabilities.supports_update {
                action(ActionType::Update).with_changes(changes)
            } else {
                action(ActionType::Replace).with_changes(changes)
            }
        }
    }
}

/// Drives resources towards their desired state through a [`ResourceApi`]
pub struct Reconciler {
    api: Arc<dyn ResourceApi>,
    router: CredentialRouter,
    poller: Poller,
    abort: CancellationToken,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(api: Arc<dyn ResourceApi>, router: CredentialRouter) -> Self {
        let abort = CancellationToken::new();
        Self {
            api,
            router,
            poller: Poller::new(Default::default(), abort.clone()),
            abort,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Abort token shared with the poller; cancelling it stops every wait.
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.poller = Poller::new(*self.poller.config(), abort.clone());
        self.abort = abort;
        self
    }

    pub fn api(&self) -> &Arc<dyn ResourceApi> {
        &self.api
    }

    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }

    fn context(
        &self,
        spec: &ResourceSpec,
        credential_override: Option<&str>,
    ) -> Result<CallContext, Diagnostic> {
        let credential = self.router.resolve(spec, credential_override)?;
        Ok(CallContext::new(spec.clone(), credential))
    }

    /// Reconcile one resource.
    pub async fn reconcile(
        &self,
        spec: &ResourceSpec,
        desired: Option<&DesiredState>,
        observed: Option<&RemoteState>,
        credential_override: Option<&str>,
    ) -> Reconciliation {
        self.reconcile_as(None, spec, desired, observed, credential_override)
            .await
    }

    async fn reconcile_as(
        &self,
        key: Option<&str>,
        spec: &ResourceSpec,
        desired: Option<&DesiredState>,
        observed: Option<&RemoteState>,
        credential_override: Option<&str>,
    ) -> Reconciliation {
        let mut action = plan(spec, desired, observed);
        if let Some(key) = key {
            action.id = key.to_string();
        }
        let label = action.id.clone();
        let resuming = action.action_type == ActionType::NoOp
            && spec.capabilities.is_async
            && observed.is_some_and(|r| r.status == ResourceStatus::Creating);

        if action.action_type == ActionType::NoOp && !resuming {
            return Reconciliation {
                action,
                status: observed.map_or(ResourceStatus::Absent, |r| r.status),
                state: observed.cloned(),
                diagnostics: Vec::new(),
            };
        }

        if spec.capabilities.is_import_only {
            let message = match action.action_type {
                ActionType::Create => Some(format!(
                    "{} resources cannot be created; import an existing one instead",
                    spec.type_name
                )),
                ActionType::Replace => Some(format!(
                    "{} resources cannot be recreated; revert the changed attributes ({})",
                    spec.type_name,
                    action
                        .changes
                        .iter()
                        .map(|c| c.attribute.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
                _ => None,
            };
            if let Some(message) = message {
                let diagnostic =
                    Diagnostic::fatal(DiagnosticCode::InvalidRequest, message).with_resource(&label);
                return Reconciliation::failed(action, observed, diagnostic);
            }
        }

        let ctx = match self.context(spec, credential_override) {
            Ok(ctx) => ctx,
            Err(diagnostic) => {
                return Reconciliation::failed(action, observed, diagnostic.with_resource(&label));
            }
        };

        let from = observed.map_or(ResourceStatus::Absent, |r| r.status);
        let outcome = match (action.action_type, desired, observed) {
            (ActionType::Create, Some(d), _) => self.create(&ctx, d).await,
            (ActionType::Update, Some(d), Some(r)) => self.update(&ctx, d, r, &action.changes).await,
            (ActionType::Replace, Some(d), Some(r)) => self.replace(&ctx, d, r).await,
            (ActionType::Delete, _, Some(r)) => self.delete(&ctx, r).await,
            (ActionType::NoOp, _, Some(r)) => self.resume(&ctx, r).await,
            _ => Outcome {
                status: from,
                state: observed.cloned(),
                diagnostics: Vec::new(),
            },
        };

        if outcome.status != from {
            tracing::info!("{}: {} -> {}", label, from, outcome.status);
        }

        Reconciliation {
            action,
            status: outcome.status,
            state: outcome.state,
            diagnostics: outcome
                .diagnostics
                .into_iter()
                .map(|d| d.for_resource(&label))
                .collect(),
        }
    }

    /// Adopt an existing remote object by (possibly composite) id.
    ///
    /// Sensitive attributes are stripped and marked untracked so the next
    /// pass does not report drift on them.
    pub async fn import_resource(
        &self,
        spec: &ResourceSpec,
        remote_id: &str,
        credential_override: Option<&str>,
    ) -> Reconciliation {
        let label = format!("{}:{}", spec.type_name, remote_id);
        let action =
            Action::new(&label, ActionType::Import, &spec.type_name).with_resource_id(remote_id);

        let id = match spec.parse_id(remote_id) {
            Ok(id) => id,
            Err(err) => {
                let diagnostic =
                    Diagnostic::fatal(DiagnosticCode::InvalidRequest, err.to_string()).with_resource(&label);
                return Reconciliation::failed(action, None, diagnostic);
            }
        };
        let ctx = match self.context(spec, credential_override) {
            Ok(ctx) => ctx,
            Err(diagnostic) => {
                return Reconciliation::failed(action, None, diagnostic.with_resource(&label));
            }
        };

        tracing::info!("{}: {} -> {}", label, ResourceStatus::Absent, ResourceStatus::Importing);
        let attributes = match self.api.read(&ctx, &id).await {
            Ok(Some(attributes)) => attributes,
            Ok(None) => {
                let diagnostic = Diagnostic::fatal(
                    DiagnosticCode::NotFound,
                    format!("no {} with id {}", spec.type_name, id),
                )
                .with_resource(&label);
                return Reconciliation::failed(action, None, diagnostic);
            }
            Err(diagnostic) => {
                return Reconciliation::failed(action, None, diagnostic.for_resource(&label));
            }
        };

        let mut state = RemoteState::new(id.clone(), &spec.type_name);
        state.attributes = attributes;
        for (k, v) in id.to_attributes(spec) {
            state.attributes.entry(k).or_insert(v);
        }
        state.strip_sensitive(spec);
        tracing::info!("{}: {} -> {}", label, ResourceStatus::Importing, ResourceStatus::Present);

        Reconciliation {
            action,
            status: ResourceStatus::Present,
            state: Some(state),
            diagnostics: Vec::new(),
        }
    }

    /// Stream every object of a collection. `filter` carries the parent
    /// identity (e.g. `project_id`) for nested collections.
    pub fn list(
        &self,
        spec: &ResourceSpec,
        filter: AttributeMap,
        cursor: PageCursor,
        credential_override: Option<&str>,
    ) -> BoxStream<'static, Result<AttributeMap, Diagnostic>> {
        let ctx = match self.context(spec, credential_override) {
            Ok(ctx) => Arc::new(ctx),
            Err(diagnostic) => return stream::once(async move { Err(diagnostic) }).boxed(),
        };
        let api = Arc::clone(&self.api);
        let filter = Arc::new(filter);

        paginate(cursor, move |cursor| {
            let api = Arc::clone(&api);
            let ctx = Arc::clone(&ctx);
            let filter = Arc::clone(&filter);
            async move { api.list_page(&ctx, &filter, &cursor).await }
        })
        .boxed()
    }

    /// Read one object for a data source, degrading permission failures to
    /// a warning plus `fallback`.
    pub async fn read_data_source(
        &self,
        spec: &ResourceSpec,
        remote_id: &str,
        credential_override: Option<&str>,
        fallback: Option<AttributeMap>,
    ) -> DataSourceResult<Option<AttributeMap>> {
        let label = format!("{}:{}", spec.type_name, remote_id);
        let result = async {
            let id = spec
                .parse_id(remote_id)
                .map_err(|e| Diagnostic::fatal(DiagnosticCode::InvalidRequest, e.to_string()))?;
            let ctx = self.context(spec, credential_override)?;
            self.api.read(&ctx, &id).await
        }
        .await;

        match result {
            Ok(value) => DataSourceResult::ok(value),
            Err(diagnostic) => DataSourceResult::degraded(fallback, diagnostic.for_resource(&label)),
        }
    }

    /// List a collection for a data source, degrading permission failures
    /// to a warning plus `fallback`.
    pub async fn list_data_source(
        &self,
        spec: &ResourceSpec,
        filter: AttributeMap,
        cursor: PageCursor,
        credential_override: Option<&str>,
        fallback: Vec<AttributeMap>,
    ) -> DataSourceResult<Vec<AttributeMap>> {
        let mut items = Vec::new();
        let mut stream = self.list(spec, filter, cursor, credential_override);
        while let Some(item) = stream.next().await {
            match item {
                Ok(item) => items.push(item),
                Err(diagnostic) => {
                    return DataSourceResult::degraded(
                        fallback,
                        diagnostic.for_resource(&spec.type_name),
                    );
                }
            }
        }
        DataSourceResult::ok(items)
    }

    /// Reconcile a batch. Items run concurrently up to the configured
    /// limit; a failure in one item never stops the others.
    pub async fn reconcile_all(&self, items: Vec<ReconcileItem>) -> ReconcileReport {
        let start = Instant::now();
        let concurrency = self.options.concurrency.max(1);

        let results = stream::iter(items)
            .map(|item| async move {
                let result = self
                    .reconcile_as(
                        Some(&item.key),
                        &item.spec,
                        item.desired.as_ref(),
                        item.observed.as_ref(),
                        item.credential.as_deref(),
                    )
                    .await;
                (item.key, result)
            })
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await;

        ReconcileReport {
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn create(&self, ctx: &CallContext, desired: &DesiredState) -> Outcome {
        match self.create_instance(ctx, desired).await {
            Ok(outcome) => outcome,
            Err(diagnostic) => Outcome::absent(vec![diagnostic]),
        }
    }

    async fn create_instance(
        &self,
        ctx: &CallContext,
        desired: &DesiredState,
    ) -> Result<Outcome, Diagnostic> {
        let spec = &ctx.spec;
        let parents = spec.parent_attributes(&desired.attributes);
        let payload = desired.payload(spec);

        tracing::debug!("Creating {} using {}", spec.type_name, ctx.credential);
        let created = self.api.create(ctx, &parents, &payload).await?;
        let mut state = snapshot(spec, &parents, created)?;
        state.untracked.extend(spec.sensitive.iter().cloned());

        if !spec.capabilities.is_async {
            return Ok(Outcome::present(state));
        }
        let pending = state.clone();
        match self.await_creation(ctx, state).await {
            Ok(outcome) => Ok(outcome),
            Err(diagnostic) => {
                tracing::warn!("{} created but not settled: {}", pending.id, diagnostic.message);
                Ok(Outcome::creating(pending, diagnostic))
            }
        }
    }

    async fn resume(&self, ctx: &CallContext, observed: &RemoteState) -> Outcome {
        match self.await_creation(ctx, observed.clone()).await {
            Ok(outcome) => outcome,
            Err(diagnostic) => Outcome::kept(observed, diagnostic),
        }
    }

    async fn await_creation(
        &self,
        ctx: &CallContext,
        mut state: RemoteState,
    ) -> Result<Outcome, Diagnostic> {
        let operation = AsyncOperation::from_attributes(state.attributes.clone())?;
        let outcome = if operation.is_terminal() {
            PollOutcome {
                operation,
                diagnostic: None,
            }
        } else {
            let id = state.id.clone();
            let cancel = ctx
                .spec
                .capabilities
                .supports_cancel
                .then(|| self.cancel_operation(ctx, &id));
            self.poller
                .await_operation(
                    &operation.id,
                    || self.poll_operation(ctx, &id),
                    cancel,
                    self.options.async_timeout,
                )
                .await?
        };

        let status = outcome.operation.status;
        for (k, v) in outcome.operation.attributes {
            state.attributes.insert(k, v);
        }

        if let Some(timed_out) = outcome.diagnostic {
            return Ok(Outcome::creating(state, timed_out));
        }
        if status == OperationStatus::Succeeded {
            return Ok(Outcome::present(state));
        }

        let reason = state
            .attributes
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| format!(": {}", m))
            .unwrap_or_default();
        let failed = Diagnostic::fatal(
            DiagnosticCode::OperationFailed,
            format!("operation {} ended {}{}", state.id, status, reason),
        );
        let mut outcome = Outcome::present(state);
        outcome.diagnostics.push(failed);
        Ok(outcome)
    }

    async fn poll_operation(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
    ) -> Result<AsyncOperation, Diagnostic> {
        match self.api.read(ctx, id).await? {
            Some(attributes) => AsyncOperation::from_attributes(attributes),
            None => Err(Diagnostic::fatal(
                DiagnosticCode::NotFound,
                format!("operation {} disappeared while polling", id),
            )),
        }
    }

    fn cancel_operation<'a>(
        &'a self,
        ctx: &'a CallContext,
        id: &'a ResourceId,
    ) -> BoxFuture<'a, Result<AsyncOperation, Diagnostic>> {
        Box::pin(async move { AsyncOperation::from_attributes(self.api.cancel(ctx, id).await?) })
    }

    async fn update(
        &self,
        ctx: &CallContext,
        desired: &DesiredState,
        observed: &RemoteState,
        changes: &[AttributeDiff],
    ) -> Outcome {
        let spec = &ctx.spec;
        let payload: AttributeMap = changes
            .iter()
            .filter(|c| spec.is_writable(&c.attribute))
            .filter_map(|c| {
                desired
                    .attributes
                    .get(&c.attribute)
                    .map(|v| (c.attribute.clone(), v.clone()))
            })
            .collect();

        tracing::info!("{}: {} -> {}", observed.key(), observed.status, ResourceStatus::Updating);
        let updated = match self.api.update(ctx, &observed.id, &payload).await {
            Ok(updated) => updated,
            Err(diagnostic) => return Outcome::kept(observed, diagnostic),
        };

        let parents = observed.id.to_attributes(spec);
        let mut state = match RemoteState::from_remote(spec, &parents, updated) {
            Some(state) => state,
            None => {
                let mut state = observed.clone();
                for (k, v) in payload {
                    state.set_attribute(k, v);
                }
                state
            }
        };
        state.id = observed.id.clone();
        state.inherit_untracked(observed);
        Outcome::present(state)
    }

    async fn replace(
        &self,
        ctx: &CallContext,
        desired: &DesiredState,
        observed: &RemoteState,
    ) -> Outcome {
        tracing::info!("{}: {} -> {}", observed.key(), observed.status, ResourceStatus::Replacing);

        if ctx.spec.capabilities.allows_concurrent_replacement {
            let mut created = match self.create_instance(ctx, desired).await {
                Ok(created) => created,
                Err(diagnostic) => return Outcome::kept(observed, diagnostic),
            };
            if created.status != ResourceStatus::Present || created.has_fatal() {
                created.diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::InvalidStateTransition,
                    format!(
                        "previous instance {} kept until its replacement is ready",
                        observed.id
                    ),
                ));
                return created;
            }
            let removed = self.delete(ctx, observed).await;
            created.diagnostics.extend(removed.diagnostics);
            created
        } else {
            let removed = self.delete(ctx, observed).await;
            if removed.has_fatal() {
                return removed;
            }
            let mut created = self.create(ctx, desired).await;
            let mut diagnostics = removed.diagnostics;
            diagnostics.append(&mut created.diagnostics);
            created.diagnostics = diagnostics;
            created
        }
    }

    async fn delete(&self, ctx: &CallContext, observed: &RemoteState) -> Outcome {
        if !ctx.spec.capabilities.supports_delete {
            return self.forget(ctx, observed).await;
        }

        tracing::info!("{}: {} -> {}", observed.key(), observed.status, ResourceStatus::Deleting);
        match self.api.delete(ctx, &observed.id).await {
            Ok(DeleteOutcome::Deleted) => Outcome::absent(Vec::new()),
            Ok(DeleteOutcome::AlreadyGone) => {
                tracing::info!("{} was already gone", observed.key());
                Outcome::absent(vec![Diagnostic::info(
                    DiagnosticCode::NotFound,
                    format!("{} was already deleted", observed.id),
                )])
            }
            Err(diagnostic) if is_already_settled(&diagnostic) => {
                tracing::info!(
                    "{} can no longer be deleted, treating as removed: {}",
                    observed.key(),
                    diagnostic.message
                );
                Outcome::absent(vec![Diagnostic::info(
                    diagnostic.code,
                    format!("{} treated as removed: {}", observed.id, diagnostic.message),
                )])
            }
            Err(diagnostic) => Outcome::kept(observed, diagnostic),
        }
    }

    /// Types without a delete call are dropped from management. Running
    /// operations get a best-effort cancel first.
    async fn forget(&self, ctx: &CallContext, observed: &RemoteState) -> Outcome {
        let caps = ctx.spec.capabilities;
        let mut diagnostics = Vec::new();

        let running = observed
            .get_attribute::<String>("status")
            .and_then(|s| OperationStatus::parse(&s))
            .is_some_and(|s| !s.is_terminal());
        if caps.is_async && caps.supports_cancel && running {
            match self.api.cancel(ctx, &observed.id).await {
                Ok(_) => tracing::info!("Cancelled {}", observed.key()),
                Err(diagnostic) if is_already_settled(&diagnostic) => {}
                Err(diagnostic) => diagnostics.push(diagnostic.downgrade()),
            }
        }

        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::InvalidRequest,
            format!(
                "{} resources cannot be deleted; {} was removed from management but still exists remotely",
                ctx.spec.type_name, observed.id
            ),
        ));
        Outcome::absent(diagnostics)
    }
}

fn is_already_settled(diagnostic: &Diagnostic) -> bool {
    matches!(
        diagnostic.remote,
        Some(RemoteErrorKind::TerminalState | RemoteErrorKind::ResourceGone)
    )
}

fn snapshot(
    spec: &ResourceSpec,
    parents: &AttributeMap,
    object: AttributeMap,
) -> Result<RemoteState, Diagnostic> {
    RemoteState::from_remote(spec, parents, object).ok_or_else(|| {
        Diagnostic::fatal(
            DiagnosticCode::UnexpectedResponseFormat,
            format!("{} response carries no `{}`", spec.type_name, spec.id_attribute()),
        )
    })
}

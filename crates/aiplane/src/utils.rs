use aiplane_cloud::{
    Action, ActionType, CredentialRouter, Diagnostic, Poller, Reconciler, ResourceSpec, Severity,
};
use aiplane_cloud_openai::{EngineConfig, OpenAiProvider, RateLimitConfig, RetryPolicy, endpoints};
use aiplane_config::{EnvSnapshot, ProviderConfig};
use anyhow::Context as _;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration and environment captured once per invocation
pub struct Context {
    pub config: ProviderConfig,
    pub env: EnvSnapshot,
    pub abort: CancellationToken,
}

impl Context {
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => aiplane_config::load_from(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => aiplane_config::load().context("failed to load configuration")?,
        };

        let abort = CancellationToken::new();
        let trigger = abort.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Interrupted, aborting pending calls...".yellow());
                trigger.cancel();
            }
        });

        Ok(Self {
            config,
            env: EnvSnapshot::capture(),
            abort,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        let retry = &self.config.retry;
        let rate_limit = &self.config.rate_limit;
        EngineConfig {
            base_url: self.config.resolved_base_url(&self.env),
            organization: self.config.resolved_organization(&self.env),
            timeout: self.config.timeout(),
            retry: RetryPolicy {
                max_attempts: retry.max_attempts,
                base_delay: Duration::from_millis(retry.base_delay_ms),
                factor: retry.factor,
                max_delay: Duration::from_millis(retry.max_delay_ms),
                jitter: retry.jitter,
                max_retry_after: Duration::from_millis(retry.max_retry_after_ms),
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit.enabled,
                requests_per_minute: rate_limit.requests_per_minute,
                burst: rate_limit.burst,
            },
        }
    }

    pub fn reconciler(&self) -> anyhow::Result<Reconciler> {
        let provider = OpenAiProvider::new(self.engine_config())
            .context("failed to initialise the OpenAI provider")?
            .with_abort(self.abort.clone());
        let router = CredentialRouter::new(self.config.credential_config(&self.env));

        Ok(Reconciler::new(Arc::new(provider), router)
            .with_poller(Poller::new(self.config.poll_config(), self.abort.clone()))
            .with_options(self.config.reconcile_options())
            .with_abort(self.abort.clone()))
    }
}

/// Look up a resource type in the catalog.
pub fn find_spec(type_name: &str) -> anyhow::Result<ResourceSpec> {
    endpoints()
        .into_iter()
        .map(|e| e.spec)
        .find(|s| s.type_name == type_name)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown resource type '{}' (see `aiplane resources`)",
                type_name
            )
        })
}

pub fn print_action(action: &Action) {
    let (symbol, label) = match action.action_type {
        ActionType::Create => ("+".green(), action.id.green()),
        ActionType::Update => ("~".yellow(), action.id.yellow()),
        ActionType::Replace => ("-/+".red(), action.id.red()),
        ActionType::Delete => ("-".red(), action.id.red()),
        ActionType::Import => ("=".cyan(), action.id.cyan()),
        ActionType::NoOp => (" ".normal(), action.id.dimmed()),
    };
    println!("  {} {} {}", symbol, label, format!("({})", action.description).dimmed());
    for change in &action.changes {
        println!(
            "      {}: {} -> {}",
            change.attribute,
            change.observed.to_string().red(),
            change.desired.to_string().green()
        );
    }
}

pub fn print_diagnostic(diagnostic: &Diagnostic) {
    let severity = match diagnostic.severity {
        Severity::Fatal => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue(),
    };
    let resource = diagnostic
        .resource
        .as_deref()
        .map(|r| format!(" {}", r))
        .unwrap_or_default();
    let status = diagnostic
        .status
        .map(|s| format!(" (HTTP {})", s))
        .unwrap_or_default();
    eprintln!(
        "{} [{}]{}: {}{}",
        severity, diagnostic.code, resource, diagnostic.message, status
    );
}

//! Provider settings file
//!
//! Every field has a serde default, so an empty file is a valid
//! configuration.

use crate::error::{ConfigError, Result};
use aiplane_cloud::{CredentialConfig, PollConfig, ReconcileOptions};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variables read once at startup
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ADMIN_KEY: &str = "OPENAI_ADMIN_KEY";
pub const ENV_ORGANIZATION: &str = "OPENAI_ORGANIZATION";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

/// Environment captured once; nothing reads the process environment after
/// this is taken.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub api_key: Option<String>,
    pub admin_key: Option<String>,
    pub organization: Option<String>,
    pub base_url: Option<String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            api_key: get(ENV_API_KEY),
            admin_key: get(ENV_ADMIN_KEY),
            organization: get(ENV_ORGANIZATION),
            base_url: get(ENV_BASE_URL),
        }
    }
}

impl Debug for EnvSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSnapshot")
            .field("api_key", &self.api_key.is_some())
            .field("admin_key", &self.admin_key.is_some())
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Retry settings (`retry:` block)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    /// Longest `Retry-After` wait honoured
    pub max_retry_after_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            factor: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
            max_retry_after_ms: 120_000,
        }
    }
}

/// Client-side rate limit (`rate_limit:` block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 500,
            burst: 20,
        }
    }
}

/// Async operation polling (`polling:` block)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub initial_interval_ms: u64,
    pub multiplier: u32,
    pub max_interval_ms: u64,
    /// Give up waiting on an async create after this long
    pub timeout_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            multiplier: 2,
            max_interval_ms: 30_000,
            timeout_secs: 3_600,
        }
    }
}

/// Contents of `aiplane.yaml`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub organization: Option<String>,
    /// Project-scope key
    pub api_key: Option<String>,
    /// Admin-scope key
    pub admin_key: Option<String>,
    pub timeout_secs: u64,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    pub polling: PollingSettings,
    /// Resources reconciled at once
    pub concurrency: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            organization: None,
            api_key: None,
            admin_key: None,
            timeout_secs: 60,
            retry: RetrySettings::default(),
            rate_limit: RateLimitSettings::default(),
            polling: PollingSettings::default(),
            concurrency: 4,
        }
    }
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("api_key", &self.api_key.is_some())
            .field("admin_key", &self.admin_key.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .field("rate_limit", &self.rate_limit)
            .field("polling", &self.polling)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // an empty document deserializes to unit, not to a map
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.base_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid(format!(
                    "base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.factor < 1.0 {
            return Err(ConfigError::Invalid("retry.factor must be at least 1.0".into()));
        }
        if self.polling.multiplier == 0 {
            return Err(ConfigError::Invalid("polling.multiplier must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// Base URL: environment, then file, then the public API.
    pub fn resolved_base_url(&self, env: &EnvSnapshot) -> String {
        env.base_url
            .clone()
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn resolved_organization(&self, env: &EnvSnapshot) -> Option<String> {
        env.organization.clone().or_else(|| self.organization.clone())
    }

    /// Keys for the credential router. Environment keys rank above file keys.
    pub fn credential_config(&self, env: &EnvSnapshot) -> CredentialConfig {
        CredentialConfig {
            env_project_key: env.api_key.clone(),
            env_admin_key: env.admin_key.clone(),
            provider_project_key: self.api_key.clone(),
            provider_admin_key: self.admin_key.clone(),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            initial_interval: Duration::from_millis(self.polling.initial_interval_ms),
            multiplier: self.polling.multiplier,
            max_interval: Duration::from_millis(self.polling.max_interval_ms),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            async_timeout: Duration::from_secs(self.polling.timeout_secs),
            concurrency: self.concurrency,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = ProviderConfig::from_yaml("").unwrap();
        assert_eq!(config, ProviderConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_blocks_keep_defaults() {
        let yaml = r#"
organization: org-123
retry:
  max_attempts: 3
polling:
  timeout_secs: 60
"#;
        let config = ProviderConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.organization.as_deref(), Some("org-123"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.polling.timeout_secs, 60);
        assert_eq!(config.polling.multiplier, 2);
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_environment_ranks_above_file() {
        let config = ProviderConfig {
            base_url: Some("http://localhost:8080/v1".into()),
            organization: Some("org-file".into()),
            api_key: Some("sk-file".into()),
            ..Default::default()
        };
        let env = EnvSnapshot {
            api_key: Some("sk-env".into()),
            organization: Some("org-env".into()),
            ..Default::default()
        };

        let creds = config.credential_config(&env);
        assert_eq!(creds.env_project_key.as_deref(), Some("sk-env"));
        assert_eq!(creds.provider_project_key.as_deref(), Some("sk-file"));
        assert!(creds.env_admin_key.is_none());

        assert_eq!(config.resolved_organization(&env).as_deref(), Some("org-env"));
        assert_eq!(config.resolved_base_url(&env), "http://localhost:8080/v1");
        assert_eq!(
            ProviderConfig::default().resolved_base_url(&EnvSnapshot::default()),
            DEFAULT_BASE_URL
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ProviderConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProviderConfig {
            base_url: Some("api.openai.com".into()),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_keys_are_not_debug_printed() {
        let config = ProviderConfig {
            admin_key: Some("sk-admin-secret".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("sk-admin-secret"));

        let env = EnvSnapshot::from_lookup(|name| {
            (name == ENV_API_KEY).then(|| "sk-env-secret".to_string())
        });
        assert!(!format!("{:?}", env).contains("sk-env-secret"));
    }

    #[test]
    fn test_empty_env_values_are_unset() {
        let env = EnvSnapshot::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(env, EnvSnapshot::default());
    }

    #[test]
    fn test_poll_config_mapping() {
        let config = ProviderConfig::default();
        assert_eq!(config.poll_config(), PollConfig::default());
        assert_eq!(config.reconcile_options(), ReconcileOptions::default());
    }
}

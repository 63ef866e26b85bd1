//! Credential routing between the project and admin authority scopes

use crate::diagnostic::{Diagnostic, DiagnosticCode};
use crate::spec::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Authority scope of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Project,
    Admin,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Project => write!(f, "project"),
            Scope::Admin => write!(f, "admin"),
        }
    }
}

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Per-resource override
    Explicit,
    /// Environment captured at startup
    Environment,
    /// Provider configuration file
    ProviderDefault,
}

/// A resolved credential for one call.
///
/// The token is never printed by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    scope: Scope,
    token: String,
    source: CredentialSource,
}

impl Credential {
    pub fn new(scope: Scope, token: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            scope,
            token: token.into(),
            source,
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Raw bearer token. Only the transport should call this.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stable, non-reversible key identifying this token.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.token.hash(&mut hasher);
        hasher.finish()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scope", &self.scope)
            .field("source", &self.source)
            .field("fingerprint", &format_args!("{:016x}", self.fingerprint()))
            .finish()
    }
}

impl Display for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} credential ({:?})", self.scope, self.source)
    }
}

/// Keys available to the router, captured once at startup.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialConfig {
    pub env_project_key: Option<String>,
    pub env_admin_key: Option<String>,
    pub provider_project_key: Option<String>,
    pub provider_admin_key: Option<String>,
}

impl Debug for CredentialConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("env_project_key", &self.env_project_key.is_some())
            .field("env_admin_key", &self.env_admin_key.is_some())
            .field("provider_project_key", &self.provider_project_key.is_some())
            .field("provider_admin_key", &self.provider_admin_key.is_some())
            .finish()
    }
}

/// Picks the credential for each call. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct CredentialRouter {
    config: CredentialConfig,
}

impl CredentialRouter {
    pub fn new(config: CredentialConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// Resolve the credential for a call against `spec`.
    ///
    /// A non-empty override always wins. Admin-scoped types only ever get an
    /// admin key; there is no fallback to the project key.
    pub fn resolve(
        &self,
        spec: &ResourceSpec,
        override_token: Option<&str>,
    ) -> Result<Credential, Diagnostic> {
        let scope = spec.required_scope();

        if let Some(token) = non_empty(override_token) {
            return Ok(Credential::new(scope, token, CredentialSource::Explicit));
        }

        let (env, provider) = match scope {
            Scope::Admin => (&self.config.env_admin_key, &self.config.provider_admin_key),
            Scope::Project => (
                &self.config.env_project_key,
                &self.config.provider_project_key,
            ),
        };

        if let Some(token) = non_empty(env.as_deref()) {
            return Ok(Credential::new(scope, token, CredentialSource::Environment));
        }
        if let Some(token) = non_empty(provider.as_deref()) {
            return Ok(Credential::new(
                scope,
                token,
                CredentialSource::ProviderDefault,
            ));
        }

        let hint = match scope {
            Scope::Admin => "set OPENAI_ADMIN_KEY or admin_key in the provider configuration",
            Scope::Project => "set OPENAI_API_KEY or api_key in the provider configuration",
        };
        Err(Diagnostic::fatal(
            DiagnosticCode::MissingCredential,
            format!(
                "no {} credential available for {} ({})",
                scope, spec.type_name, hint
            ),
        ))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

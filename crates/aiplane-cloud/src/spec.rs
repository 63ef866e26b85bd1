//! Resource type descriptors
//!
//! A [`ResourceSpec`] describes what a remote resource type supports. The
//! reconciler consumes only these flags; it never branches on type names.

use crate::credential::Scope;
use crate::error::{CloudError, Result};
use crate::state::AttributeMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Separator used by composite identities (`proj_1:key_2`).
pub const IDENTITY_SEPARATOR: char = ':';

/// Capability flags of a resource type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Changed attributes can be applied in place
    pub supports_update: bool,

    /// The remote object can be deleted
    pub supports_delete: bool,

    /// Running operations can be cancelled
    pub supports_cancel: bool,

    /// Creation starts a long-running job that must be polled
    pub is_async: bool,

    /// Calls must use an admin-scope credential
    pub requires_admin_scope: bool,

    /// The resource cannot be created, only imported
    pub is_import_only: bool,

    /// Old and new instances may exist at the same time during a replace
    pub allows_concurrent_replacement: bool,
}

impl Capabilities {
    /// Plain CRUD resource with in-place updates.
    pub const fn crud() -> Self {
        Self {
            supports_update: true,
            supports_delete: true,
            supports_cancel: false,
            is_async: false,
            requires_admin_scope: false,
            is_import_only: false,
            allows_concurrent_replacement: true,
        }
    }

    /// Create/delete only; any change forces replacement.
    pub const fn immutable() -> Self {
        Self {
            supports_update: false,
            ..Self::crud()
        }
    }

    /// Long-running job: no update, no delete, cancellable.
    pub const fn job() -> Self {
        Self {
            supports_update: false,
            supports_delete: false,
            supports_cancel: true,
            is_async: true,
            requires_admin_scope: false,
            is_import_only: false,
            allows_concurrent_replacement: true,
        }
    }

    pub const fn admin(mut self) -> Self {
        self.requires_admin_scope = true;
        self
    }

    pub const fn import_only(mut self) -> Self {
        self.is_import_only = true;
        self
    }

    pub const fn exclusive_replacement(mut self) -> Self {
        self.allows_concurrent_replacement = false;
        self
    }
}

/// Type-level description of a manageable remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource type name (e.g. "project", "invite")
    pub type_name: String,

    pub capabilities: Capabilities,

    /// Attributes forming the remote key, outermost first.
    /// The last entry is the object's own id attribute.
    pub identity: Vec<String>,

    /// Server-assigned attributes; never sent, never drift-compared
    #[serde(default)]
    pub computed: Vec<String>,

    /// Secret attributes the API never returns after creation
    #[serde(default)]
    pub sensitive: Vec<String>,

    /// Sent on create, but the API gives no reliable read-back
    #[serde(default)]
    pub write_only: Vec<String>,
}

impl ResourceSpec {
    pub fn new(type_name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            type_name: type_name.into(),
            capabilities,
            identity: vec!["id".to_string()],
            computed: vec!["id".to_string(), "object".to_string(), "created_at".to_string()],
            sensitive: Vec::new(),
            write_only: Vec::new(),
        }
    }

    /// Replace the identity attributes (outermost first).
    pub fn with_identity(mut self, identity: &[&str]) -> Self {
        self.identity = identity.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_computed(mut self, attrs: &[&str]) -> Self {
        for attr in attrs {
            if !self.computed.iter().any(|c| c == attr) {
                self.computed.push(attr.to_string());
            }
        }
        self
    }

    pub fn with_sensitive(mut self, attrs: &[&str]) -> Self {
        self.sensitive.extend(attrs.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_write_only(mut self, attrs: &[&str]) -> Self {
        self.write_only.extend(attrs.iter().map(|s| s.to_string()));
        self
    }

    /// Authority scope calls for this type must use
    pub fn required_scope(&self) -> Scope {
        if self.capabilities.requires_admin_scope {
            Scope::Admin
        } else {
            Scope::Project
        }
    }

    /// Name of the object's own id attribute
    pub fn id_attribute(&self) -> &str {
        self.identity.last().map(String::as_str).unwrap_or("id")
    }

    pub fn is_sensitive(&self, attr: &str) -> bool {
        self.sensitive.iter().any(|s| s == attr)
    }

    /// Whether an attribute takes part in drift comparison
    pub fn is_tracked(&self, attr: &str) -> bool {
        !(self.computed.iter().any(|c| c == attr)
            || self.is_sensitive(attr)
            || self.write_only.iter().any(|w| w == attr))
    }

    /// Whether an attribute is sent in create/update payloads
    pub fn is_writable(&self, attr: &str) -> bool {
        !self.computed.iter().any(|c| c == attr)
            && !self.identity[..self.identity.len().saturating_sub(1)]
                .iter()
                .any(|i| i == attr)
    }

    /// Parse a (possibly composite) remote id like `proj_1:key_2`.
    pub fn parse_id(&self, raw: &str) -> Result<ResourceId> {
        ResourceId::parse(raw, self.identity.len())
    }

    /// Build an identity from attribute values, if every part is present.
    pub fn id_from_attributes(&self, attrs: &AttributeMap) -> Option<ResourceId> {
        let parts = self
            .identity
            .iter()
            .map(|name| attrs.get(name).and_then(|v| v.as_str()).map(str::to_string))
            .collect::<Option<Vec<_>>>()?;
        Some(ResourceId { parts })
    }

    /// Identity parts except the object's own id, as attribute pairs.
    /// Used to address the parent collection.
    pub fn parent_attributes(&self, attrs: &AttributeMap) -> AttributeMap {
        let mut parents = AttributeMap::new();
        for name in &self.identity[..self.identity.len().saturating_sub(1)] {
            if let Some(value) = attrs.get(name) {
                parents.insert(name.clone(), value.clone());
            }
        }
        parents
    }
}

/// Remote identity of one resource instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    parts: Vec<String>,
}

impl ResourceId {
    pub fn simple(id: impl Into<String>) -> Self {
        Self {
            parts: vec![id.into()],
        }
    }

    pub fn from_parts(parts: Vec<String>) -> Self {
        Self { parts }
    }

    pub fn parse(raw: &str, expected_parts: usize) -> Result<Self> {
        let parts: Vec<String> = raw
            .split(IDENTITY_SEPARATOR)
            .map(str::to_string)
            .collect();

        if parts.len() != expected_parts.max(1) {
            return Err(CloudError::InvalidIdentity {
                id: raw.to_string(),
                reason: format!(
                    "expected {} part(s) separated by '{}', got {}",
                    expected_parts.max(1),
                    IDENTITY_SEPARATOR,
                    parts.len()
                ),
            });
        }
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(CloudError::InvalidIdentity {
                id: raw.to_string(),
                reason: "identity parts must not be empty".to_string(),
            });
        }

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The object's own id (last part)
    pub fn leaf(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Identity as attribute pairs, keyed by the spec's identity names.
    pub fn to_attributes(&self, spec: &ResourceSpec) -> AttributeMap {
        spec.identity
            .iter()
            .zip(&self.parts)
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect()
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sep = IDENTITY_SEPARATOR.to_string();
        f.write_str(&self.parts.join(&sep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_key_spec() -> ResourceSpec {
        ResourceSpec::new("project_api_key", Capabilities::immutable().admin().import_only())
            .with_identity(&["project_id", "id"])
            .with_sensitive(&["value"])
    }

    #[test]
    fn test_parse_composite_id() {
        let spec = api_key_spec();
        let id = spec.parse_id("proj_1:key_2").unwrap();
        assert_eq!(id.parts(), &["proj_1".to_string(), "key_2".to_string()]);
        assert_eq!(id.leaf(), "key_2");
        assert_eq!(id.to_string(), "proj_1:key_2");

        let attrs = id.to_attributes(&spec);
        assert_eq!(attrs.get("project_id"), Some(&json!("proj_1")));
        assert_eq!(attrs.get("id"), Some(&json!("key_2")));
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        let spec = api_key_spec();
        assert!(spec.parse_id("key_2").is_err());
        assert!(spec.parse_id("proj_1:").is_err());
        assert!(spec.parse_id("a:b:c").is_err());
    }

    #[test]
    fn test_required_scope() {
        assert_eq!(api_key_spec().required_scope(), Scope::Admin);
        let file = ResourceSpec::new("file", Capabilities::immutable());
        assert_eq!(file.required_scope(), Scope::Project);
    }

    #[test]
    fn test_tracked_and_writable() {
        let spec = api_key_spec().with_write_only(&["note"]);
        assert!(!spec.is_tracked("id"));
        assert!(!spec.is_tracked("value"));
        assert!(!spec.is_tracked("note"));
        assert!(spec.is_tracked("name"));

        assert!(!spec.is_writable("project_id"));
        assert!(!spec.is_writable("created_at"));
        assert!(spec.is_writable("name"));
    }

    #[test]
    fn test_id_from_attributes() {
        let spec = api_key_spec();
        let mut attrs = AttributeMap::new();
        attrs.insert("project_id".into(), json!("proj_1"));
        assert!(spec.id_from_attributes(&attrs).is_none());

        attrs.insert("id".into(), json!("key_2"));
        let id = spec.id_from_attributes(&attrs).unwrap();
        assert_eq!(id.to_string(), "proj_1:key_2");
        assert_eq!(spec.parent_attributes(&attrs).len(), 1);
    }
}

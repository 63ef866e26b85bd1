//! Provider trait definition

use crate::credential::Credential;
use crate::diagnostic::Diagnostic;
use crate::pagination::{Page, PageCursor};
use crate::spec::{ResourceId, ResourceSpec};
use crate::state::{AttributeMap, DesiredState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a single API call needs besides its arguments
#[derive(Debug, Clone)]
pub struct CallContext {
    pub spec: ResourceSpec,
    pub credential: Credential,
}

impl CallContext {
    pub fn new(spec: ResourceSpec, credential: Credential) -> Self {
        Self { spec, credential }
    }
}

/// Result of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The object did not exist any more
    AlreadyGone,
}

/// Remote API abstraction
///
/// The reconciler drives every resource type through these six calls. A
/// provider maps them onto its endpoints; resource-type differences live
/// in the [`ResourceSpec`] carried by the [`CallContext`].
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Returns the provider name (e.g., "openai")
    fn name(&self) -> &str;

    /// Resource types this provider can manage
    fn specs(&self) -> &[ResourceSpec];

    /// Look up a resource type by name
    fn spec(&self, type_name: &str) -> Option<&ResourceSpec> {
        self.specs().iter().find(|s| s.type_name == type_name)
    }

    /// Create an object. `parents` holds the outer identity parts
    /// (e.g. `project_id`) needed to address the collection.
    async fn create(
        &self,
        ctx: &CallContext,
        parents: &AttributeMap,
        payload: &AttributeMap,
    ) -> Result<AttributeMap, Diagnostic>;

    /// Read an object; `None` when it does not exist.
    async fn read(&self, ctx: &CallContext, id: &ResourceId)
    -> Result<Option<AttributeMap>, Diagnostic>;

    /// Apply changed attributes in place.
    async fn update(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
        payload: &AttributeMap,
    ) -> Result<AttributeMap, Diagnostic>;

    async fn delete(&self, ctx: &CallContext, id: &ResourceId) -> Result<DeleteOutcome, Diagnostic>;

    /// Cancel a running operation; returns the operation object.
    async fn cancel(&self, ctx: &CallContext, id: &ResourceId) -> Result<AttributeMap, Diagnostic>;

    /// Fetch one page of a collection.
    async fn list_page(
        &self,
        ctx: &CallContext,
        parents: &AttributeMap,
        cursor: &PageCursor,
    ) -> Result<Page<AttributeMap>, Diagnostic>;
}

/// Set of resources to be managed, keyed by `type:name`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.key(), resource);
    }

    pub fn get(&self, resource_type: &str, name: &str) -> Option<&ResourceConfig> {
        let key = format!("{}:{}", resource_type, name);
        self.resources.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<ResourceConfig> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = ResourceConfig>>(iter: I) -> Self {
        let mut set = Self::new();
        for resource in iter {
            set.add(resource);
        }
        set
    }
}

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "project", "invite")
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Local name, unique per type
    pub name: String,

    /// Desired attributes
    #[serde(default)]
    pub attributes: AttributeMap,

    /// Per-resource credential override
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            attributes,
            credential: None,
        }
    }

    /// Get the full resource key (type:name)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.name)
    }

    pub fn desired(&self) -> DesiredState {
        DesiredState::new(self.attributes.clone())
    }

    /// Get an attribute as a specific type
    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

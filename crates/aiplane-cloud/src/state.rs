//! Desired and observed resource state
//!
//! State is passed in by the caller and handed back after each pass; this
//! crate never persists it.

use crate::spec::{ResourceId, ResourceSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Attribute map shared by desired and remote state
pub type AttributeMap = serde_json::Map<String, Value>;

/// Desired configuration of one resource instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    pub attributes: AttributeMap,
}

impl DesiredState {
    pub fn new(attributes: AttributeMap) -> Self {
        Self { attributes }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Attributes that go into a create or update payload.
    pub fn payload(&self, spec: &ResourceSpec) -> AttributeMap {
        self.attributes
            .iter()
            .filter(|(k, _)| spec.is_writable(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Snapshot of one resource instance as last observed from the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteState {
    /// Remote identity
    pub id: ResourceId,

    /// Resource type
    pub resource_type: String,

    /// Current lifecycle status
    pub status: ResourceStatus,

    /// Observed attributes
    pub attributes: AttributeMap,

    /// Attributes excluded from drift comparison for this instance
    #[serde(default)]
    pub untracked: BTreeSet<String>,

    /// When the snapshot was taken
    pub observed_at: DateTime<Utc>,
}

impl RemoteState {
    pub fn new(id: ResourceId, resource_type: impl Into<String>) -> Self {
        Self {
            id,
            resource_type: resource_type.into(),
            status: ResourceStatus::Present,
            attributes: AttributeMap::new(),
            untracked: BTreeSet::new(),
            observed_at: Utc::now(),
        }
    }

    /// Build a snapshot from an API object.
    ///
    /// `parents` supplies identity parts the object itself does not echo back
    /// (for example the project id of a project API key).
    pub fn from_remote(
        spec: &ResourceSpec,
        parents: &AttributeMap,
        mut object: AttributeMap,
    ) -> Option<Self> {
        for (k, v) in parents {
            object.entry(k.clone()).or_insert_with(|| v.clone());
        }
        let id = spec.id_from_attributes(&object)?;
        Some(Self {
            id,
            resource_type: spec.type_name.clone(),
            status: ResourceStatus::Present,
            attributes: object,
            untracked: BTreeSet::new(),
            observed_at: Utc::now(),
        })
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
        self.observed_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Remove the type's sensitive attributes and mark them untracked.
    /// Unrecoverable values are left unset rather than guessed.
    pub fn strip_sensitive(&mut self, spec: &ResourceSpec) {
        for attr in &spec.sensitive {
            self.attributes.remove(attr);
            self.untracked.insert(attr.clone());
        }
    }

    /// Carry untracked markers and still-unreadable values over from an
    /// earlier snapshot of the same instance.
    pub fn inherit_untracked(&mut self, previous: &RemoteState) {
        for attr in &previous.untracked {
            self.untracked.insert(attr.clone());
            if !self.attributes.contains_key(attr) {
                if let Some(value) = previous.attributes.get(attr) {
                    self.attributes.insert(attr.clone(), value.clone());
                }
            }
        }
    }

    /// Key used in reports: `type:id`
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }
}

/// Lifecycle status of one resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource does not exist remotely
    Absent,
    /// Resource is being created (async job still running)
    Creating,
    /// Resource exists
    Present,
    /// Resource is being updated in place
    Updating,
    /// Resource is being replaced
    Replacing,
    /// Resource is being deleted
    Deleting,
    /// Resource is being imported
    Importing,
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Absent => write!(f, "absent"),
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Present => write!(f, "present"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Replacing => write!(f, "replacing"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Importing => write!(f, "importing"),
        }
    }
}

/// One attribute that differs between desired and observed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDiff {
    pub attribute: String,
    pub desired: Value,
    pub observed: Value,
}

/// Compare desired attributes against an observed snapshot.
///
/// Only attributes present in `desired` are compared. An attribute missing
/// from `observed` is unknown, not absent, and never counts as drift.
pub fn diff(spec: &ResourceSpec, desired: &DesiredState, observed: &RemoteState) -> Vec<AttributeDiff> {
    desired
        .attributes
        .iter()
        .filter(|(k, _)| spec.is_tracked(k) && !observed.untracked.contains(k.as_str()))
        .filter_map(|(k, want)| {
            let have = observed.attributes.get(k)?;
            if values_match(want, have) {
                None
            } else {
                Some(AttributeDiff {
                    attribute: k.clone(),
                    desired: want.clone(),
                    observed: have.clone(),
                })
            }
        })
        .collect()
}

/// Structural comparison where desired objects may be a subset of observed
/// objects (the API often echoes extra server-side keys).
fn values_match(desired: &Value, observed: &Value) -> bool {
    match (desired, observed) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(k, v)| have.get(k).is_none_or(|h| values_match(v, h))),
        (Value::Array(want), Value::Array(have)) => {
            want.len() == have.len() && want.iter().zip(have).all(|(w, h)| values_match(w, h))
        }
        (Value::Number(want), Value::Number(have)) => match (want.as_f64(), have.as_f64()) {
            (Some(w), Some(h)) => w == h,
            _ => want == have,
        },
        _ => desired == observed,
    }
}

//! Manifest (YAML) and state (JSON) documents

use aiplane_cloud::{RemoteState, ResourceConfig, ResourceSet};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const STATE_VERSION: u32 = 1;

/// Read a manifest: a YAML list of `{type, name, attributes, credential}`.
pub fn load_manifest(path: &Path) -> anyhow::Result<ResourceSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let entries: Vec<ResourceConfig> = if content.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?
    };

    let mut set = ResourceSet::new();
    for entry in entries {
        crate::utils::find_spec(&entry.resource_type)?;
        if entry.name.trim().is_empty() {
            bail!("{} entry without a name", entry.resource_type);
        }
        if set.get(&entry.resource_type, &entry.name).is_some() {
            bail!("duplicate manifest entry {}", entry.key());
        }
        set.add(entry);
    }
    Ok(set)
}

/// Observed state, keyed by manifest key (`type:name`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, RemoteState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Read a state file; a missing path yields an empty state.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::info!("State file {} does not exist yet", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state {}", path.display()))?;
        if state.version != STATE_VERSION {
            bail!(
                "unsupported state version {} in {} (expected {})",
                state.version,
                path.display(),
                STATE_VERSION
            );
        }
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content + "\n")
            .with_context(|| format!("failed to write state {}", path.display()))
    }

    /// Record the outcome for `key`: `None` drops it.
    pub fn record(&mut self, key: &str, state: Option<RemoteState>) {
        match state {
            Some(state) => {
                self.resources.insert(key.to_string(), state);
            }
            None => {
                self.resources.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiplane_cloud::ResourceId;

    #[test]
    fn test_manifest_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(
            &path,
            "- type: project\n  name: ml\n- type: project\n  name: ml\n",
        )
        .unwrap();
        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_manifest_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, "- type: spaceship\n  name: x\n").unwrap();
        assert!(load_manifest(&path).is_err());
    }

    #[test]
    fn test_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = StateFile::default();
        state.record(
            "project:ml",
            Some(RemoteState::new(ResourceId::simple("proj_1"), "project")),
        );
        state.save(&path).unwrap();

        let mut loaded = StateFile::load(Some(&path)).unwrap();
        assert_eq!(loaded.resources.len(), 1);
        loaded.record("project:ml", None);
        assert!(loaded.resources.is_empty());
    }

    #[test]
    fn test_missing_state_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert!(state.resources.is_empty());
    }
}

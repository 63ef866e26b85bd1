//! Planned actions for managed resources

use crate::state::AttributeDiff;
use serde::{Deserialize, Serialize};

/// Represents a planned action for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Manifest key of the resource (`type:name`), or `type:id` for imports
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g., "project", "invite")
    pub resource_type: String,

    /// Remote identity, when the resource already exists
    pub resource_id: Option<String>,

    /// Description of the action
    pub description: String,

    /// Attributes that differ between desired and observed state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<AttributeDiff>,
}

impl Action {
    pub fn new(
        id: impl Into<String>,
        action_type: ActionType,
        resource_type: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        Self {
            id: id.into(),
            description: format!("{} {}", action_type, resource_type),
            action_type,
            resource_type,
            resource_id: None,
            changes: Vec::new(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_changes(mut self, changes: Vec<AttributeDiff>) -> Self {
        self.changes = changes;
        self
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource in place
    Update,
    /// Create a new instance and remove the old one
    Replace,
    /// Delete a resource
    Delete,
    /// Adopt an existing remote resource
    Import,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::Import => write!(f, "import"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.count(ActionType::Create),
            update: self.count(ActionType::Update),
            replace: self.count(ActionType::Replace),
            delete: self.count(ActionType::Delete),
            import: self.count(ActionType::Import),
            no_change: self.count(ActionType::NoOp),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub import: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )?;
        if self.import > 0 {
            write!(f, ", {} to import", self.import)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_summary() {
        let plan = Plan::new(vec![
            Action::new("project:ml", ActionType::Create, "project"),
            Action::new("file:train", ActionType::Replace, "file"),
            Action::new("invite:bob", ActionType::NoOp, "invite"),
        ]);
        assert!(plan.has_changes);

        let summary = plan.summary();
        assert_eq!(summary.create, 1);
        assert_eq!(summary.replace, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(
            summary.to_string(),
            "1 to create, 0 to update, 1 to replace, 0 to delete, 1 unchanged"
        );
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::new("project:ml", ActionType::NoOp, "project")]);
        assert!(!plan.has_changes);
        assert!(!Plan::empty().has_changes);
    }

    #[test]
    fn test_default_description() {
        let action = Action::new("project:ml", ActionType::Delete, "project").with_resource_id("proj_1");
        assert_eq!(action.description, "delete project");
        assert_eq!(action.resource_id.as_deref(), Some("proj_1"));
    }
}

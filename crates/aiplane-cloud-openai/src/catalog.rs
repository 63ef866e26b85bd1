//! Resource catalog
//!
//! Endpoint layout and capability flags for every manageable OpenAI type.

use aiplane_cloud::{Capabilities, ResourceSpec};

const ASSISTANTS_BETA: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// How a delete is expressed for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStyle {
    /// `DELETE {path}/{id}`
    Delete,
    /// `POST {path}/{id}/archive`
    Archive,
}

/// Endpoint description of one resource type
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub spec: ResourceSpec,
    /// Collection path; `{project_id}` style placeholders name identity parts
    pub collection: &'static str,
    pub delete_style: DeleteStyle,
    pub headers: &'static [(&'static str, &'static str)],
}

impl Endpoint {
    fn new(spec: ResourceSpec, collection: &'static str) -> Self {
        Self {
            spec,
            collection,
            delete_style: DeleteStyle::Delete,
            headers: &[],
        }
    }

    fn archived(mut self) -> Self {
        self.delete_style = DeleteStyle::Archive;
        self
    }

    fn beta(mut self) -> Self {
        self.headers = &[ASSISTANTS_BETA];
        self
    }

    pub fn type_name(&self) -> &str {
        &self.spec.type_name
    }
}

/// Every resource type the OpenAI provider manages.
pub fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new(
            ResourceSpec::new("project", Capabilities::crud().admin())
                .with_computed(&["status", "archived_at"]),
            "/organization/projects",
        )
        .archived(),
        Endpoint::new(
            ResourceSpec::new("project_user", Capabilities::crud().admin())
                .with_identity(&["project_id", "user_id"])
                .with_computed(&["name", "email", "added_at"]),
            "/organization/projects/{project_id}/users",
        ),
        Endpoint::new(
            ResourceSpec::new("project_service_account", Capabilities::immutable().admin())
                .with_identity(&["project_id", "id"])
                .with_computed(&["role"])
                .with_sensitive(&["api_key"]),
            "/organization/projects/{project_id}/service_accounts",
        ),
        Endpoint::new(
            ResourceSpec::new(
                "project_api_key",
                Capabilities::immutable().admin().import_only(),
            )
            .with_identity(&["project_id", "id"])
            .with_computed(&["redacted_value", "owner", "last_used_at"])
            .with_sensitive(&["value"]),
            "/organization/projects/{project_id}/api_keys",
        ),
        Endpoint::new(
            ResourceSpec::new("admin_api_key", Capabilities::immutable().admin())
                .with_computed(&["redacted_value", "owner", "last_used_at"])
                .with_sensitive(&["value"]),
            "/organization/admin_api_keys",
        ),
        Endpoint::new(
            ResourceSpec::new("invite", Capabilities::immutable().admin())
                .with_computed(&["status", "invited_at", "expires_at", "accepted_at"])
                .with_write_only(&["projects"]),
            "/organization/invites",
        ),
        Endpoint::new(
            ResourceSpec::new("user", Capabilities::crud().admin().import_only())
                .with_computed(&["name", "email", "added_at"]),
            "/organization/users",
        ),
        Endpoint::new(
            ResourceSpec::new("file", Capabilities::immutable().import_only())
                .with_computed(&["bytes", "filename", "status", "status_details"]),
            "/files",
        ),
        Endpoint::new(
            ResourceSpec::new("fine_tuning_job", Capabilities::job()).with_computed(&[
                "status",
                "fine_tuned_model",
                "finished_at",
                "trained_tokens",
                "result_files",
                "error",
                "organization_id",
                "estimated_finish",
            ]),
            "/fine_tuning/jobs",
        ),
        Endpoint::new(
            ResourceSpec::new("batch", Capabilities::job()).with_computed(&[
                "status",
                "output_file_id",
                "error_file_id",
                "request_counts",
                "errors",
                "in_progress_at",
                "completed_at",
                "failed_at",
                "expired_at",
                "expires_at",
                "cancelling_at",
                "cancelled_at",
                "finalizing_at",
            ]),
            "/batches",
        ),
        Endpoint::new(ResourceSpec::new("assistant", Capabilities::crud()), "/assistants").beta(),
        Endpoint::new(
            ResourceSpec::new(
                "vector_store",
                Capabilities {
                    is_async: true,
                    ..Capabilities::crud()
                },
            )
            .with_computed(&[
                "status",
                "usage_bytes",
                "file_counts",
                "last_active_at",
                "expires_at",
            ]),
            "/vector_stores",
        )
        .beta(),
        Endpoint::new(
            ResourceSpec::new("model", Capabilities::immutable().import_only())
                .with_computed(&["owned_by"]),
            "/models",
        ),
    ]
}

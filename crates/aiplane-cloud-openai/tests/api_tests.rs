//! Integration tests for the OpenAI provider against a mock HTTP server.

use aiplane_cloud::{
    CredentialConfig, CredentialRouter, DesiredState, DiagnosticCode, PageCursor, Reconciler,
    RemoteState, ResourceApi, ResourceId, ResourceStatus, Severity,
};
use aiplane_cloud_openai::{EngineConfig, OpenAiProvider, RateLimitConfig, RetryPolicy};
use futures_util::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_KEY: &str = "sk-admin-test";
const PROJECT_KEY: &str = "sk-proj-test";

fn config(server: &MockServer) -> EngineConfig {
    EngineConfig {
        base_url: format!("{}/v1", server.uri()),
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter: false,
            ..Default::default()
        },
        rate_limit: RateLimitConfig::disabled(),
        ..Default::default()
    }
}

fn reconciler(server: &MockServer) -> Reconciler {
    let provider = OpenAiProvider::new(config(server)).unwrap();
    let router = CredentialRouter::new(CredentialConfig {
        env_admin_key: Some(ADMIN_KEY.to_string()),
        env_project_key: Some(PROJECT_KEY.to_string()),
        ..Default::default()
    });
    Reconciler::new(Arc::new(provider), router)
}

fn openai_error(message: &str, kind: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": kind,
            "param": null,
            "code": null
        }
    })
}

fn project(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "object": "organization.project",
        "name": name,
        "created_at": 1711471533,
        "archived_at": null,
        "status": "active"
    })
}

#[tokio::test]
async fn test_create_project_with_admin_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/organization/projects"))
        .and(header("authorization", format!("Bearer {}", ADMIN_KEY).as_str()))
        .and(body_json(json!({"name": "research"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(project("proj_abc", "research")))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("project").unwrap().clone();
    let desired = DesiredState::default().with_attribute("name", json!("research"));

    let result = reconciler.reconcile(&spec, Some(&desired), None, None).await;

    assert!(result.is_success(), "{:?}", result.diagnostics);
    assert_eq!(result.status, ResourceStatus::Present);
    let state = result.state.unwrap();
    assert_eq!(state.id.to_string(), "proj_abc");
    assert_eq!(state.get_attribute::<String>("name").as_deref(), Some("research"));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/organization/projects/proj_abc"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after-ms", "20")
                .set_body_json(openai_error("Rate limit reached", "requests")),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/organization/projects/proj_abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(project("proj_abc", "research")))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("project").unwrap().clone();
    let result = reconciler.import_resource(&spec, "proj_abc", None).await;

    assert!(result.is_success(), "{:?}", result.diagnostics);
    assert_eq!(result.status, ResourceStatus::Present);
}

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/files/file-1"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(openai_error("The server is overloaded", "server_error")),
        )
        .expect(3)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("file").unwrap().clone();
    let result = reconciler.import_resource(&spec, "file-1", None).await;

    assert_eq!(result.fatal_count(), 1);
    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, DiagnosticCode::ServerError);
    assert_eq!(diag.status, Some(503));
    assert_eq!(diag.resource.as_deref(), Some("file:file-1"));
}

#[tokio::test]
async fn test_project_key_cannot_reach_admin_endpoint() {
    let server = MockServer::start().await;

    let provider = OpenAiProvider::new(config(&server)).unwrap();
    let router = CredentialRouter::new(CredentialConfig {
        env_project_key: Some(PROJECT_KEY.to_string()),
        ..Default::default()
    });
    let reconciler = Reconciler::new(Arc::new(provider), router);
    let spec = reconciler.api().spec("invite").unwrap().clone();
    let desired = DesiredState::default()
        .with_attribute("email", json!("dev@example.com"))
        .with_attribute("role", json!("reader"));

    let result = reconciler.reconcile(&spec, Some(&desired), None, None).await;

    assert_eq!(result.diagnostics[0].code, DiagnosticCode::MissingCredential);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_accepted_invite_is_removed_from_state() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/organization/invites/invite-abc"))
        .respond_with(ResponseTemplate::new(400).set_body_json(openai_error(
            "Invite has already been accepted and cannot be deleted",
            "invalid_request_error",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("invite").unwrap().clone();
    let observed = RemoteState::new(ResourceId::simple("invite-abc"), "invite")
        .with_attribute("email", json!("dev@example.com"));

    let result = reconciler.reconcile(&spec, None, Some(&observed), None).await;

    assert!(result.is_success());
    assert_eq!(result.status, ResourceStatus::Absent);
    assert!(result.state.is_none());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].severity, Severity::Info);
}

#[tokio::test]
async fn test_delete_of_missing_object_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/organization/projects/proj_gone/archive"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(openai_error("Project not found", "invalid_request_error")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("project").unwrap().clone();
    let observed = RemoteState::new(ResourceId::simple("proj_gone"), "project");

    let result = reconciler.reconcile(&spec, None, Some(&observed), None).await;

    assert!(result.is_success());
    assert_eq!(result.status, ResourceStatus::Absent);
}

#[tokio::test]
async fn test_list_follows_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/organization/projects/proj_1/api_keys"))
        .and(query_param("after", "key_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "key_3", "name": "c"}],
            "first_id": "key_3",
            "last_id": "key_3",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/organization/projects/proj_1/api_keys"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "key_1", "name": "a"}, {"id": "key_2", "name": "b"}],
            "first_id": "key_1",
            "last_id": "key_2",
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("project_api_key").unwrap().clone();
    let mut filter = serde_json::Map::new();
    filter.insert("project_id".into(), json!("proj_1"));

    let items: Vec<_> = reconciler
        .list(&spec, filter, PageCursor::first(2), None)
        .collect()
        .await;
    let ids: Vec<String> = items
        .into_iter()
        .map(|item| item.unwrap()["id"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(ids, vec!["key_1", "key_2", "key_3"]);
}

#[tokio::test]
async fn test_non_json_response_reports_base_url_hint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models/gpt-4o"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy login</html>"))
        .mount(&server)
        .await;

    let reconciler = reconciler(&server);
    let spec = reconciler.api().spec("model").unwrap().clone();
    let result = reconciler.import_resource(&spec, "gpt-4o", None).await;

    let diag = &result.diagnostics[0];
    assert_eq!(diag.code, DiagnosticCode::UnexpectedResponseFormat);
    assert!(diag.message.contains("base URL"));
}

#[tokio::test]
async fn test_fine_tuning_job_is_polled_to_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/fine_tuning/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ftjob-1",
            "object": "fine_tuning.job",
            "model": "gpt-4o-mini",
            "training_file": "file-abc",
            "status": "validating_files",
            "created_at": 1721764800
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/fine_tuning/jobs/ftjob-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ftjob-1",
            "object": "fine_tuning.job",
            "model": "gpt-4o-mini",
            "training_file": "file-abc",
            "status": "succeeded",
            "fine_tuned_model": "ft:gpt-4o-mini:org::abc",
            "created_at": 1721764800,
            "finished_at": 1721765800
        })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(config(&server)).unwrap();
    let router = CredentialRouter::new(CredentialConfig {
        env_project_key: Some(PROJECT_KEY.to_string()),
        ..Default::default()
    });
    let reconciler = Reconciler::new(Arc::new(provider), router).with_poller(aiplane_cloud::Poller::new(
        aiplane_cloud::PollConfig {
            initial_interval: Duration::from_millis(10),
            multiplier: 2,
            max_interval: Duration::from_millis(40),
        },
        tokio_util::sync::CancellationToken::new(),
    ));
    let spec = reconciler.api().spec("fine_tuning_job").unwrap().clone();
    let desired = DesiredState::default()
        .with_attribute("model", json!("gpt-4o-mini"))
        .with_attribute("training_file", json!("file-abc"));

    let result = reconciler.reconcile(&spec, Some(&desired), None, None).await;

    assert!(result.is_success(), "{:?}", result.diagnostics);
    assert_eq!(result.status, ResourceStatus::Present);
    let state = result.state.unwrap();
    assert_eq!(
        state.get_attribute::<String>("fine_tuned_model").as_deref(),
        Some("ft:gpt-4o-mini:org::abc")
    );
}

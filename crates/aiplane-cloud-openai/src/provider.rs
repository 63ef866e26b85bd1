//! OpenAI provider implementation

use crate::catalog::{DeleteStyle, Endpoint, endpoints};
use crate::engine::{ApiRequest, ApiResponse, EngineConfig, ExecutionEngine, Intent};
use crate::error::{OpenAiError, Result};
use crate::transport::{HttpTransport, ReqwestTransport};
use aiplane_cloud::{
    AttributeMap, CallContext, DeleteOutcome, Diagnostic, DiagnosticCode, Page, PageCursor,
    ResourceApi, ResourceId, ResourceSpec,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = concat!("aiplane/", env!("CARGO_PKG_VERSION"));

/// OpenAI platform provider
pub struct OpenAiProvider {
    engine: ExecutionEngine,
    endpoints: Vec<Endpoint>,
    specs: Vec<ResourceSpec>,
}

impl OpenAiProvider {
    /// Provider talking to the real API over reqwest.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(USER_AGENT)?;
        Self::with_transport(Arc::new(transport), config)
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: EngineConfig) -> Result<Self> {
        validate_base_url(&config.base_url)?;
        if config.retry.max_attempts == 0 {
            return Err(OpenAiError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let endpoints = endpoints();
        let specs = endpoints.iter().map(|e| e.spec.clone()).collect();
        Ok(Self {
            engine: ExecutionEngine::new(transport, config),
            endpoints,
            specs,
        })
    }

    /// Share the run's abort token with the engine.
    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.engine = self.engine.with_abort(abort);
        self
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    fn endpoint(&self, spec: &ResourceSpec) -> std::result::Result<&Endpoint, Diagnostic> {
        self.endpoints
            .iter()
            .find(|e| e.type_name() == spec.type_name)
            .ok_or_else(|| {
                Diagnostic::fatal(
                    DiagnosticCode::InvalidRequest,
                    format!("unsupported resource type '{}'", spec.type_name),
                )
            })
    }

    /// Base request with the endpoint's extra headers.
    fn request(&self, endpoint: &Endpoint, request: ApiRequest, resource: String) -> ApiRequest {
        endpoint
            .headers
            .iter()
            .fold(request.with_resource(resource), |req, (name, value)| {
                req.with_header(*name, *value)
            })
    }

    async fn call(&self, ctx: &CallContext, request: ApiRequest) -> std::result::Result<ApiResponse, Diagnostic> {
        self.engine.execute(&ctx.credential, request).await
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(base_url).map_err(|e| OpenAiError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(OpenAiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(())
}

/// Fill `{name}` placeholders of a collection path from attribute values.
fn collection_path(endpoint: &Endpoint, parents: &AttributeMap) -> std::result::Result<String, Diagnostic> {
    let spec = &endpoint.spec;
    let mut path = endpoint.collection.to_string();
    for name in &spec.identity[..spec.identity.len().saturating_sub(1)] {
        let value = parents.get(name).and_then(scalar).ok_or_else(|| {
            Diagnostic::fatal(
                DiagnosticCode::InvalidRequest,
                format!("{} requires '{}' to address its collection", spec.type_name, name),
            )
        })?;
        path = path.replace(&format!("{{{}}}", name), &value);
    }
    Ok(path)
}

fn object_path(endpoint: &Endpoint, id: &ResourceId) -> std::result::Result<String, Diagnostic> {
    let parents = id.to_attributes(&endpoint.spec);
    let collection = collection_path(endpoint, &parents)?;
    Ok(format!("{}/{}", collection, id.leaf()))
}

fn label(spec: &ResourceSpec, id: impl std::fmt::Display) -> String {
    format!("{}:{}", spec.type_name, id)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Take the JSON object out of a response and expose its `id` under the
/// spec's id attribute.
fn into_object(spec: &ResourceSpec, body: Value) -> std::result::Result<AttributeMap, Diagnostic> {
    let Value::Object(mut object) = body else {
        return Err(Diagnostic::fatal(
            DiagnosticCode::UnexpectedResponseFormat,
            format!("expected a JSON object for {}", spec.type_name),
        ));
    };
    let id_attribute = spec.id_attribute();
    if id_attribute != "id" && !object.contains_key(id_attribute) {
        if let Some(id) = object.get("id").cloned() {
            object.insert(id_attribute.to_string(), id);
        }
    }
    Ok(object)
}

/// List envelope: `{"object": "list", "data": [...], "has_more": ..}`
fn into_page(
    spec: &ResourceSpec,
    cursor: &PageCursor,
    body: Value,
) -> std::result::Result<Page<AttributeMap>, Diagnostic> {
    let malformed = || {
        Diagnostic::fatal(
            DiagnosticCode::UnexpectedResponseFormat,
            format!("expected a list envelope for {}", spec.type_name),
        )
    };
    let Value::Object(mut envelope) = body else {
        return Err(malformed());
    };
    let Some(Value::Array(items)) = envelope.remove("data") else {
        return Err(malformed());
    };
    let data = items
        .into_iter()
        .map(|item| into_object(spec, item))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let has_more = envelope
        .get("has_more")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let (edge_key, edge_item) = if cursor.is_backward() {
        ("first_id", data.first())
    } else {
        ("last_id", data.last())
    };
    let next_cursor = envelope
        .get(edge_key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| edge_item.and_then(|item| item.get("id")).and_then(Value::as_str).map(str::to_string));

    Ok(Page::new(data, has_more, if has_more { next_cursor } else { None }))
}

#[async_trait]
impl ResourceApi for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    async fn create(
        &self,
        ctx: &CallContext,
        parents: &AttributeMap,
        payload: &AttributeMap,
    ) -> std::result::Result<AttributeMap, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let path = collection_path(endpoint, parents)?;
        let request = self.request(
            endpoint,
            ApiRequest::post(path).with_body(Value::Object(payload.clone())),
            ctx.spec.type_name.clone(),
        );
        let response = self.call(ctx, request).await?;
        let mut object = into_object(&ctx.spec, response.body)?;
        for (k, v) in parents {
            object.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Ok(object)
    }

    async fn read(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
    ) -> std::result::Result<Option<AttributeMap>, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let request = self.request(
            endpoint,
            ApiRequest::get(object_path(endpoint, id)?),
            label(&ctx.spec, id),
        );
        match self.call(ctx, request).await {
            Ok(response) => into_object(&ctx.spec, response.body).map(Some),
            Err(diag) if diag.code == DiagnosticCode::NotFound => {
                tracing::debug!("{} not found", label(&ctx.spec, id));
                Ok(None)
            }
            Err(diag) => Err(diag),
        }
    }

    async fn update(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
        payload: &AttributeMap,
    ) -> std::result::Result<AttributeMap, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let request = self.request(
            endpoint,
            ApiRequest::post(object_path(endpoint, id)?).with_body(Value::Object(payload.clone())),
            label(&ctx.spec, id),
        );
        let response = self.call(ctx, request).await?;
        into_object(&ctx.spec, response.body)
    }

    async fn delete(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
    ) -> std::result::Result<DeleteOutcome, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let path = object_path(endpoint, id)?;
        let request = match endpoint.delete_style {
            DeleteStyle::Delete => ApiRequest::delete(path),
            DeleteStyle::Archive => {
                ApiRequest::post(format!("{}/archive", path)).with_intent(Intent::Delete)
            }
        };
        let request = self.request(endpoint, request, label(&ctx.spec, id));

        let response = self.call(ctx, request).await?;
        if response.gone {
            return Ok(DeleteOutcome::AlreadyGone);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn cancel(
        &self,
        ctx: &CallContext,
        id: &ResourceId,
    ) -> std::result::Result<AttributeMap, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let path = format!("{}/cancel", object_path(endpoint, id)?);
        let request = self.request(endpoint, ApiRequest::post(path), label(&ctx.spec, id));
        let response = self.call(ctx, request).await?;
        into_object(&ctx.spec, response.body)
    }

    async fn list_page(
        &self,
        ctx: &CallContext,
        parents: &AttributeMap,
        cursor: &PageCursor,
    ) -> std::result::Result<Page<AttributeMap>, Diagnostic> {
        let endpoint = self.endpoint(&ctx.spec)?;
        let path = collection_path(endpoint, parents)?;

        // identity parts are in the path; the rest of the filter is query
        let identity = &ctx.spec.identity;
        let mut query = cursor.query();
        for (name, value) in parents {
            if identity.contains(name) {
                continue;
            }
            if let Some(value) = scalar(value) {
                query.push((name.clone(), value));
            }
        }

        let request = self.request(
            endpoint,
            ApiRequest::get(path).with_query(query),
            ctx.spec.type_name.clone(),
        );
        let response = self.call(ctx, request).await?;
        into_page(&ctx.spec, cursor, response.body)
    }
}

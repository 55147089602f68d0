//! The provider-REST service (spec §4.6): synthesizes tool definitions from
//! `RestServerConfig`/`RestEndpoint` metadata and executes calls against
//! them, applying response transforms (§4.11) before returning.

mod error;
mod schema;
mod transform;

pub use error::RestAdapterError;
pub use schema::{path_vars, synthesize_tool};

use std::sync::Arc;

use async_trait::async_trait;
use cubicler_config::{RestEndpoint, RestServerConfig};
use cubicler_naming::{parse, snake, ParsedTool};
use cubicler_protocol::{McpError, ToolProvider};
use cubicler_provider_repo::ProviderRepository;
use cubicler_restrictions::ServerLookup;
use cubicler_types::ToolDefinition;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::warn;

pub struct RestAdapterService {
    servers: Vec<RestServerConfig>,
    repo: Arc<ProviderRepository>,
    client: reqwest::Client,
}

impl RestAdapterService {
    pub fn new(servers: Vec<RestServerConfig>, repo: Arc<ProviderRepository>) -> Self {
        Self {
            servers,
            repo,
            client: reqwest::Client::new(),
        }
    }

    fn server_for(&self, identifier: &str) -> Option<&RestServerConfig> {
        self.servers.iter().find(|s| s.identifier == identifier)
    }

    fn endpoint_for<'a>(&self, server: &'a RestServerConfig, function: &str) -> Option<&'a RestEndpoint> {
        server.endpoints.iter().find(|e| snake(&e.name) == function)
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        for server in &self.servers {
            let Some(hash) = self.repo.get_server_hash(&server.identifier) else {
                continue;
            };
            for endpoint in &server.endpoints {
                tools.push(synthesize_tool(&hash, endpoint));
            }
            self.repo
                .update_server_tool_count(&server.identifier, server.endpoints.len());
        }
        tools
    }

    pub fn can_handle(&self, tool_name: &str) -> bool {
        match parse(tool_name) {
            Ok(ParsedTool::External { token, function }) => self
                .repo
                .identifier_for_hash(&token)
                .and_then(|id| self.server_for(&id).map(|s| (s, function)))
                .map(|(server, function)| self.endpoint_for(server, &function).is_some())
                .unwrap_or(false),
            _ => false,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let ParsedTool::External { token, function } =
            parse(name).map_err(|e| McpError::invalid_request(e.to_string()))?
        else {
            return Err(McpError::method_not_found(format!(
                "{name} is not routed through the rest adapter"
            )));
        };

        let identifier = self
            .repo
            .identifier_for_hash(&token)
            .ok_or_else(|| McpError::invalid_request(format!("unknown server token in {name}")))?;
        let server = self
            .server_for(&identifier)
            .ok_or_else(|| McpError::invalid_request(format!("server {identifier} has no REST config")))?;
        let endpoint = self
            .endpoint_for(server, &function)
            .ok_or_else(|| McpError::method_not_found(format!("no endpoint named {function} on {identifier}")))?;

        self.execute(server, endpoint, arguments)
            .await
            .map_err(|e| match e {
                RestAdapterError::Upstream { status, reason } => {
                    McpError::upstream(format!("http {status}: {reason}"))
                }
                other => McpError::internal(other.to_string()),
            })
    }

    async fn execute(
        &self,
        server: &RestServerConfig,
        endpoint: &RestEndpoint,
        arguments: Value,
    ) -> Result<Value, RestAdapterError> {
        let args = arguments
            .as_object()
            .ok_or_else(|| RestAdapterError::MalformedArguments("arguments must be an object".to_string()))?;

        let path = substitute_path(&endpoint.path, args)?;
        let url = format!("{}{}", server.base_url.trim_end_matches('/'), path);

        let query = args.get("query").and_then(Value::as_object).cloned();
        let payload = args.get("payload").cloned();

        let headers = build_headers(server, endpoint, payload.is_some())?;

        let mut request = self.client.request(endpoint.method.as_reqwest(), url).headers(headers);
        if let Some(query) = &query {
            request = request.query(query);
        }
        if let Some(payload) = &payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(RestAdapterError::Upstream {
                status: status.as_u16(),
                reason,
            });
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        transform::apply_transforms(body, &endpoint.response_transforms).map_err(Into::into)
    }
}

fn substitute_path(template: &str, args: &serde_json::Map<String, Value>) -> Result<String, RestAdapterError> {
    let mut path = template.to_string();
    for var in path_vars(template) {
        let Some(value) = args.get(&var) else {
            return Err(RestAdapterError::MalformedArguments(format!(
                "missing required path parameter {var}"
            )));
        };
        let raw = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let encoded = percent_encoding::utf8_percent_encode(&raw, percent_encoding::NON_ALPHANUMERIC).to_string();
        path = path.replace(&format!("{{{var}}}"), &encoded);
    }
    Ok(path)
}

fn build_headers(
    server: &RestServerConfig,
    endpoint: &RestEndpoint,
    has_body: bool,
) -> Result<HeaderMap, RestAdapterError> {
    let mut headers = HeaderMap::new();
    for (name, value) in server.default_headers.iter().flatten() {
        insert_header(&mut headers, name, value);
    }
    for (name, value) in endpoint.headers.iter().flatten() {
        insert_header(&mut headers, name, value);
    }
    if let Some(auth) = &server.auth {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", auth.token))
                .map_err(|e| RestAdapterError::MalformedArguments(e.to_string()))?,
        );
    }
    if has_body {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(headers)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        headers.insert(name, value);
    } else {
        warn!(header = name, "dropping malformed header value");
    }
}

#[async_trait]
impl ToolProvider for RestAdapterService {
    async fn can_handle(&self, tool_name: &str) -> bool {
        RestAdapterService::can_handle(self, tool_name)
    }

    async fn list_tools(&self) -> Vec<ToolDefinition> {
        RestAdapterService::list_tools(self)
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        RestAdapterService::call_tool(self, tool_name, arguments).await
    }
}

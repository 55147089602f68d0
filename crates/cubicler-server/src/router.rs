use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    agents_handler, dispatch_agent_handler, dispatch_default_handler, health_handler, mcp_handler, sse_handler,
};
use crate::state::AppState;

/// Builds the broker's full HTTP surface (spec §6).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/dispatch", post(dispatch_default_handler))
        .route("/dispatch/:agent_id", post(dispatch_agent_handler))
        .route("/mcp", post(mcp_handler))
        .route("/mcp/sse", get(sse_handler))
        .route("/agents", get(agents_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use cubicler_agent_transport::SseAgentRegistry;
    use cubicler_config::{source_from_env_value, CachedConfig, Timeouts};
    use cubicler_dispatch::DispatchService;
    use cubicler_mcp_dispatcher::McpDispatcher;
    use cubicler_protocol::{McpError, ToolProvider};
    use cubicler_provider_repo::ProviderRepository;
    use cubicler_types::ToolDefinition;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EmptyProvider;

    #[async_trait]
    impl ToolProvider for EmptyProvider {
        async fn can_handle(&self, tool_name: &str) -> bool {
            tool_name == "cubicler_available_servers"
        }
        async fn list_tools(&self) -> Vec<ToolDefinition> {
            vec![]
        }
        async fn call_tool(&self, tool_name: &str, _arguments: serde_json::Value) -> Result<serde_json::Value, McpError> {
            if tool_name == "cubicler_available_servers" {
                Ok(json!({"total": 0, "servers": []}))
            } else {
                Err(McpError::method_not_found(tool_name))
            }
        }
    }

    fn temp_source(json: &str) -> (tempfile::NamedTempFile, Box<dyn cubicler_config::ConfigSource>) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{json}").unwrap();
        let source = source_from_env_value(f.path().to_str().unwrap());
        (f, source)
    }

    async fn test_state(agents_json: &str) -> AppState {
        let (_f1, agents_source) = temp_source(agents_json);
        let agents_cache = CachedConfig::new(agents_source, Duration::from_secs(60));

        let (_f2, providers_source) = temp_source(r#"{"mcp_servers":[],"rest_servers":[]}"#);
        let providers_cache = CachedConfig::new(providers_source, Duration::from_secs(60));
        let repo = Arc::new(ProviderRepository::new(providers_cache));
        repo.refresh().await.unwrap();

        let mcp = Arc::new(McpDispatcher::new(Arc::new(EmptyProvider), Arc::new(EmptyProvider), Arc::new(EmptyProvider)));
        let sse = Arc::new(SseAgentRegistry::new());
        let dispatch = Arc::new(DispatchService::new(
            agents_cache,
            repo.clone(),
            mcp.clone(),
            Timeouts::default(),
            sse.clone(),
            HashMap::new(),
        ));

        AppState { dispatch, mcp, repo, sse, auth: None }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let state = test_state(r#"{"agents":[]}"#).await;
        let router = build_router(state);
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn agents_lists_configured_agents() {
        let state = test_state(r#"{"agents":[{"identifier":"a1","name":"A","description":"d","transport":"http","url":"http://a:1"}]}"#).await;
        let router = build_router(state);
        let response = router
            .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["total"], json!(1));
        assert_eq!(parsed["agents"][0]["identifier"], json!("a1"));
    }

    #[tokio::test]
    async fn dispatch_with_empty_messages_is_bad_request() {
        let state = test_state(r#"{"agents":[{"identifier":"a1","name":"A","description":"d","transport":"http","url":"http://a:1"}]}"#).await;
        let router = build_router(state);
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/dispatch")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"messages": []}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dispatch_unknown_agent_is_not_found() {
        let state = test_state(r#"{"agents":[{"identifier":"a1","name":"A","description":"d","transport":"http","url":"http://a:1"}]}"#).await;
        let router = build_router(state);
        let body = json!({"messages": [{"sender": {"id": "u", "name": "User"}, "timestamp": "2026-01-01T00:00:00Z", "type": "text", "content": "hi"}]});
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/dispatch/ghost")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mcp_tools_list_routes_through_dispatcher() {
        let state = test_state(r#"{"agents":[]}"#).await;
        let router = build_router(state);
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(parsed["result"]["tools"].is_array());
    }
}

//! Tool synthesis from REST endpoint metadata (spec §4.6).

use cubicler_config::RestEndpoint;
use cubicler_naming::tool_name;
use cubicler_types::ToolDefinition;
use serde_json::{Map, Value};

/// Extract the `{var}` placeholder names from a path template, in order of
/// appearance.
pub fn path_vars(path: &str) -> Vec<String> {
    let mut vars = Vec::new();
    let mut chars = path.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if ch != '{' {
            continue;
        }
        let rest = &path[start + 1..];
        if let Some(end) = rest.find('}') {
            vars.push(rest[..end].to_string());
        }
    }
    vars
}

fn schema_for_path_var(endpoint: &RestEndpoint, var: &str) -> Value {
    for explicit in [&endpoint.query, &endpoint.payload].into_iter().flatten() {
        if let Some(schema) = explicit.properties.get(var) {
            return schema.clone();
        }
    }
    serde_json::json!({"type": "string"})
}

/// Build the agent-visible [`ToolDefinition`] for one REST endpoint.
pub fn synthesize_tool(hash: &str, endpoint: &RestEndpoint) -> ToolDefinition {
    let vars = path_vars(&endpoint.path);
    let mut properties = Map::new();
    let mut required = Vec::new();

    for var in &vars {
        properties.insert(var.clone(), schema_for_path_var(endpoint, var));
        required.push(var.clone());
    }

    if let Some(query) = &endpoint.query {
        properties.insert(
            "query".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": Value::Object(query.properties.clone()),
                "required": query.required,
            }),
        );
    }

    if let Some(payload) = &endpoint.payload {
        properties.insert(
            "payload".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": Value::Object(payload.properties.clone()),
                "required": payload.required,
            }),
        );
    }

    ToolDefinition {
        name: tool_name(hash, &endpoint.name),
        description: endpoint.description.clone(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubicler_config::{HttpMethod, ParamSchema};
    use pretty_assertions::assert_eq;

    fn endpoint() -> RestEndpoint {
        RestEndpoint {
            name: "get weather".to_string(),
            description: "d".to_string(),
            method: HttpMethod::Get,
            path: "/weather/{city}".to_string(),
            query: Some(ParamSchema {
                properties: serde_json::json!({"units": {"type": "string"}})
                    .as_object()
                    .unwrap()
                    .clone(),
                required: vec![],
            }),
            payload: None,
            headers: None,
            response_transforms: vec![],
        }
    }

    #[test]
    fn path_vars_extracts_in_order() {
        assert_eq!(path_vars("/a/{x}/b/{y}"), vec!["x".to_string(), "y".to_string()]);
        assert_eq!(path_vars("/static"), Vec::<String>::new());
    }

    #[test]
    fn synthesize_tool_builds_path_and_query_schema() {
        let tool = synthesize_tool("7f3c1a", &endpoint());
        assert_eq!(tool.name, "7f3c1a_get_weather");
        let props = tool.parameters.get("properties").unwrap();
        assert!(props.get("city").is_some());
        assert!(props.get("query").is_some());
        assert_eq!(
            tool.parameters.get("required").unwrap(),
            &serde_json::json!(["city"])
        );
    }
}

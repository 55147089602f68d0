//! Domain types shared across the Cubicler broker.
//!
//! Dynamic, schema-less payloads (tool parameters, message content, response
//! metadata) are represented as [`serde_json::Value`] — the natural Rust
//! rendering of the null/bool/number/string/array/object tagged sum used
//! throughout the wire formats this crate describes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type a server/tool backend is implemented as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Mcp,
    Rest,
}

/// Derived, agent-facing metadata for one configured server.
///
/// Produced by the provider repository from `ProvidersConfig`; see
/// `cubicler-provider-repo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMetadata {
    /// snake_case identifier, unique within the provider config.
    pub identifier: String,
    pub name: String,
    pub description: String,
    /// URL for MCP/REST http servers, or the command line for stdio servers.
    pub endpoint: String,
    /// 6 hex character opaque token derived from `(identifier, endpoint)`.
    pub hash: String,
    pub tools_count: usize,
    pub kind: ServerKind,
    /// Stable ordinal assigned at load time (MCP servers first, then REST).
    pub index: usize,
}

/// Agent-visible summary of a server, as embedded in an [`AgentRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSummary {
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub tools_count: usize,
}

impl From<&ServerMetadata> for ServerSummary {
    fn from(meta: &ServerMetadata) -> Self {
        Self {
            identifier: meta.identifier.clone(),
            name: meta.name.clone(),
            description: meta.description.clone(),
            tools_count: meta.tools_count,
        }
    }
}

/// A tool definition in the agent-visible, JSON-Schema-parameters shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Either `{hash}_{snake_function}` or `cubicler_{snake_name}`.
    pub name: String,
    pub description: String,
    /// JSON-Schema object describing the call's arguments.
    pub parameters: Value,
}

/// Who sent a [`Message`] or an [`AgentResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    pub name: String,
}

/// The content-kind tag carried by messages and responses.
///
/// `Null` is a distinct variant (not JSON `null`) — per the spec's data model,
/// `type` is one of the literal strings `text`, `image`, `url`, `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Url,
    Null,
}

/// One turn of a conversation, as submitted by the broker's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Per-call usage counters and free-form extras returned by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub used_token: u64,
    pub used_tools: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ResponseMetadata {
    /// The all-zero metadata used for error-shaped responses (spec §4.1 step 8).
    pub fn zero() -> Self {
        Self {
            used_token: 0,
            used_tools: 0,
            extra: HashMap::new(),
        }
    }
}

/// The response an agent transport returns for one dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// May be `Value::Null` only when `kind == MessageKind::Null`.
    pub content: Value,
    pub metadata: ResponseMetadata,
}

/// What the dispatch service hands back to the broker's client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: Value,
    pub metadata: ResponseMetadata,
}

impl DispatchResponse {
    /// Build the error-shaped response described in spec §4.1 step 8 / §7.
    pub fn error(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            sender,
            timestamp: Utc::now(),
            kind: MessageKind::Text,
            content: Value::String(message.into()),
            metadata: ResponseMetadata::zero(),
        }
    }

    pub fn from_agent_response(sender: Sender, resp: AgentResponse) -> Self {
        Self {
            sender,
            timestamp: resp.timestamp,
            kind: resp.kind,
            content: resp.content,
            metadata: resp.metadata,
        }
    }
}

/// Identity + resolved prompt of the agent handling a dispatch, as seen by
/// the agent itself (the `agent` field of an [`AgentRequest`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub prompt: String,
}

/// The fully assembled request a transport delivers to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub agent: AgentContext,
    pub tools: Vec<ToolDefinition>,
    pub servers: Vec<ServerSummary>,
    pub messages: Vec<Message>,
}

/// The inbound request accepted at the broker boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub messages: Vec<Message>,
}

/// Summary entry returned by `GET /agents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub identifier: String,
    pub name: String,
    pub description: String,
}

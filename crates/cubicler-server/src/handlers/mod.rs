mod agents;
mod dispatch;
mod health;
mod mcp;
mod sse;

pub use agents::agents_handler;
pub use dispatch::{dispatch_agent_handler, dispatch_default_handler};
pub use health::health_handler;
pub use mcp::mcp_handler;
pub use sse::sse_handler;

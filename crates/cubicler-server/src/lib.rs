//! The broker's HTTP surface (spec §6): dispatch, MCP JSON-RPC, agent SSE,
//! agent listing and health.

mod auth;
mod error;
mod handlers;
mod router;
mod state;

pub use router::build_router;
pub use state::AppState;

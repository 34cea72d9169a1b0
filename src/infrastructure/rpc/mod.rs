//! Coordination RPC surface served to agents.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{coordination_router, serve};
pub use types::ToolEnvelope;

//! Configuration loading and the project registry.

pub mod loader;
pub mod registry;

pub use loader::{ConfigError, ConfigLoader};
pub use registry::ProjectRegistry;

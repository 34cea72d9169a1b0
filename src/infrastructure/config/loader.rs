//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_agents: {0}. Must be between 1 and 100")]
    InvalidMaxAgents(usize),

    #[error("Invalid tick_interval_secs: {0}. Must be positive")]
    InvalidTickInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid planner timeout: {0}. Must be between 1 and 120 seconds")]
    InvalidPlannerTimeout(u64),

    #[error("Invalid planner rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid sweep interval: {0}. Must be positive")]
    InvalidSweepInterval(u64),

    #[error("Coordination endpoint cannot be empty")]
    EmptyEndpoint,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.trunkline/config.yaml` (project config)
    /// 3. `.trunkline/local.yaml` (local overrides, optional)
    /// 4. Environment variables (`TRUNKLINE_*` prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".trunkline/config.yaml"))
            .merge(Yaml::file(".trunkline/local.yaml"))
            .merge(Env::prefixed("TRUNKLINE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let orchestrator = &config.orchestrator;
        if orchestrator.max_concurrent_agents == 0 || orchestrator.max_concurrent_agents > 100 {
            return Err(ConfigError::InvalidMaxAgents(
                orchestrator.max_concurrent_agents,
            ));
        }
        if orchestrator.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidTickInterval(
                orchestrator.tick_interval_secs,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.planner.timeout_secs == 0 || config.planner.timeout_secs > 120 {
            return Err(ConfigError::InvalidPlannerTimeout(
                config.planner.timeout_secs,
            ));
        }
        if config.planner.requests_per_second <= 0.0 {
            return Err(ConfigError::InvalidRateLimit(
                config.planner.requests_per_second,
            ));
        }

        if config.coordination.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval(
                config.coordination.sweep_interval_secs,
            ));
        }
        if config.coordination.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        Ok(())
    }
}

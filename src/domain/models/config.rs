//! Runtime configuration model.
//!
//! Loaded hierarchically by the config loader: programmatic defaults,
//! `.trunkline/config.yaml`, `.trunkline/local.yaml`, then `TRUNKLINE_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
}

/// Scheduler loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Global cap on concurrently running agents (per project it is
    /// further capped by `project.max_agents`)
    pub max_concurrent_agents: usize,
    /// Seconds between scheduler ticks
    pub tick_interval_secs: u64,
    /// Whether completed tasks are fed to the merge queue automatically
    pub auto_merge: bool,
    /// Directory holding per-session status sentinel files
    pub status_dir: PathBuf,
    /// Command line used to launch the external agent process; the
    /// assembled prompt is appended as the final argument
    pub agent_command: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 5,
            tick_interval_secs: 60,
            auto_merge: false,
            status_dir: PathBuf::from("/tmp/trunkline-status"),
            agent_command: "claude --dangerously-skip-permissions --print".to_string(),
        }
    }
}

/// Coordination store/server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Address the RPC server binds to
    pub bind_addr: String,
    pub port: u16,
    /// Endpoint handed to spawned agents
    pub endpoint: String,
    /// Seconds between liveness sweeps
    pub sweep_interval_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5050,
            endpoint: "http://127.0.0.1:5050".to_string(),
            sweep_interval_secs: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// json | pretty
    pub format: String,
    /// Optional log file directory; stderr only when absent
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}

/// Plan-synthesis (Claude API) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Read from the environment when empty
    pub api_key: Option<String>,
    pub model: String,
    /// Hard upper bound on one synthesis call
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub requests_per_second: f64,
    pub max_retries: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            timeout_secs: 120,
            max_tokens: 8192,
            requests_per_second: 2.0,
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_concurrent_agents, 5);
        assert_eq!(config.orchestrator.tick_interval_secs, 60);
        assert!(!config.orchestrator.auto_merge);
        assert_eq!(config.coordination.port, 5050);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.planner.timeout_secs, 120);
    }

    #[test]
    fn test_yaml_section_parsing() {
        let yaml = r"
orchestrator:
  max_concurrent_agents: 3
  tick_interval_secs: 15
  auto_merge: true
logging:
  level: debug
  format: json
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.orchestrator.max_concurrent_agents, 3);
        assert_eq!(config.orchestrator.tick_interval_secs, 15);
        assert!(config.orchestrator.auto_merge);
        assert_eq!(config.logging.level, "debug");
        // Untouched section keeps defaults
        assert_eq!(config.coordination.port, 5050);
    }
}

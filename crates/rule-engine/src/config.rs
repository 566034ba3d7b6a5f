//! Engine configuration

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for the rule orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Verbose per-rule logging
    #[serde(default)]
    pub debug: bool,
    /// Record every execution result in the audit log
    #[serde(default = "default_audit_enabled")]
    pub audit_enabled: bool,
    /// Maximum entries kept in the audit log; the oldest are evicted first
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
    /// Time budget per rule in milliseconds (`None` disables it)
    #[serde(default = "default_max_execution_time_ms")]
    pub max_execution_time_ms: Option<u64>,
    /// Webhook endpoint name to URL mapping
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_capacity() -> usize {
    1000
}

fn default_max_execution_time_ms() -> Option<u64> {
    Some(5000)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            audit_enabled: default_audit_enabled(),
            audit_capacity: default_audit_capacity(),
            max_execution_time_ms: default_max_execution_time_ms(),
            endpoints: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, RuleError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        tracing::debug!("Loaded engine configuration from {:?}", path);
        Ok(config)
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), url.into());
        self
    }

    /// Per-rule time budget
    pub fn max_execution_time(&self) -> Option<Duration> {
        self.max_execution_time_ms.map(Duration::from_millis)
    }
}

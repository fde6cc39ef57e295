//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Explicit engine configuration, threaded through dispatcher construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker tasks pulling ready actions.
    #[serde(default = "EngineConfig::default_workers")]
    pub workers: usize,
    /// Default per-action running-time bound in seconds.
    #[serde(default = "EngineConfig::default_action_timeout")]
    pub default_action_timeout: i64,
    /// How many times a retryable action is requeued before failing.
    #[serde(default = "EngineConfig::default_max_retries")]
    pub max_retries: u32,
    /// Worker poll interval in milliseconds; the fallback when wakeup
    /// notifications are dropped.
    #[serde(default = "EngineConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper size bound applied to clusters without their own `max_size`.
    #[serde(default = "EngineConfig::default_max_nodes_per_cluster")]
    pub max_nodes_per_cluster: u32,
}

impl EngineConfig {
    fn default_workers() -> usize {
        4
    }

    fn default_action_timeout() -> i64 {
        3600
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_poll_interval_ms() -> u64 {
        500
    }

    fn default_max_nodes_per_cluster() -> u32 {
        1000
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            default_action_timeout: Self::default_action_timeout(),
            max_retries: Self::default_max_retries(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_nodes_per_cluster: Self::default_max_nodes_per_cluster(),
        }
    }
}

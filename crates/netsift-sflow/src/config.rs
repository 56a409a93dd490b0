//! Collector-side settings for sFlow decoding and agent aggregation

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sub-agent id parity that marks downstream traffic.
///
/// Exporters are commonly configured with one sub-agent per direction; which
/// parity means "downstream" is a deployment convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamParity {
    Even,
    #[default]
    Odd,
}

impl DownstreamParity {
    pub fn is_downstream(self, sub_agent_id: u32) -> bool {
        let odd = sub_agent_id % 2 == 1;
        match self {
            DownstreamParity::Even => !odd,
            DownstreamParity::Odd => odd,
        }
    }
}

/// sFlow collector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SflowConfig {
    /// Rate window length in seconds
    pub window_secs: u64,

    /// Rate samples kept per agent (720 windows of 5s = 1 hour)
    pub history_capacity: usize,

    /// Which sub-agent id parity is downstream
    pub downstream_parity: DownstreamParity,

    /// Agents silent for longer than this are dropped by `evict_idle`;
    /// `None` keeps every agent forever
    pub agent_idle_timeout_secs: Option<u64>,

    /// Reject sampled headers that had bytes stripped by the exporter
    pub require_unstripped: bool,
}

impl Default for SflowConfig {
    fn default() -> Self {
        Self {
            window_secs: 5,
            history_capacity: 720,
            downstream_parity: DownstreamParity::default(),
            agent_idle_timeout_secs: None,
            require_unstripped: true,
        }
    }
}

impl SflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if self.agent_idle_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.agent_idle_timeout_secs.map(Duration::from_secs)
    }
}

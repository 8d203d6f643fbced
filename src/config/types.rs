//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runner configuration, threaded into the supervisor at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Print verbose-tagged progress lines.
    pub verbose: bool,
    /// Agent executable override.
    pub agent_bin: Option<PathBuf>,
    /// Base arguments passed to the agent before generated ones.
    pub base_args: Vec<String>,
    /// Hard timeout for one run, in seconds. None means no timeout.
    pub timeout_secs: Option<u64>,
    /// Additional rate-limit phrase markers.
    pub limit_markers: Vec<String>,
    /// Additional context-overflow phrase markers.
    pub context_markers: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            agent_bin: None,
            base_args: vec![
                "--output-format".to_string(),
                "stream-json".to_string(),
            ],
            timeout_secs: None,
            limit_markers: Vec::new(),
            context_markers: Vec::new(),
        }
    }
}

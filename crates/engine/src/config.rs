use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

/// Engine settings. Missing fields in a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for job execution (at least one).
    pub worker_threads: usize,
    /// Drain pending frontend records before running jobs. When false the
    /// drain happens after the jobs of the frame.
    pub drain_before_jobs: bool,
    /// Log records that no registered aspect handles.
    pub log_unrouted_changes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            drain_before_jobs: true,
            log_unrouted_changes: true,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.worker_threads = config.worker_threads.max(1);
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_threads = workers.max(1);
        self
    }
}

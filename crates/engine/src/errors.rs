/// Errors raised while planning a frame's jobs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("dependency cycle among jobs: {}", jobs.join(", "))]
    DependencyCycle { jobs: Vec<String> },
}

/// Errors surfaced by the aspect engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

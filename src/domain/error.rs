use thiserror::Error;

/// Faults the pipeline reports but never propagates past a batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("action failed for item {item_id}: {reason}")]
    Action { item_id: String, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Transport(_) => "transport",
            PipelineError::Parse(_) => "parse",
            PipelineError::Action { .. } => "action",
        }
    }
}

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub in_flight: bool,
    pub running: bool,
    pub stabilizing: bool,
    pub refilling: bool,
    pub batch_size: usize,
    pub completed_flights: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub processed: u64,
    pub filtered: u64,
    pub action_failures: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Info,
    Success,
    Error,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportKind::Info => "info",
            ReportKind::Success => "success",
            ReportKind::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEvent {
    pub kind: ReportKind,
    pub message: String,
}

impl ReportEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Error,
            message: message.into(),
        }
    }
}

impl From<&crate::domain::PipelineError> for ReportEvent {
    fn from(err: &crate::domain::PipelineError) -> Self {
        ReportEvent::error(err.to_string())
    }
}

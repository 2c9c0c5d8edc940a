use crate::metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// Messages a controlled page can post to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    GetPerformanceMetrics,
    SkipWaiting,
    ClearCache,
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::GetPerformanceMetrics => "GET_PERFORMANCE_METRICS",
            ControlCommand::SkipWaiting => "SKIP_WAITING",
            ControlCommand::ClearCache => "CLEAR_CACHE",
        }
    }
}

/// What the worker posts back on the reply port.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    PerformanceMetrics { metrics: MetricsSnapshot },
    Ack { command: String },
    Error { command: String, message: String },
}

use checker_core::{HealthReport, StreamEvent, TaskHandle, TaskKind};

use crate::{MetricsError, SubmissionError};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Submitted {
        kind: TaskKind,
        result: Result<TaskHandle, SubmissionError>,
    },
    Stream {
        task_id: String,
        event: StreamEvent,
    },
    Health(Result<HealthReport, MetricsError>),
}

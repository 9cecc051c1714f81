use crate::{PersonName, StreamEvent, TaskHandle, TaskKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Session start; carries the persisted handle of a task still in flight.
    Loaded { saved: Option<TaskHandle> },
    /// User asked to add a court link (raw input text).
    AddSourceRequested(String),
    /// User removed the source at this index.
    RemoveSource(usize),
    /// User asked to run a check for this person across all added sources.
    CheckRequested(PersonName),
    /// Submission endpoint accepted a task.
    TaskSubmitted { kind: TaskKind, handle: TaskHandle },
    /// Submission failed before any task id was obtained.
    SubmissionFailed { kind: TaskKind, message: String },
    /// Event delivered by the stream consumer for a task.
    Stream { task_id: String, event: StreamEvent },
    /// User dismissed the current task or result.
    Dismissed,
}

use crate::{SubmitRequest, TaskHandle, TaskKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitTask(SubmitRequest),
    AttachStream { task_id: String, kind: TaskKind },
    CloseStream { task_id: String },
    PersistTaskHandle(TaskHandle),
    ClearTaskHandle,
    /// Single transient user-visible notification.
    Notify(String),
    /// The aggregated check result is available in the view.
    ResultReady,
}

//! Stream event taxonomy and the per-task terminal state machine.
//!
//! Payloads arrive as text. [`classify_payload`] turns any payload, JSON or
//! not, into a [`StreamEvent`] without failing. A [`TaskTracker`] then gates
//! delivery: the first terminal event wins and everything after it is
//! dropped.

use checker_logging::checker_debug;
use serde_json::{Map, Value};

use crate::TaskKind;

const DEFAULT_ERROR_REASON: &str = "source is not supported";

/// One per-source status line carried by a `progress` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub source_label: String,
    pub status_text: String,
}

/// One per-source outcome inside a `success` event.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceResult {
    pub status: String,
    pub result: Option<Value>,
    pub address: Option<String>,
}

impl SourceResult {
    pub fn success(result: Value, address: Option<&str>) -> Self {
        Self {
            status: "success".to_string(),
            result: Some(result),
            address: address.map(ToOwned::to_owned),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    fn from_item(item: &Value) -> Self {
        Self {
            status: item
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            result: item.get("result").filter(|v| !v.is_null()).cloned(),
            address: item.get("address").filter(|v| is_truthy(v)).map(value_text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Task accepted but not yet running.
    Pending,
    /// Per-source status changes. Never touches the result tree.
    Progress(Vec<ProgressUpdate>),
    /// Terminal: per-source results, normalized to a sequence.
    Success(Vec<SourceResult>),
    /// Terminal: the server reported failure for this task.
    Error { reason: String },
    /// Terminal: the channel itself failed.
    TransportError { message: String },
    /// Anything outside the taxonomy, including non-JSON text.
    Unrecognized(Value),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::Success(_) | StreamEvent::Error { .. } | StreamEvent::TransportError { .. }
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        StreamEvent::TransportError {
            message: message.into(),
        }
    }
}

/// Classify a raw event payload. Text that is not JSON is carried through as
/// a string value.
pub fn classify_payload(raw: &str) -> StreamEvent {
    let value =
        serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    classify_value(value)
}

pub fn classify_value(value: Value) -> StreamEvent {
    match value {
        Value::Object(map) => match classify_object(&map) {
            Some(event) => event,
            None => StreamEvent::Unrecognized(Value::Object(map)),
        },
        other => StreamEvent::Unrecognized(other),
    }
}

fn classify_object(map: &Map<String, Value>) -> Option<StreamEvent> {
    if let Some(error) = map.get("error").filter(|v| is_truthy(v)) {
        return Some(StreamEvent::Error {
            reason: value_text(error),
        });
    }

    match map.get("status").and_then(Value::as_str)? {
        "success" => {
            let result = map.get("result").filter(|v| is_truthy(v))?;
            let address = map.get("address").filter(|v| is_truthy(v)).map(value_text);
            Some(StreamEvent::Success(normalize_success(
                result,
                address.as_deref(),
            )))
        }
        "progress" => {
            let subtasks = map.get("subtasks").and_then(Value::as_array)?;
            Some(StreamEvent::Progress(
                subtasks.iter().filter_map(progress_update).collect(),
            ))
        }
        "pending" => Some(StreamEvent::Pending),
        "error" => Some(StreamEvent::Error {
            reason: map
                .get("message")
                .filter(|v| is_truthy(v))
                .map(value_text)
                .unwrap_or_else(|| DEFAULT_ERROR_REASON.to_string()),
        }),
        _ => None,
    }
}

/// A check yields an array of per-source results; a verify (or an older
/// server) yields a single result with the address next to it.
fn normalize_success(result: &Value, address: Option<&str>) -> Vec<SourceResult> {
    match result {
        Value::Array(items) => items
            .iter()
            .filter(|item| is_truthy(item))
            .map(SourceResult::from_item)
            .collect(),
        single => vec![SourceResult::success(single.clone(), address)],
    }
}

fn progress_update(subtask: &Value) -> Option<ProgressUpdate> {
    let source_label = subtask
        .get("court_name")
        .filter(|v| is_truthy(v))
        .map(value_text)?;
    let status_text = subtask
        .get("status")
        .filter(|v| !v.is_null())
        .map(value_text)
        .unwrap_or_default();
    Some(ProgressUpdate {
        source_label,
        status_text,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Connecting,
    Pending,
    Progress,
    Succeeded,
    Failed,
    TransportFailed,
    /// Closed by the caller before a terminal event arrived.
    Closed,
}

impl StreamPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            StreamPhase::Connecting | StreamPhase::Pending | StreamPhase::Progress
        )
    }
}

/// Per-task observation state. Starts in `Connecting` on attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTracker {
    task_id: String,
    kind: TaskKind,
    phase: StreamPhase,
}

impl TaskTracker {
    pub fn attach(task_id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            phase: StreamPhase::Connecting,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Advance on `event`. Returns the event if it should be delivered,
    /// `None` once the task has already terminated.
    pub fn observe(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        if self.phase.is_terminal() {
            checker_debug!(
                "Dropping {} stream event for task {} after {:?}",
                self.kind,
                self.task_id,
                self.phase
            );
            return None;
        }
        self.phase = match &event {
            StreamEvent::Pending => StreamPhase::Pending,
            StreamEvent::Progress(_) => StreamPhase::Progress,
            StreamEvent::Success(_) => StreamPhase::Succeeded,
            StreamEvent::Error { .. } => StreamPhase::Failed,
            StreamEvent::TransportError { .. } => StreamPhase::TransportFailed,
            StreamEvent::Unrecognized(_) => self.phase,
        };
        Some(event)
    }

    /// Caller-initiated close. Has no effect on an already terminated task.
    pub fn close(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = StreamPhase::Closed;
        }
    }
}

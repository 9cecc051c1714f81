//! Court checker core: pure session state machine, stream event taxonomy,
//! result aggregation and health classification.
mod aggregate;
mod effect;
mod health;
mod msg;
mod state;
mod stream;
mod task;
mod update;
mod validate;
mod view_model;

pub use aggregate::{
    deep_merge, merge, Category, ResultTree, SourceUrlIndex, SubjectEntry, ERROR_SUBJECT_KEY,
};
pub use effect::Effect;
pub use health::{
    classify_latency, classify_queue, HealthReport, HealthSnapshot, HealthStatus, LatencyMetrics,
    QueueMetrics, MAX_HEALTH_LEVEL,
};
pub use msg::Msg;
pub use state::{normalize_label, CheckResult, ProgressRow, Screen, Session, QUEUED_STATUS};
pub use stream::{
    classify_payload, classify_value, ProgressUpdate, SourceResult, StreamEvent, StreamPhase,
    TaskTracker,
};
pub use task::{PersonName, SourceEntry, SubmitRequest, TaskHandle, TaskKind};
pub use update::update;
pub use validate::{validate_check, validate_source, ValidationError};
pub use view_model::SessionView;

//! Court checker engine: HTTP submission, event-stream consumption,
//! metrics polling and the persisted task handle.
mod engine;
mod metrics;
mod persist;
mod settings;
mod sse;
mod stream;
mod submit;
mod types;

pub use engine::EngineHandle;
pub use metrics::{HealthPoller, MetricsError, MetricsReport, ReqwestHealthPoller};
pub use persist::{
    AtomicFileWriter, FileTaskHandleStore, MemoryTaskHandleStore, PersistError, TaskHandleStore,
    TASK_HANDLE_FILENAME,
};
pub use settings::{ClientSettings, DEFAULT_API_URL};
pub use sse::SseDecoder;
pub use stream::{EventStreamConsumer, StreamSink};
pub use submit::{ReqwestSubmitter, SubmissionError, TaskSubmitter};
pub use types::EngineEvent;

use std::time::Duration;

use checker_core::TaskKind;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base of all endpoints, e.g. `http://host:8000/api/v1`.
    pub api_url: String,
    pub connect_timeout: Duration,
    /// Applies to submissions and metrics polls, never to event streams.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Self::default()
        }
    }

    pub fn submit_url(&self, kind: TaskKind) -> String {
        self.endpoint(&format!("courts/{}", kind.as_str()))
    }

    pub fn stream_url(&self, kind: TaskKind, task_id: &str) -> String {
        self.endpoint(&format!("courts/{}/stream/{}", kind.as_str(), task_id))
    }

    pub fn metrics_url(&self) -> String {
        self.endpoint("metrics/queue")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }
}

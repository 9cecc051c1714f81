use checker_core::{SubmitRequest, TaskHandle, TaskKind};
use checker_logging::{checker_info, checker_warn};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;

use crate::ClientSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("server answered with status {status}")]
    Http { status: u16, message: Option<String> },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("server did not return a task id")]
    MissingTaskId(Option<String>),
}

impl SubmissionError {
    /// Text to show the user; prefers a message supplied by the server.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::MissingTaskId(Some(message))
            | SubmissionError::Http {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Response envelope of both submission endpoints.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    data: Option<SubmitData>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(default)]
    task_id: Option<String>,
}

impl SubmitResponse {
    fn server_message(&self) -> Option<String> {
        self.message.clone().or_else(|| {
            self.detail.as_ref().map(|detail| match detail {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            })
        })
    }
}

#[async_trait::async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit(&self, request: &SubmitRequest) -> Result<TaskHandle, SubmissionError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestSubmitter {
    settings: ClientSettings,
}

impl ReqwestSubmitter {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, SubmissionError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| SubmissionError::Network(err.to_string()))
    }
}

#[async_trait::async_trait]
impl TaskSubmitter for ReqwestSubmitter {
    async fn submit(&self, request: &SubmitRequest) -> Result<TaskHandle, SubmissionError> {
        let kind = request.kind();
        let body = serde_json::to_vec(request)
            .map_err(|err| SubmissionError::MalformedResponse(err.to_string()))?;
        let client = self.build_client()?;

        checker_info!(
            "Submitting {} task for {} address(es)",
            kind,
            request.address_count()
        );
        let response = client
            .post(self.settings.submit_url(kind))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let parsed = serde_json::from_slice::<SubmitResponse>(&bytes);

        if !status.is_success() {
            let message = parsed.ok().and_then(|body| body.server_message());
            checker_warn!("{} submission rejected with {}: {:?}", kind, status, message);
            return Err(SubmissionError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body = parsed.map_err(|err| SubmissionError::MalformedResponse(err.to_string()))?;
        extract_handle(kind, body)
    }
}

fn extract_handle(kind: TaskKind, body: SubmitResponse) -> Result<TaskHandle, SubmissionError> {
    let task_id = body
        .data
        .as_ref()
        .and_then(|data| data.task_id.as_deref())
        .filter(|id| !id.is_empty());
    match task_id {
        Some(id) => {
            checker_info!("{} task accepted as {}", kind, id);
            Ok(TaskHandle::new(id))
        }
        None => Err(SubmissionError::MissingTaskId(body.server_message())),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SubmissionError {
    if err.is_timeout() {
        return SubmissionError::Timeout;
    }
    SubmissionError::Network(err.to_string())
}

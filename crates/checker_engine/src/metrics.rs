use checker_core::{
    classify_latency, classify_queue, HealthReport, LatencyMetrics, QueueMetrics,
};
use checker_logging::checker_debug;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::ClientSettings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("metrics endpoint answered with status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed metrics: {0}")]
    Malformed(String),
}

/// Body of the queue metrics endpoint. Fields stay raw JSON; the server may
/// write `-1`, `null` or numeric strings, which classify instead of failing
/// the poll.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MetricsReport {
    pub redis_check_courts_queue_size: Option<Value>,
    pub redis_verify_courts_queue_size: Option<Value>,
    pub celery_check_courts_queue_size: Option<Value>,
    pub celery_verify_courts_queue_size: Option<Value>,
    pub celery_court_last_check_time_blue: Option<Value>,
    pub celery_court_last_check_time_yellow: Option<Value>,
    pub capacity: Option<Value>,
}

impl MetricsReport {
    pub fn queue_metrics(&self) -> QueueMetrics {
        QueueMetrics {
            wait: sum_counters(
                &self.redis_check_courts_queue_size,
                &self.redis_verify_courts_queue_size,
            ),
            work_in_progress: sum_counters(
                &self.celery_check_courts_queue_size,
                &self.celery_verify_courts_queue_size,
            ),
            capacity: metric_text(&self.capacity),
        }
    }

    pub fn latency_metrics(&self) -> LatencyMetrics {
        LatencyMetrics {
            primary: metric_text(&self.celery_court_last_check_time_blue),
            secondary: metric_text(&self.celery_court_last_check_time_yellow),
        }
    }

    pub fn classify(&self) -> HealthReport {
        HealthReport {
            queue: classify_queue(&self.queue_metrics()),
            latency: classify_latency(&self.latency_metrics()),
        }
    }
}

/// Numbers and strings pass through as text; `null` and other shapes are
/// absent.
fn metric_text(value: &Option<Value>) -> Option<String> {
    match value.as_ref()? {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.trim().to_string()),
        _ => None,
    }
}

fn counter(value: &Option<Value>) -> Option<f64> {
    metric_text(value)?
        .parse::<f64>()
        .ok()
        .filter(|count| count.is_finite() && *count >= 0.0)
}

/// Sum of two counters. An unreadable side leaves the pair unreadable.
fn sum_counters(a: &Option<Value>, b: &Option<Value>) -> Option<String> {
    match (counter(a), counter(b)) {
        (Some(a), Some(b)) => Some((a + b).to_string()),
        _ => None,
    }
}

#[async_trait::async_trait]
pub trait HealthPoller: Send + Sync {
    async fn poll(&self) -> Result<HealthReport, MetricsError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestHealthPoller {
    settings: ClientSettings,
}

impl ReqwestHealthPoller {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    pub async fn fetch_report(&self) -> Result<MetricsReport, MetricsError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| MetricsError::Network(err.to_string()))?;
        let response = client
            .get(self.settings.metrics_url())
            .send()
            .await
            .map_err(|err| MetricsError::Network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::Http(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| MetricsError::Network(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| MetricsError::Malformed(err.to_string()))
    }
}

#[async_trait::async_trait]
impl HealthPoller for ReqwestHealthPoller {
    async fn poll(&self) -> Result<HealthReport, MetricsError> {
        let report = self.fetch_report().await?;
        let health = report.classify();
        checker_debug!(
            "Health: queue {} ({}), latency {} ({})",
            health.queue.level,
            health.queue.status,
            health.latency.level,
            health.latency.status
        );
        Ok(health)
    }
}

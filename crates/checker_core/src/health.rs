//! Discrete health levels derived from queue and latency metrics.
//!
//! Metrics arrive as raw text (the metrics store keeps strings, and writes
//! `-1` when it cannot read a queue). Anything that does not parse as a
//! finite non-negative number classifies as level 0 / unknown.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_HEALTH_LEVEL: u8 = 5;

const INVALID_REASON: &str = "metrics unavailable or invalid";
const NO_DATA_REASON: &str = "no checks recorded yet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Unknown,
    Bad,
    Average,
    Good,
    Excellent,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Bad => "bad",
            HealthStatus::Average => "average",
            HealthStatus::Good => "good",
            HealthStatus::Excellent => "excellent",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub level: u8,
    pub status: HealthStatus,
    pub reason: String,
}

impl HealthSnapshot {
    fn new(level: u8, status: HealthStatus, reason: impl Into<String>) -> Self {
        Self {
            level,
            status,
            reason: reason.into(),
        }
    }

    fn invalid() -> Self {
        Self::new(0, HealthStatus::Unknown, INVALID_REASON)
    }
}

/// Queue and latency classification from one metrics poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub queue: HealthSnapshot,
    pub latency: HealthSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct QueueMetrics {
    pub wait: Option<String>,
    pub work_in_progress: Option<String>,
    /// Optional ceiling on work in progress.
    pub capacity: Option<String>,
}

impl QueueMetrics {
    pub fn from_counts(wait: i64, work_in_progress: i64) -> Self {
        Self {
            wait: Some(wait.to_string()),
            work_in_progress: Some(work_in_progress.to_string()),
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = Some(capacity.to_string());
        self
    }
}

/// Seconds taken by the most recent check on each of the two court
/// families.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct LatencyMetrics {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl LatencyMetrics {
    pub fn from_seconds(primary: f64, secondary: f64) -> Self {
        Self {
            primary: Some(primary.to_string()),
            secondary: Some(secondary.to_string()),
        }
    }
}

/// Ascending thresholds; the first bound the value satisfies wins. Queue
/// buckets apply to the waiting count, work in progress only has to fit
/// within capacity.
const QUEUE_BUCKETS: [(f64, u8, HealthStatus); 3] = [
    (5.0, 5, HealthStatus::Excellent),
    (10.0, 4, HealthStatus::Good),
    (15.0, 3, HealthStatus::Average),
];

const LATENCY_BUCKETS: [(f64, u8, HealthStatus); 3] = [
    (30.0, 5, HealthStatus::Excellent),
    (60.0, 4, HealthStatus::Good),
    (120.0, 3, HealthStatus::Average),
];

pub fn classify_queue(metrics: &QueueMetrics) -> HealthSnapshot {
    let (Some(wait), Some(work_in_progress)) = (
        parse_metric(metrics.wait.as_deref()),
        parse_metric(metrics.work_in_progress.as_deref()),
    ) else {
        return HealthSnapshot::invalid();
    };
    if let Some(raw) = metrics.capacity.as_deref() {
        match parse_metric(Some(raw)) {
            Some(capacity) if work_in_progress <= capacity => {}
            _ => return HealthSnapshot::invalid(),
        }
    }

    let reason = format!("{wait} task(s) waiting, {work_in_progress} running");
    match QUEUE_BUCKETS.iter().find(|(bound, _, _)| wait <= *bound) {
        Some((_, level, status)) => HealthSnapshot::new(*level, *status, reason),
        None => HealthSnapshot::new(1, HealthStatus::Bad, reason),
    }
}

/// Both channels must be within a bucket's bound to qualify for it.
pub fn classify_latency(metrics: &LatencyMetrics) -> HealthSnapshot {
    let (Some(primary), Some(secondary)) = (
        parse_metric(metrics.primary.as_deref()),
        parse_metric(metrics.secondary.as_deref()),
    ) else {
        return HealthSnapshot::invalid();
    };
    if primary == 0.0 && secondary == 0.0 {
        return HealthSnapshot::new(MAX_HEALTH_LEVEL, HealthStatus::Unknown, NO_DATA_REASON);
    }

    let worst = primary.max(secondary);
    let reason = format!("last checks took {primary}s and {secondary}s");
    match LATENCY_BUCKETS
        .iter()
        .find(|(bound, _, _)| primary <= *bound && secondary <= *bound)
    {
        Some((_, level, status)) => HealthSnapshot::new(*level, *status, reason),
        None => HealthSnapshot::new(1, HealthStatus::Bad, format!("{reason} (worst {worst}s)")),
    }
}

fn parse_metric(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

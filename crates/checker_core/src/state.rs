use serde::Serialize;

use crate::view_model::SessionView;
use crate::{ResultTree, SourceEntry, SourceUrlIndex, TaskKind, TaskTracker};

/// Status text shown for a source before the server reports on it.
pub const QUEUED_STATUS: &str = "queued";

/// Screen state of a check session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Screen {
    #[default]
    Initial,
    Checking,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRow {
    pub label: String,
    pub status_text: String,
}

/// Aggregated output of a finished check.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CheckResult {
    pub tree: ResultTree,
    pub urls: SourceUrlIndex,
}

/// The one task the session is waiting on. `tracker` is `None` until the
/// submission endpoint has returned an id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InFlight {
    pub(crate) kind: TaskKind,
    /// Link being verified, for verify tasks.
    pub(crate) link: Option<String>,
    pub(crate) tracker: Option<TaskTracker>,
}

/// All mutable state of one check session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    screen: Screen,
    sources: Vec<SourceEntry>,
    in_flight: Option<InFlight>,
    progress: Vec<ProgressRow>,
    result: Option<CheckResult>,
    dirty: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            screen: self.screen,
            sources: self.sources.clone(),
            controls_enabled: self.controls_enabled(),
            progress: self.progress.clone(),
            result: self.result.clone(),
            dirty: self.dirty,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    pub fn controls_enabled(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Id of the task currently observed, if any.
    pub fn active_task_id(&self) -> Option<&str> {
        self.in_flight
            .as_ref()
            .and_then(|task| task.tracker.as_ref())
            .map(TaskTracker::task_id)
    }

    pub fn result(&self) -> Option<&CheckResult> {
        self.result.as_ref()
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_screen(&mut self, screen: Screen) {
        if self.screen != screen {
            self.screen = screen;
            self.mark_dirty();
        }
    }

    pub(crate) fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub(crate) fn in_flight_mut(&mut self) -> Option<&mut InFlight> {
        self.in_flight.as_mut()
    }

    pub(crate) fn begin(&mut self, task: InFlight) {
        self.in_flight = Some(task);
        self.mark_dirty();
    }

    pub(crate) fn finish(&mut self) -> Option<InFlight> {
        let task = self.in_flight.take();
        if task.is_some() {
            self.mark_dirty();
        }
        task
    }

    pub(crate) fn push_source(&mut self, entry: SourceEntry) -> bool {
        if self.sources.iter().any(|existing| existing.link == entry.link) {
            return false;
        }
        self.sources.push(entry);
        self.mark_dirty();
        true
    }

    pub(crate) fn remove_source(&mut self, index: usize) -> Option<SourceEntry> {
        if index >= self.sources.len() {
            return None;
        }
        self.mark_dirty();
        Some(self.sources.remove(index))
    }

    pub(crate) fn reset_progress(&mut self) {
        self.progress = self
            .sources
            .iter()
            .map(|source| ProgressRow {
                label: source.label.clone(),
                status_text: QUEUED_STATUS.to_string(),
            })
            .collect();
        self.mark_dirty();
    }

    /// Update the row whose normalized label matches. Unknown labels are ignored.
    pub(crate) fn apply_progress(&mut self, label: &str, status_text: &str) -> bool {
        let target = normalize_label(label);
        let Some(row) = self
            .progress
            .iter_mut()
            .find(|row| normalize_label(&row.label) == target)
        else {
            return false;
        };
        if row.status_text != status_text {
            row.status_text = status_text.to_string();
            self.dirty = true;
        }
        true
    }

    pub(crate) fn set_result(&mut self, result: Option<CheckResult>) {
        self.result = result;
        self.mark_dirty();
    }
}

/// Collapse whitespace runs, trim and lowercase, for matching source labels
/// reported by the server against local ones.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

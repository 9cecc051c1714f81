use checker_logging::{checker_debug, checker_info, checker_warn};

use crate::state::InFlight;
use crate::{
    merge, validate_check, validate_source, CheckResult, Effect, Msg, PersonName, ResultTree,
    Screen, Session, SourceEntry, SourceResult, StreamEvent, SubmitRequest, TaskHandle, TaskKind,
    TaskTracker,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: Session, msg: Msg) -> (Session, Vec<Effect>) {
    let effects = match msg {
        Msg::Loaded { saved } => match saved {
            Some(handle) => resume(&mut state, handle),
            None => Vec::new(),
        },
        Msg::AddSourceRequested(raw) => {
            if !state.controls_enabled() {
                return (state, Vec::new());
            }
            match validate_source(&raw, state.sources()) {
                Ok(link) => {
                    let mut effects = close_live_stream(&state);
                    state.begin(InFlight {
                        kind: TaskKind::Verify,
                        link: Some(link.clone()),
                        tracker: None,
                    });
                    effects.push(Effect::SubmitTask(SubmitRequest::Verify { address: link }));
                    effects
                }
                Err(err) => vec![Effect::Notify(err.to_string())],
            }
        }
        Msg::RemoveSource(index) => {
            if state.controls_enabled() {
                state.remove_source(index);
            }
            Vec::new()
        }
        Msg::CheckRequested(person) => {
            if !state.controls_enabled() {
                return (state, Vec::new());
            }
            match validate_check(state.sources(), &person) {
                Ok(fullname) => start_check(&mut state, fullname),
                Err(err) => vec![Effect::Notify(err.to_string())],
            }
        }
        Msg::TaskSubmitted { kind, handle } => task_submitted(&mut state, kind, handle),
        Msg::SubmissionFailed { kind, message } => {
            let waiting = state
                .in_flight()
                .is_some_and(|task| task.kind == kind && task.tracker.is_none());
            if !waiting {
                return (state, Vec::new());
            }
            checker_warn!("{} submission failed: {}", kind, message);
            state.finish();
            if kind == TaskKind::Check {
                state.set_screen(Screen::Initial);
            }
            vec![Effect::Notify(message)]
        }
        Msg::Stream { task_id, event } => stream_event(&mut state, &task_id, event),
        Msg::Dismissed => {
            let mut effects = close_live_stream(&state);
            state.finish();
            state.set_result(None);
            state.set_screen(Screen::Initial);
            effects.push(Effect::ClearTaskHandle);
            effects
        }
    };

    (state, effects)
}

/// Close the subscription of the current task, if one is attached and live.
fn close_live_stream(state: &Session) -> Vec<Effect> {
    state
        .in_flight()
        .and_then(|task| task.tracker.as_ref())
        .filter(|tracker| !tracker.is_terminal())
        .map(|tracker| Effect::CloseStream {
            task_id: tracker.task_id().to_string(),
        })
        .into_iter()
        .collect()
}

fn resume(state: &mut Session, handle: TaskHandle) -> Vec<Effect> {
    checker_info!("Resuming check task {}", handle.id);
    let mut effects = close_live_stream(state);
    state.set_result(None);
    state.set_screen(Screen::Checking);
    state.begin(InFlight {
        kind: TaskKind::Check,
        link: None,
        tracker: Some(TaskTracker::attach(handle.id.clone(), TaskKind::Check)),
    });
    effects.push(Effect::AttachStream {
        task_id: handle.id,
        kind: TaskKind::Check,
    });
    effects
}

fn start_check(state: &mut Session, fullname: PersonName) -> Vec<Effect> {
    let mut effects = close_live_stream(state);
    let addresses = state
        .sources()
        .iter()
        .map(|source| source.link.clone())
        .collect();
    state.set_result(None);
    state.reset_progress();
    state.set_screen(Screen::Checking);
    state.begin(InFlight {
        kind: TaskKind::Check,
        link: None,
        tracker: None,
    });
    effects.push(Effect::SubmitTask(SubmitRequest::Check {
        addresses,
        fullname,
    }));
    effects
}

fn task_submitted(state: &mut Session, kind: TaskKind, handle: TaskHandle) -> Vec<Effect> {
    let Some(task) = state
        .in_flight_mut()
        .filter(|task| task.kind == kind && task.tracker.is_none())
    else {
        checker_debug!("Ignoring unexpected {} task id {}", kind, handle.id);
        return Vec::new();
    };
    task.tracker = Some(TaskTracker::attach(handle.id.clone(), kind));
    state.mark_dirty();

    let attach = Effect::AttachStream {
        task_id: handle.id.clone(),
        kind,
    };
    match kind {
        TaskKind::Check => vec![Effect::PersistTaskHandle(handle), attach],
        TaskKind::Verify => vec![attach],
    }
}

fn stream_event(state: &mut Session, task_id: &str, event: StreamEvent) -> Vec<Effect> {
    let Some(tracker) = state
        .in_flight_mut()
        .and_then(|task| task.tracker.as_mut())
        .filter(|tracker| tracker.task_id() == task_id)
    else {
        checker_debug!("Dropping stream event for inactive task {}", task_id);
        return Vec::new();
    };
    let Some(event) = tracker.observe(event) else {
        return Vec::new();
    };

    match event {
        StreamEvent::Pending | StreamEvent::Unrecognized(_) => Vec::new(),
        StreamEvent::Progress(updates) => {
            for update in &updates {
                state.apply_progress(&update.source_label, &update.status_text);
            }
            Vec::new()
        }
        StreamEvent::Success(results) => {
            let Some(task) = state.finish() else {
                return Vec::new();
            };
            let mut effects = vec![Effect::CloseStream {
                task_id: task_id.to_string(),
            }];
            match task.kind {
                TaskKind::Verify => {
                    if let Some(link) = task.link {
                        add_verified_source(state, link, &results);
                    }
                }
                TaskKind::Check => {
                    let (tree, urls) = merge(&ResultTree::new(), &results);
                    checker_info!(
                        "Check task {} finished: {} of {} source result(s) merged into {} source(s)",
                        task_id,
                        results.iter().filter(|r| r.is_success()).count(),
                        results.len(),
                        tree.len()
                    );
                    state.set_result(Some(CheckResult { tree, urls }));
                    state.set_screen(Screen::Ready);
                    effects.push(Effect::ClearTaskHandle);
                    effects.push(Effect::ResultReady);
                }
            }
            effects
        }
        StreamEvent::Error { reason } => {
            checker_warn!("Task {} failed: {}", task_id, reason);
            let message = match tracker_kind(state) {
                Some(TaskKind::Verify) => format!("court could not be verified: {reason}"),
                _ => reason,
            };
            failed(state, task_id, message)
        }
        StreamEvent::TransportError { message } => {
            checker_warn!("Stream for task {} failed: {}", task_id, message);
            failed(state, task_id, "connection to the server was lost".to_string())
        }
    }
}

fn tracker_kind(state: &Session) -> Option<TaskKind> {
    state.in_flight().map(|task| task.kind)
}

fn failed(state: &mut Session, task_id: &str, message: String) -> Vec<Effect> {
    let Some(task) = state.finish() else {
        return Vec::new();
    };
    let mut effects = vec![Effect::CloseStream {
        task_id: task_id.to_string(),
    }];
    if task.kind == TaskKind::Check {
        state.set_screen(Screen::Initial);
        effects.push(Effect::ClearTaskHandle);
    }
    effects.push(Effect::Notify(message));
    effects
}

fn add_verified_source(state: &mut Session, link: String, results: &[SourceResult]) {
    let label = results
        .iter()
        .find_map(|result| result.result.as_ref()?.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| link.clone());
    if state.push_source(SourceEntry {
        link: link.clone(),
        label,
    }) {
        checker_info!("Added court {}", link);
    } else {
        checker_debug!("Court {} was already added", link);
    }
}

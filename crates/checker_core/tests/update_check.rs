use std::sync::Once;

use checker_core::{
    classify_payload, update, Effect, Msg, PersonName, ProgressRow, Screen, Session, StreamEvent,
    SubmitRequest, TaskHandle, TaskKind, QUEUED_STATUS,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(checker_logging::initialize_for_tests);
}

fn stream(state: Session, task_id: &str, raw: &str) -> (Session, Vec<Effect>) {
    update(
        state,
        Msg::Stream {
            task_id: task_id.to_string(),
            event: classify_payload(raw),
        },
    )
}

fn session_with_sources(labels: &[(&str, &str)]) -> Session {
    let mut state = Session::new();
    for (i, (link, label)) in labels.iter().enumerate() {
        let task_id = format!("v-{i}");
        let (next, _) = update(state, Msg::AddSourceRequested(link.to_string()));
        let (next, _) = update(
            next,
            Msg::TaskSubmitted {
                kind: TaskKind::Verify,
                handle: TaskHandle::new(&task_id),
            },
        );
        let (next, _) = update(
            next,
            Msg::Stream {
                task_id,
                event: checker_core::classify_value(json!({"status": "success", "result": label})),
            },
        );
        state = next;
    }
    state
}

fn submitted_check(task_id: &str) -> Session {
    let state = session_with_sources(&[
        ("https://a.court.example/", "Court No. 1"),
        ("https://b.court.example", "Court No. 2"),
    ]);
    let (state, _) = update(state, Msg::CheckRequested(PersonName::new("Ivanov")));
    let (state, _) = update(
        state,
        Msg::TaskSubmitted {
            kind: TaskKind::Check,
            handle: TaskHandle::new(task_id),
        },
    );
    state
}

const SUCCESS: &str = r#"{"status":"success","result":[
    {"status":"success","address":"https://a.court.example/","result":{"Court No. 1":{"Ivanov I.":{"Civil":"<table>a</table>"}}}},
    {"status":"error","address":"https://b.court.example","result":"timeout"}
]}"#;

#[test]
fn check_request_moves_to_checking_and_submits() {
    init_logging();
    let state = session_with_sources(&[("https://a.court.example", "Court No. 1")]);
    let (state, effects) = update(
        state,
        Msg::CheckRequested(PersonName::new(" Ivanov ").with_name("Ivan")),
    );

    assert_eq!(
        effects,
        vec![Effect::SubmitTask(SubmitRequest::Check {
            addresses: vec!["https://a.court.example".to_string()],
            fullname: PersonName::new("Ivanov").with_name("Ivan"),
        })]
    );
    let view = state.view();
    assert_eq!(view.screen, Screen::Checking);
    assert!(!view.controls_enabled);
    assert_eq!(
        view.progress,
        vec![ProgressRow {
            label: "Court No. 1".to_string(),
            status_text: QUEUED_STATUS.to_string(),
        }]
    );

    let (state, effects) = update(
        state,
        Msg::TaskSubmitted {
            kind: TaskKind::Check,
            handle: TaskHandle::new("c-1"),
        },
    );
    assert_eq!(
        effects,
        vec![
            Effect::PersistTaskHandle(TaskHandle::new("c-1")),
            Effect::AttachStream {
                task_id: "c-1".to_string(),
                kind: TaskKind::Check
            },
        ]
    );
    assert_eq!(state.active_task_id(), Some("c-1"));
}

#[test]
fn check_without_sources_or_surname_is_rejected_locally() {
    init_logging();
    let (state, effects) = update(Session::new(), Msg::CheckRequested(PersonName::new("Ivanov")));
    assert_eq!(
        effects,
        vec![Effect::Notify(
            "add at least one court before running a check".to_string()
        )]
    );
    assert_eq!(state.view().screen, Screen::Initial);

    let state = session_with_sources(&[("https://a.court.example", "A")]);
    let (state, effects) = update(state, Msg::CheckRequested(PersonName::new("  ")));
    assert_eq!(effects, vec![Effect::Notify("surname is required".to_string())]);
    assert!(state.view().controls_enabled);
}

#[test]
fn progress_updates_rows_by_normalized_label() {
    init_logging();
    let state = submitted_check("c-1");
    let (mut state, effects) = stream(
        state,
        "c-1",
        r#"{"status":"progress","subtasks":[
            {"court_name":"  court no.  1 ","status":"solving captcha"},
            {"court_name":"Unknown court","status":"ignored"}
        ]}"#,
    );
    assert!(effects.is_empty());
    assert!(state.consume_dirty());

    let view = state.view();
    assert_eq!(view.progress[0].status_text, "solving captcha");
    assert_eq!(view.progress[1].status_text, QUEUED_STATUS);
    assert!(view.result.is_none());
    assert_eq!(view.screen, Screen::Checking);
}

#[test]
fn success_merges_results_and_clears_handle() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, effects) = stream(state, "c-1", SUCCESS);

    assert_eq!(
        effects,
        vec![
            Effect::CloseStream {
                task_id: "c-1".to_string()
            },
            Effect::ClearTaskHandle,
            Effect::ResultReady,
        ]
    );
    let view = state.view();
    assert_eq!(view.screen, Screen::Ready);
    assert!(view.controls_enabled);
    let result = view.result.expect("result");
    assert_eq!(
        result.tree.clone().into_value(),
        json!({"Court No. 1": {"Ivanov I.": {"Civil": "<table>a</table>"}}})
    );
    assert_eq!(
        result.urls.base_url("Court No. 1"),
        Some("https://a.court.example")
    );
    assert_eq!(result.urls.len(), 1);
}

#[test]
fn events_after_terminal_do_not_change_state() {
    init_logging();
    let state = submitted_check("c-1");
    let (mut state, _) = stream(state, "c-1", SUCCESS);
    state.consume_dirty();
    let before = state.clone();

    let (mut state, effects) = stream(
        state,
        "c-1",
        r#"{"status":"progress","subtasks":[{"court_name":"Court No. 1","status":"late"}]}"#,
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert_eq!(state, before);

    let (state, effects) = stream(state, "c-1", r#"{"error":"late failure"}"#);
    assert!(effects.is_empty());
    assert_eq!(state.view().screen, Screen::Ready);
}

#[test]
fn domain_error_returns_to_initial_and_clears_handle() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, effects) = stream(state, "c-1", r#"{"error":"Task not found"}"#);
    assert_eq!(
        effects,
        vec![
            Effect::CloseStream {
                task_id: "c-1".to_string()
            },
            Effect::ClearTaskHandle,
            Effect::Notify("Task not found".to_string()),
        ]
    );
    let view = state.view();
    assert_eq!(view.screen, Screen::Initial);
    assert!(view.controls_enabled);
    assert!(view.result.is_none());
}

#[test]
fn transport_error_reenables_controls_without_domain_reason() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, effects) = update(
        state,
        Msg::Stream {
            task_id: "c-1".to_string(),
            event: StreamEvent::transport("connection reset"),
        },
    );
    assert!(state.view().controls_enabled);
    assert!(effects.contains(&Effect::ClearTaskHandle));
    assert!(effects.contains(&Effect::Notify(
        "connection to the server was lost".to_string()
    )));
}

#[test]
fn events_for_other_tasks_are_ignored() {
    init_logging();
    let state = submitted_check("c-1");
    let before = state.view().progress;
    let (state, effects) = stream(
        state,
        "c-old",
        r#"{"status":"progress","subtasks":[{"court_name":"Court No. 1","status":"stale"}]}"#,
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().progress, before);
}

#[test]
fn opaque_payloads_pass_through_without_state_change() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, effects) = stream(state, "c-1", "keep-alive, not json");
    assert!(effects.is_empty());
    assert!(!state.view().controls_enabled);
    assert_eq!(state.view().screen, Screen::Checking);
}

#[test]
fn check_submission_failure_returns_to_initial() {
    init_logging();
    let state = session_with_sources(&[("https://a.court.example", "A")]);
    let (state, _) = update(state, Msg::CheckRequested(PersonName::new("Ivanov")));
    let (state, effects) = update(
        state,
        Msg::SubmissionFailed {
            kind: TaskKind::Check,
            message: "Rate limit exceeded".to_string(),
        },
    );
    assert_eq!(effects, vec![Effect::Notify("Rate limit exceeded".to_string())]);
    assert_eq!(state.view().screen, Screen::Initial);
    assert!(state.view().controls_enabled);
}

#[test]
fn new_check_after_ready_starts_fresh() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, _) = stream(state, "c-1", SUCCESS);
    let (state, effects) = update(state, Msg::CheckRequested(PersonName::new("Petrov")));

    assert!(matches!(effects.as_slice(), [Effect::SubmitTask(_)]));
    let view = state.view();
    assert_eq!(view.screen, Screen::Checking);
    assert!(view.result.is_none());
    assert!(view
        .progress
        .iter()
        .all(|row| row.status_text == QUEUED_STATUS));
}

#[test]
fn resume_attaches_without_resubmitting() {
    init_logging();
    let (state, effects) = update(
        Session::new(),
        Msg::Loaded {
            saved: Some(TaskHandle::new("c-9")),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::AttachStream {
            task_id: "c-9".to_string(),
            kind: TaskKind::Check
        }]
    );
    assert_eq!(state.view().screen, Screen::Checking);
    assert!(!state.view().controls_enabled);

    let (state, effects) = stream(state, "c-9", SUCCESS);
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SubmitTask(_))));
    assert_eq!(state.view().screen, Screen::Ready);
}

#[test]
fn resume_of_finished_task_matches_fresh_subscription() {
    init_logging();
    let fresh = submitted_check("c-1");
    let (fresh, fresh_effects) = stream(fresh, "c-1", SUCCESS);

    let (resumed, _) = update(
        Session::new(),
        Msg::Loaded {
            saved: Some(TaskHandle::new("c-1")),
        },
    );
    let (resumed, resumed_effects) = stream(resumed, "c-1", SUCCESS);

    assert_eq!(fresh_effects, resumed_effects);
    assert_eq!(fresh.view().screen, resumed.view().screen);
    assert_eq!(fresh.view().result, resumed.view().result);
    assert_eq!(fresh.view().controls_enabled, resumed.view().controls_enabled);
}

#[test]
fn resume_of_expired_task_is_a_normal_error() {
    init_logging();
    let (state, _) = update(
        Session::new(),
        Msg::Loaded {
            saved: Some(TaskHandle::new("gone")),
        },
    );
    let (state, effects) = stream(state, "gone", r#"{"error":"Task not found"}"#);
    assert!(effects.contains(&Effect::ClearTaskHandle));
    assert_eq!(state.view().screen, Screen::Initial);
    assert!(state.view().controls_enabled);
}

#[test]
fn loaded_without_handle_is_noop() {
    init_logging();
    let state = Session::new();
    let (next, effects) = update(state.clone(), Msg::Loaded { saved: None });
    assert_eq!(next, state);
    assert!(effects.is_empty());
}

#[test]
fn dismiss_closes_live_stream_and_clears_handle() {
    init_logging();
    let state = submitted_check("c-1");
    let (state, effects) = update(state, Msg::Dismissed);
    assert_eq!(
        effects,
        vec![
            Effect::CloseStream {
                task_id: "c-1".to_string()
            },
            Effect::ClearTaskHandle,
        ]
    );
    assert!(state.view().controls_enabled);
    assert_eq!(state.view().screen, Screen::Initial);

    // Data still arriving for the dismissed task is ignored.
    let (state, effects) = stream(state, "c-1", SUCCESS);
    assert!(effects.is_empty());
    assert!(state.view().result.is_none());
}

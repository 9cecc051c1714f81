use std::sync::{Arc, Mutex};
use std::time::Duration;

use checker_core::{StreamEvent, StreamPhase, TaskKind};
use checker_engine::{ClientSettings, EventStreamConsumer, StreamSink};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default, Clone)]
struct TestSink {
    events: Arc<Mutex<Vec<(String, StreamEvent)>>>,
}

impl TestSink {
    fn take(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .unwrap()
            .drain(..)
            .map(|(_, event)| event)
            .collect()
    }
}

impl StreamSink for TestSink {
    fn emit(&self, task_id: &str, event: StreamEvent) {
        self.events
            .lock()
            .unwrap()
            .push((task_id.to_string(), event));
    }
}

async fn serve_stream(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn consumer(server: &MockServer) -> EventStreamConsumer {
    EventStreamConsumer::new(ClientSettings::with_api_url(server.uri()))
}

#[tokio::test]
async fn delivers_events_until_success_and_ignores_the_rest() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"status\":\"pending\"}\n\n",
        ": keep-alive\n\n",
        "data: {\"status\":\"progress\",\"subtasks\":[{\"court_name\":\"A\",\"status\":\"running\"}]}\n\n",
        "data: {\"status\":\"success\",\"result\":[{\"status\":\"success\",\"result\":{\"A\":{}}}]}\n\n",
        "data: {\"status\":\"error\",\"message\":\"late\"}\n\n",
    );
    serve_stream(&server, "/courts/check/stream/abc", body).await;

    let sink = TestSink::default();
    let phase = consumer(&server)
        .run("abc", TaskKind::Check, &sink, CancellationToken::new())
        .await;

    assert_eq!(phase, StreamPhase::Succeeded);
    let events = sink.take();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Pending);
    assert!(matches!(events[1], StreamEvent::Progress(ref rows) if rows.len() == 1));
    assert!(matches!(events[2], StreamEvent::Success(_)));
}

#[tokio::test]
async fn stream_ending_without_terminal_event_is_a_transport_error() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "/courts/verify/stream/v1",
        "data: {\"status\":\"pending\"}\n\n",
    )
    .await;

    let sink = TestSink::default();
    let phase = consumer(&server)
        .run("v1", TaskKind::Verify, &sink, CancellationToken::new())
        .await;

    assert_eq!(phase, StreamPhase::TransportFailed);
    assert_eq!(
        sink.take(),
        vec![
            StreamEvent::Pending,
            StreamEvent::transport("stream closed before completion"),
        ]
    );
}

#[tokio::test]
async fn unknown_task_endpoint_fails_the_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courts/check/stream/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sink = TestSink::default();
    let phase = consumer(&server)
        .run("gone", TaskKind::Check, &sink, CancellationToken::new())
        .await;

    assert_eq!(phase, StreamPhase::TransportFailed);
    let events = sink.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], StreamEvent::TransportError { .. }));
}

#[tokio::test]
async fn expired_task_reported_in_stream_is_a_domain_error() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "/courts/check/stream/old",
        "data: {\"error\":\"Task not found\"}\n\n",
    )
    .await;

    let sink = TestSink::default();
    let phase = consumer(&server)
        .run("old", TaskKind::Check, &sink, CancellationToken::new())
        .await;

    assert_eq!(phase, StreamPhase::Failed);
    assert_eq!(
        sink.take(),
        vec![StreamEvent::Error {
            reason: "Task not found".into()
        }]
    );
}

#[tokio::test]
async fn non_json_payload_passes_through_as_text() {
    let server = MockServer::start().await;
    serve_stream(
        &server,
        "/courts/verify/stream/v2",
        "data: warming up\n\ndata: {\"status\":\"success\",\"result\":\"Court A\"}\n\n",
    )
    .await;

    let sink = TestSink::default();
    let phase = consumer(&server)
        .run("v2", TaskKind::Verify, &sink, CancellationToken::new())
        .await;

    assert_eq!(phase, StreamPhase::Succeeded);
    let events = sink.take();
    assert_eq!(events[0], StreamEvent::Unrecognized(json!("warming up")));
    assert!(matches!(events[1], StreamEvent::Success(_)));
}

#[tokio::test]
async fn cancelled_subscription_closes_without_events() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/courts/check/stream/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_raw("data: {\"status\":\"pending\"}\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let sink = TestSink::default();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let phase = consumer(&server)
        .run("slow", TaskKind::Check, &sink, cancel)
        .await;

    assert_eq!(phase, StreamPhase::Closed);
    assert!(sink.take().is_empty());
}

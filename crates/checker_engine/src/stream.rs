use checker_core::{classify_payload, StreamEvent, StreamPhase, TaskKind, TaskTracker};
use checker_logging::{checker_info, checker_warn};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;

use crate::{ClientSettings, SseDecoder};

/// Receives the events a subscription delivers. Never called again once a
/// terminal event has been delivered or the subscription was closed.
pub trait StreamSink: Send + Sync {
    fn emit(&self, task_id: &str, event: StreamEvent);
}

/// Subscribes to the event stream of one task and drives its tracker.
#[derive(Debug, Clone)]
pub struct EventStreamConsumer {
    settings: ClientSettings,
}

impl EventStreamConsumer {
    pub fn new(settings: ClientSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        // No overall timeout: a check may stream for many minutes.
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .build()
    }

    /// Run the subscription until a terminal event, a transport failure, or
    /// `cancel` fires. Returns the final phase of the task.
    pub async fn run(
        &self,
        task_id: &str,
        kind: TaskKind,
        sink: &dyn StreamSink,
        cancel: CancellationToken,
    ) -> StreamPhase {
        let mut tracker = TaskTracker::attach(task_id, kind);
        let url = self.settings.stream_url(kind, task_id);
        checker_info!("Attaching to {} stream for task {}", kind, task_id);

        let client = match self.build_client() {
            Ok(client) => client,
            Err(err) => {
                deliver(&mut tracker, sink, StreamEvent::transport(err.to_string()));
                return tracker.phase();
            }
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracker.close();
                return tracker.phase();
            }
            sent = client.get(&url).header(ACCEPT, "text/event-stream").send() => sent,
        };
        let response = match sent {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                let message = format!("stream endpoint answered {}", response.status());
                deliver(&mut tracker, sink, StreamEvent::transport(message));
                return tracker.phase();
            }
            Err(err) => {
                deliver(&mut tracker, sink, StreamEvent::transport(err.to_string()));
                return tracker.phase();
            }
        };

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while !tracker.is_terminal() {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracker.close();
                    break;
                }
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    for payload in decoder.push(&chunk) {
                        deliver(&mut tracker, sink, classify_payload(&payload));
                    }
                }
                Some(Err(err)) => {
                    deliver(&mut tracker, sink, StreamEvent::transport(err.to_string()));
                }
                None => {
                    if let Some(payload) = decoder.finish() {
                        deliver(&mut tracker, sink, classify_payload(&payload));
                    }
                    deliver(
                        &mut tracker,
                        sink,
                        StreamEvent::transport("stream closed before completion"),
                    );
                }
            }
        }

        // Dropping the body closes the connection; anything the server still
        // sends is never read.
        drop(body);
        match tracker.phase() {
            StreamPhase::Closed => checker_info!("Closed {} stream for task {}", kind, task_id),
            phase => checker_info!("{} stream for task {} ended: {:?}", kind, task_id, phase),
        }
        tracker.phase()
    }
}

fn deliver(tracker: &mut TaskTracker, sink: &dyn StreamSink, event: StreamEvent) {
    if let StreamEvent::TransportError { message } = &event {
        if !tracker.is_terminal() {
            checker_warn!("Stream for task {} failed: {}", tracker.task_id(), message);
        }
    }
    if let Some(event) = tracker.observe(event) {
        sink.emit(tracker.task_id(), event);
    }
}

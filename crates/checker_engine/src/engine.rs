use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use checker_core::{StreamEvent, StreamPhase, SubmitRequest, TaskKind};
use checker_logging::{checker_debug, checker_error};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    ClientSettings, EngineEvent, EventStreamConsumer, HealthPoller, ReqwestHealthPoller,
    ReqwestSubmitter, StreamSink, TaskSubmitter,
};

enum EngineCommand {
    Submit(SubmitRequest),
    Attach { task_id: String, kind: TaskKind },
    Close { task_id: String },
    PollHealth,
}

struct ChannelSink {
    event_tx: mpsc::Sender<EngineEvent>,
}

impl StreamSink for ChannelSink {
    fn emit(&self, task_id: &str, event: StreamEvent) {
        let _ = self.event_tx.send(EngineEvent::Stream {
            task_id: task_id.to_string(),
            event,
        });
    }
}

struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<StreamPhase>,
}

/// Live stream subscriptions, at most one per task id.
#[derive(Default)]
struct Subscriptions {
    live: HashMap<String, Subscription>,
}

impl Subscriptions {
    /// Forget subscriptions whose stream already ended on its own.
    fn prune(&mut self) {
        self.live.retain(|_, subscription| !subscription.task.is_finished());
    }

    fn insert(&mut self, task_id: String, subscription: Subscription) {
        self.prune();
        self.live.insert(task_id, subscription);
    }

    fn close(&mut self, task_id: &str) -> bool {
        match self.live.remove(task_id) {
            Some(subscription) => {
                subscription.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn close_all(&mut self) {
        for (_, subscription) in self.live.drain() {
            subscription.cancel.cancel();
        }
    }

    fn len(&self) -> usize {
        self.live.len()
    }
}

/// Runs network work on a background tokio runtime. Commands go in through
/// the handle and results come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ClientSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let submitter = Arc::new(ReqwestSubmitter::new(settings.clone()));
        let consumer = Arc::new(EventStreamConsumer::new(settings.clone()));
        let poller = Arc::new(ReqwestHealthPoller::new(settings));

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    checker_error!("Failed to start network runtime: {}", err);
                    return;
                }
            };
            let mut subscriptions = Subscriptions::default();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Submit(request) => {
                        let submitter = submitter.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let kind = request.kind();
                            let result = submitter.submit(&request).await;
                            let _ = event_tx.send(EngineEvent::Submitted { kind, result });
                        });
                    }
                    EngineCommand::Attach { task_id, kind } => {
                        if subscriptions.close(&task_id) {
                            checker_debug!("Replacing subscription for task {}", task_id);
                        }
                        let cancel = CancellationToken::new();
                        let consumer = consumer.clone();
                        let sink = ChannelSink {
                            event_tx: event_tx.clone(),
                        };
                        let stream_id = task_id.clone();
                        let stream_cancel = cancel.clone();
                        let task = runtime.spawn(async move {
                            consumer.run(&stream_id, kind, &sink, stream_cancel).await
                        });
                        subscriptions.insert(task_id, Subscription { cancel, task });
                        checker_debug!("{} live stream subscription(s)", subscriptions.len());
                    }
                    EngineCommand::Close { task_id } => {
                        subscriptions.close(&task_id);
                    }
                    EngineCommand::PollHealth => {
                        let poller = poller.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let result = poller.poll().await;
                            let _ = event_tx.send(EngineEvent::Health(result));
                        });
                    }
                }
            }
            subscriptions.close_all();
        });

        Self { cmd_tx, event_rx }
    }

    pub fn submit(&self, request: SubmitRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Submit(request));
    }

    /// Open the event stream of a task. Any earlier subscription to the same
    /// task is cancelled first.
    pub fn attach(&self, task_id: impl Into<String>, kind: TaskKind) {
        let _ = self.cmd_tx.send(EngineCommand::Attach {
            task_id: task_id.into(),
            kind,
        });
    }

    pub fn close(&self, task_id: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Close {
            task_id: task_id.into(),
        });
    }

    pub fn poll_health(&self) {
        let _ = self.cmd_tx.send(EngineCommand::PollHealth);
    }

    /// Blocks until the next event. `None` once the engine thread is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn finished_task() -> JoinHandle<StreamPhase> {
        let task = tokio::spawn(async { StreamPhase::Succeeded });
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        task
    }

    #[tokio::test]
    async fn streams_that_ended_are_pruned_on_next_attach() {
        let mut subscriptions = Subscriptions::default();
        subscriptions.insert(
            "done".into(),
            Subscription {
                cancel: CancellationToken::new(),
                task: finished_task().await,
            },
        );
        assert_eq!(subscriptions.len(), 1);

        let pending = tokio::spawn(std::future::pending::<StreamPhase>());
        subscriptions.insert(
            "live".into(),
            Subscription {
                cancel: CancellationToken::new(),
                task: pending,
            },
        );
        assert_eq!(subscriptions.len(), 1);
        assert!(subscriptions.live.contains_key("live"));
        subscriptions.close_all();
    }

    #[tokio::test]
    async fn close_cancels_and_forgets_the_subscription() {
        let mut subscriptions = Subscriptions::default();
        let cancel = CancellationToken::new();
        subscriptions.insert(
            "abc".into(),
            Subscription {
                cancel: cancel.clone(),
                task: tokio::spawn(std::future::pending::<StreamPhase>()),
            },
        );

        assert!(subscriptions.close("abc"));
        assert!(cancel.is_cancelled());
        assert_eq!(subscriptions.len(), 0);
        assert!(!subscriptions.close("abc"));
    }
}

use anyhow::{Context, Result};
use checker_core::{update, Effect, Msg, Session};
use checker_engine::{EngineEvent, EngineHandle, TaskHandleStore};
use checker_logging::{checker_debug, checker_error, checker_info, checker_warn};

use crate::render::Console;

/// Owns the session and carries out the effects `update` asks for.
pub struct EffectRunner {
    session: Session,
    engine: EngineHandle,
    store: Box<dyn TaskHandleStore>,
    console: Console,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, store: Box<dyn TaskHandleStore>, console: Console) -> Self {
        Self {
            session: Session::new(),
            engine,
            store,
            console,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn store(&self) -> &dyn TaskHandleStore {
        self.store.as_ref()
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let session = std::mem::take(&mut self.session);
        let (mut session, effects) = update(session, msg);
        if session.consume_dirty() {
            self.console.render(&session.view());
        }
        self.session = session;
        self.run(effects);
    }

    /// Feed engine events into the session until it no longer waits on a task.
    pub fn drive(&mut self) -> Result<()> {
        while !self.session.controls_enabled() {
            let event = self
                .engine
                .recv()
                .context("network engine stopped unexpectedly")?;
            if let Some(msg) = event_to_msg(event) {
                self.dispatch(msg);
            }
        }
        Ok(())
    }

    fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SubmitTask(request) => self.engine.submit(request),
                Effect::AttachStream { task_id, kind } => self.engine.attach(task_id, kind),
                Effect::CloseStream { task_id } => self.engine.close(task_id),
                Effect::PersistTaskHandle(handle) => {
                    if let Err(err) = self.store.save(&handle) {
                        checker_error!("Failed to persist task {}: {}", handle.id, err);
                        self.console
                            .notice("could not save the task; it cannot be resumed later");
                    }
                }
                Effect::ClearTaskHandle => {
                    if let Err(err) = self.store.clear() {
                        checker_warn!("Failed to clear persisted task: {}", err);
                    }
                }
                Effect::Notify(text) => self.console.notice(&text),
                Effect::ResultReady => checker_info!("Check result ready"),
            }
        }
    }
}

pub fn event_to_msg(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Submitted {
            kind,
            result: Ok(handle),
        } => Some(Msg::TaskSubmitted { kind, handle }),
        EngineEvent::Submitted {
            kind,
            result: Err(err),
        } => {
            checker_warn!("{} submission failed: {}", kind, err);
            Some(Msg::SubmissionFailed {
                kind,
                message: err.user_message(),
            })
        }
        EngineEvent::Stream { task_id, event } => Some(Msg::Stream { task_id, event }),
        EngineEvent::Health(result) => {
            checker_debug!("Ignoring health poll result during a session: {:?}", result);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_core::{StreamEvent, TaskHandle, TaskKind};
    use checker_engine::SubmissionError;
    use pretty_assertions::assert_eq;

    #[test]
    fn submission_failure_carries_server_message() {
        let msg = event_to_msg(EngineEvent::Submitted {
            kind: TaskKind::Verify,
            result: Err(SubmissionError::MissingTaskId(Some("not supported".into()))),
        });
        assert_eq!(
            msg,
            Some(Msg::SubmissionFailed {
                kind: TaskKind::Verify,
                message: "not supported".into()
            })
        );
    }

    #[test]
    fn accepted_submission_and_stream_events_map_through() {
        assert_eq!(
            event_to_msg(EngineEvent::Submitted {
                kind: TaskKind::Check,
                result: Ok(TaskHandle::new("c")),
            }),
            Some(Msg::TaskSubmitted {
                kind: TaskKind::Check,
                handle: TaskHandle::new("c")
            })
        );
        assert_eq!(
            event_to_msg(EngineEvent::Stream {
                task_id: "c".into(),
                event: StreamEvent::Pending,
            }),
            Some(Msg::Stream {
                task_id: "c".into(),
                event: StreamEvent::Pending
            })
        );
    }
}

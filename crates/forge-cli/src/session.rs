//! Host loop: feeds actions to the reducer and executes the effects it returns.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::Sender;
use std::time::Duration;
use std::time::Instant;

use forge_core::actions::RuntimeAction;
use forge_core::actions::UserAction;
use forge_core::actions::WorkspaceAction;
use forge_core::mutation::MutationReport;
use forge_core::mutation::MutationRequest;
use forge_core::pipeline::PipelineStatus;
use forge_core::reducer::reduce;
use forge_core::reducer::WorkspaceEffect;
use forge_core::state::WorkspaceState;
use forge_core::Config;
use forge_exec::backend;
use forge_exec::backend::PersistenceBackend;
use forge_exec::contracts::RunRequest;
use forge_exec::transport::PipelineHandle;
use forge_exec::transport::PipelineTransport;
use forge_exec::transport::TransportEvent;

pub struct Session<'a> {
    state: WorkspaceState,
    backend: &'a dyn PersistenceBackend,
    transport: &'a dyn PipelineTransport,
    events_tx: Sender<TransportEvent>,
    events_rx: Receiver<TransportEvent>,
    handles: Vec<PipelineHandle>,
    queue: VecDeque<WorkspaceAction>,
    reports: Vec<MutationReport>,
    errors: Vec<String>,
}

pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

impl<'a> Session<'a> {
    pub fn new(
        config: &Config,
        backend: &'a dyn PersistenceBackend,
        transport: &'a dyn PipelineTransport,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            state: WorkspaceState::from_config(config),
            backend,
            transport,
            events_tx,
            events_rx,
            handles: Vec::new(),
            queue: VecDeque::new(),
            reports: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    /// Settled mutation reports, oldest first, since the last call.
    pub fn take_reports(&mut self) -> Vec<MutationReport> {
        std::mem::take(&mut self.reports)
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }

    pub fn user(&mut self, action: UserAction) {
        self.dispatch(WorkspaceAction::User(action));
    }

    pub fn refresh(&mut self) {
        self.user(UserAction::Refresh);
    }

    pub fn mutate(&mut self, request: MutationRequest) -> Option<MutationReport> {
        self.user(UserAction::Mutate(request));
        self.take_reports().pop()
    }

    /// Runs `action` and every follow-up it triggers to completion.
    pub fn dispatch(&mut self, action: WorkspaceAction) {
        self.queue.push_back(action);
        while let Some(action) = self.queue.pop_front() {
            for effect in reduce(&mut self.state, action) {
                self.execute(effect);
            }
        }
    }

    fn runtime(&mut self, action: RuntimeAction) {
        self.queue.push_back(WorkspaceAction::Runtime(action));
    }

    fn execute(&mut self, effect: WorkspaceEffect) {
        match effect {
            WorkspaceEffect::RequestFrame => {}
            WorkspaceEffect::OpenPipeline {
                connection,
                request,
            } => match self
                .transport
                .open(connection, &request, self.events_tx.clone())
            {
                Ok(handle) => self.handles.push(handle),
                Err(err) => self.runtime(RuntimeAction::PipelineFailed {
                    connection,
                    message: err.to_string(),
                }),
            },
            WorkspaceEffect::ClosePipeline { connection } => {
                self.handles.retain(|handle| {
                    if handle.connection == connection {
                        handle.close();
                        false
                    } else {
                        true
                    }
                });
            }
            WorkspaceEffect::Persist { id, call } => {
                let reply = backend::settle(self.backend, &call);
                self.runtime(RuntimeAction::RemoteSettled { id, reply });
            }
            WorkspaceEffect::RunScript { filename, code } => {
                let request = RunRequest { code, filename };
                match self.backend.run_script(&request) {
                    Ok(report) => self.runtime(RuntimeAction::RunFinished(report)),
                    Err(err) => self.runtime(RuntimeAction::RunFailed {
                        message: err.to_string(),
                    }),
                }
            }
            WorkspaceEffect::FetchWorkspace => match self.backend.list_files() {
                Ok(files) => self.runtime(RuntimeAction::SeedWorkspace { files }),
                Err(err) => self.runtime(RuntimeAction::WorkspaceFetchFailed {
                    message: err.to_string(),
                }),
            },
            WorkspaceEffect::SurfaceError(message) => {
                tracing::error!(message = %message, "surfaced error");
                self.errors.push(message);
            }
            WorkspaceEffect::MutationSettled(report) => self.reports.push(report),
        }
    }

    /// Pumps transport events until the pipeline goes idle or `timeout` elapses.
    /// `on_event` runs after each event is reduced.
    pub fn drive_pipeline(
        &mut self,
        timeout: Option<Duration>,
        mut on_event: impl FnMut(&WorkspaceState),
    ) -> PipelineStatus {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        while self.state.pipeline.status() == PipelineStatus::Streaming {
            let wait = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(wait) => wait,
                    None => break,
                },
                None => Duration::from_secs(3600),
            };
            let event = match self.events_rx.recv_timeout(wait) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.dispatch(WorkspaceAction::Runtime(transport_action(event)));
            on_event(&self.state);
        }
        self.state.pipeline.status()
    }
}

fn transport_action(event: TransportEvent) -> RuntimeAction {
    match event {
        TransportEvent::Message { connection, text } => RuntimeAction::PipelineMessage {
            connection,
            text,
            at_ms: Some(now_ms()),
        },
        TransportEvent::Closed { connection } => RuntimeAction::PipelineClosed { connection },
        TransportEvent::Failed {
            connection,
            message,
        } => RuntimeAction::PipelineFailed {
            connection,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use forge_core::error::WorkspaceError;
    use forge_core::mutation::MutationPhase;
    use forge_exec::backend::SimulatedBackend;
    use forge_exec::transport::ReplayTransport;
    use pretty_assertions::assert_eq;

    use super::*;

    fn replay_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        for line in lines {
            writeln!(file, "{line}").expect("write");
        }
        file
    }

    #[test]
    fn replayed_generation_populates_workspace_and_timeline() {
        let recording = replay_file(&[
            r#"{"agent_name":"Planner","content":"Planning"}"#,
            r##"{"agent_name":"Coder","content":"Done! Code generated.","files":{"main.py":"print(1)","README.md":"# app"}}"##,
            r#"{"agent_name":"Tester","content":"Running","files":{"TEST_RESULTS.log":"1 passed"}}"#,
            r#"{"status":"done"}"#,
        ]);
        let backend = SimulatedBackend::new();
        let transport = ReplayTransport::new(recording.path());
        let mut session = Session::new(&Config::default(), &backend, &transport);

        session.user(UserAction::StartGeneration {
            prompt: "hello app".to_string(),
            use_local_llm: true,
        });
        let mut seen = 0;
        let status = session.drive_pipeline(Some(Duration::from_secs(5)), |_| seen += 1);

        assert_eq!(status, PipelineStatus::Idle);
        assert_eq!(seen, 4);
        let state = session.state();
        assert_eq!(state.timeline.len(), 3);
        assert_eq!(state.timeline.working_count(), 0);
        assert_eq!(state.tabs.selected(), Some("TEST_RESULTS.log"));
        assert_eq!(
            state.store.keys().collect::<Vec<_>>(),
            vec!["README.md", "TEST_RESULTS.log", "main.py"]
        );
        assert!(state.timeline.entries().iter().all(|entry| entry.updated_at_ms.is_some()));
        assert_eq!(
            state.terminal.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>(),
            vec!["1 passed"]
        );
    }

    #[test]
    fn mutations_round_trip_through_simulated_backend() {
        let backend = SimulatedBackend::with_files(vec![
            ("a/.keep".to_string(), String::new()),
            ("a/f.py".to_string(), "x".to_string()),
        ]);
        let transport = ReplayTransport::new("unused.jsonl");
        let mut session = Session::new(&Config::default(), &backend, &transport);
        session.refresh();

        let report = session
            .mutate(MutationRequest::Rename {
                path: "a".to_string(),
                new_name: "z".to_string(),
            })
            .expect("report");
        assert_eq!(report.phase, MutationPhase::LocalApplied);
        assert_eq!(
            session.state().store.keys().collect::<Vec<_>>(),
            vec!["z/.keep", "z/f.py"]
        );
        assert_eq!(
            backend.snapshot(),
            vec![
                ("z/.keep".to_string(), String::new()),
                ("z/f.py".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn backend_rejection_is_reported_without_local_change() {
        let backend = SimulatedBackend::with_files(vec![("main.py".to_string(), String::new())]);
        let transport = ReplayTransport::new("unused.jsonl");
        let mut session = Session::new(&Config::default(), &backend, &transport);
        session.refresh();
        // The collaborator gains the destination behind the client's back.
        backend
            .persist(&forge_core::mutation::RemoteCall::SaveFile {
                path: "app.py".to_string(),
                content: String::new(),
            })
            .expect("seeded");

        let report = session
            .mutate(MutationRequest::Rename {
                path: "main.py".to_string(),
                new_name: "app.py".to_string(),
            })
            .expect("report");

        assert_eq!(report.phase, MutationPhase::RolledBack);
        assert_eq!(report.error, Some(WorkspaceError::DestinationExists));
        assert_eq!(session.state().store.keys().collect::<Vec<_>>(), vec!["main.py"]);
    }

    #[test]
    fn missing_recording_surfaces_pipeline_failure() {
        let backend = SimulatedBackend::new();
        let dir = tempfile::tempdir().expect("temp dir");
        let transport = ReplayTransport::new(dir.path().join("missing.jsonl"));
        let mut session = Session::new(&Config::default(), &backend, &transport);

        session.user(UserAction::StartGeneration {
            prompt: "p".to_string(),
            use_local_llm: false,
        });

        assert_eq!(session.state().pipeline.status(), PipelineStatus::Idle);
        let errors = session.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("i/o error"));
    }

    #[test]
    fn offline_fetch_is_surfaced() {
        let backend = SimulatedBackend::new();
        backend.set_offline(true);
        let transport = ReplayTransport::new("unused.jsonl");
        let mut session = Session::new(&Config::default(), &backend, &transport);
        session.refresh();
        assert_eq!(session.take_errors(), vec!["backend is offline".to_string()]);
    }
}

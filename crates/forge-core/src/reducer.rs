use super::actions::run_failure_text;
use super::actions::RunReport;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::actions::WorkspaceAction;
use super::config::RUN_OUTPUT_LOG;
use super::error::WorkspaceError;
use super::mutation;
use super::mutation::MutationId;
use super::mutation::MutationPhase;
use super::mutation::MutationReport;
use super::mutation::MutationRequest;
use super::mutation::RemoteCall;
use super::mutation::RemoteReply;
use super::path_key;
use super::pipeline;
use super::pipeline::ConnectionId;
use super::pipeline::GenerationRequest;
use super::pipeline::PipelineFrame;
use super::state::PendingMutation;
use super::state::WorkspaceState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEffect {
    RequestFrame,
    OpenPipeline {
        connection: ConnectionId,
        request: GenerationRequest,
    },
    ClosePipeline {
        connection: ConnectionId,
    },
    Persist {
        id: MutationId,
        call: RemoteCall,
    },
    RunScript {
        filename: String,
        code: String,
    },
    FetchWorkspace,
    SurfaceError(String),
    MutationSettled(MutationReport),
}

pub fn reduce(state: &mut WorkspaceState, action: WorkspaceAction) -> Vec<WorkspaceEffect> {
    match action {
        WorkspaceAction::User(action) => reduce_user(state, action),
        WorkspaceAction::Runtime(action) => reduce_runtime(state, action),
    }
}

fn reduce_user(state: &mut WorkspaceState, action: UserAction) -> Vec<WorkspaceEffect> {
    match action {
        UserAction::Mutate(request) => begin_mutation(state, request),
        UserAction::OpenFile { path } => {
            if !state.store.is_file(&path) {
                tracing::debug!(path = %path, "open ignored: not a file");
                return Vec::new();
            }
            state.tabs.open(&path);
            vec![WorkspaceEffect::RequestFrame]
        }
        UserAction::SelectTab { path } => {
            if state.tabs.select(&path) {
                vec![WorkspaceEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        UserAction::CloseTab { path } => {
            if state.tabs.close(&path) {
                vec![WorkspaceEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        UserAction::StartGeneration {
            prompt,
            use_local_llm,
        } => start_generation(state, prompt, use_local_llm),
        UserAction::CancelGeneration => {
            let mut effects = teardown_pipeline(state);
            if !effects.is_empty() {
                effects.push(WorkspaceEffect::RequestFrame);
            }
            effects
        }
        UserAction::RunFile { path } => {
            let code = match state.store.get(&path) {
                Some(code) if path_key::extension(&path) == Some("py") => code.to_string(),
                _ => {
                    tracing::debug!(path = %path, "run ignored: not a python file");
                    return Vec::new();
                }
            };
            write_run_output(state, "Running script...".to_string());
            vec![
                WorkspaceEffect::RunScript {
                    filename: path_key::basename(&path).to_string(),
                    code,
                },
                WorkspaceEffect::RequestFrame,
            ]
        }
        UserAction::DismissLog { path } => {
            if !state.logs.is_tracked(&path) || state.store.remove(&path).is_none() {
                return Vec::new();
            }
            state.tabs.close(&path);
            state.logs.reset(&path);
            vec![WorkspaceEffect::RequestFrame]
        }
        UserAction::Refresh => vec![WorkspaceEffect::FetchWorkspace],
    }
}

fn reduce_runtime(state: &mut WorkspaceState, action: RuntimeAction) -> Vec<WorkspaceEffect> {
    match action {
        RuntimeAction::PipelineMessage {
            connection,
            text,
            at_ms,
        } => {
            if !state.pipeline.is_active(connection) {
                tracing::debug!(%connection, "dropping frame from stale connection");
                return Vec::new();
            }
            match pipeline::decode_frame(&text) {
                Ok(frame) => apply_frame(state, frame, at_ms),
                Err(err) => {
                    tracing::warn!(%connection, error = %err, "ignoring undecodable pipeline frame");
                    Vec::new()
                }
            }
        }
        RuntimeAction::PipelineClosed { connection } => {
            if !state.pipeline.is_active(connection) {
                return Vec::new();
            }
            let mut effects = teardown_pipeline(state);
            effects.push(WorkspaceEffect::RequestFrame);
            effects
        }
        RuntimeAction::PipelineFailed {
            connection,
            message,
        } => {
            if !state.pipeline.is_active(connection) {
                tracing::debug!(%connection, "ignoring failure of stale connection");
                return Vec::new();
            }
            let mut effects = teardown_pipeline(state);
            effects.push(surface_error(state, message));
            effects.push(WorkspaceEffect::RequestFrame);
            effects
        }
        RuntimeAction::RemoteSettled { id, reply } => settle_mutation(state, id, reply),
        RuntimeAction::SeedWorkspace { files } => {
            let rejected = state.store.seed(files);
            for path in &rejected {
                tracing::warn!(path = %path, "skipping malformed workspace key");
            }
            let store = &state.store;
            state.tabs.retain(|path| store.is_file(path));
            vec![WorkspaceEffect::RequestFrame]
        }
        RuntimeAction::WorkspaceFetchFailed { message } => {
            vec![
                surface_error(state, message),
                WorkspaceEffect::RequestFrame,
            ]
        }
        RuntimeAction::RunFinished(report) => finish_run(state, &report),
        RuntimeAction::RunFailed { message } => {
            write_run_output(state, run_failure_text(&message));
            vec![WorkspaceEffect::RequestFrame]
        }
    }
}

fn start_generation(
    state: &mut WorkspaceState,
    prompt: String,
    use_local_llm: bool,
) -> Vec<WorkspaceEffect> {
    if prompt.trim().is_empty() {
        return Vec::new();
    }

    let mut effects = Vec::new();
    if let Some(previous) = state.pipeline.end() {
        effects.push(WorkspaceEffect::ClosePipeline {
            connection: previous,
        });
    }
    state.timeline.clear();
    state.logs.reset_all();
    state.terminal.clear();
    state.last_error = None;

    let request = GenerationRequest {
        prompt,
        use_local_llm,
    };
    let connection = state.pipeline.begin(request.clone());
    tracing::info!(%connection, "starting generation");
    effects.push(WorkspaceEffect::OpenPipeline {
        connection,
        request,
    });
    effects.push(WorkspaceEffect::RequestFrame);
    effects
}

fn apply_frame(
    state: &mut WorkspaceState,
    frame: PipelineFrame,
    at_ms: Option<u64>,
) -> Vec<WorkspaceEffect> {
    match frame {
        PipelineFrame::Agent(message) => {
            let agent = message.update.agent_name.clone();
            let change = state.timeline.apply(message.update, at_ms);
            tracing::debug!(agent = %agent, ?change, "timeline updated");

            let mut first = None;
            for (path, content) in message.files {
                if let Err(err) = state.store.put(path.as_str(), content) {
                    tracing::warn!(error = %err, "ignoring emitted file");
                    continue;
                }
                state.tabs.add(&path);
                stream_log(state, &path);
                if first.is_none() {
                    first = Some(path);
                }
            }
            if let Some(first) = first {
                state.tabs.select(&first);
            }
            vec![WorkspaceEffect::RequestFrame]
        }
        PipelineFrame::Done => {
            tracing::info!("generation finished");
            let mut effects = teardown_pipeline(state);
            effects.push(WorkspaceEffect::RequestFrame);
            effects
        }
        PipelineFrame::Failed(message) => {
            let mut effects = teardown_pipeline(state);
            effects.push(surface_error(state, message));
            effects.push(WorkspaceEffect::RequestFrame);
            effects
        }
    }
}

/// Clears the active connection and seals the timeline. Empty when nothing was active.
fn teardown_pipeline(state: &mut WorkspaceState) -> Vec<WorkspaceEffect> {
    let Some(connection) = state.pipeline.end() else {
        return Vec::new();
    };
    state.timeline.finish_working();
    tracing::info!(%connection, "pipeline connection closed");
    vec![WorkspaceEffect::ClosePipeline { connection }]
}

fn surface_error(state: &mut WorkspaceState, message: String) -> WorkspaceEffect {
    state.last_error = Some(message.clone());
    WorkspaceEffect::SurfaceError(message)
}

/// Pushes the unseen part of a tracked log into the terminal buffer.
fn stream_log(state: &mut WorkspaceState, path: &str) {
    let Some(content) = state.store.get(path) else {
        return;
    };
    if let Some(suffix) = state.logs.feed(path, content) {
        if !suffix.is_empty() {
            state.terminal.append(path, suffix);
        }
    }
}

fn write_run_output(state: &mut WorkspaceState, text: String) {
    if let Err(err) = state.store.put(RUN_OUTPUT_LOG, text) {
        tracing::warn!(error = %err, "cannot write run output");
        return;
    }
    state.logs.reset(RUN_OUTPUT_LOG);
    stream_log(state, RUN_OUTPUT_LOG);
}

fn finish_run(state: &mut WorkspaceState, report: &RunReport) -> Vec<WorkspaceEffect> {
    write_run_output(state, report.render());
    vec![WorkspaceEffect::RequestFrame]
}

fn begin_mutation(state: &mut WorkspaceState, request: MutationRequest) -> Vec<WorkspaceEffect> {
    let id = state.allocate_mutation_id();
    let kind = request.kind();
    tracing::debug!(id = id.0, kind = kind.label(), phase = ?MutationPhase::Validating, "mutation");

    let reserved = state.reserved_destinations();
    let plan = match mutation::plan(state.mutation_context(&reserved), &request) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::info!(id = id.0, kind = kind.label(), error = %err, "mutation rejected");
            return vec![WorkspaceEffect::MutationSettled(MutationReport {
                id,
                kind,
                phase: MutationPhase::Rejected,
                error: Some(err),
            })];
        }
    };

    if plan.change.is_optimistic() {
        if let Err(err) = mutation::apply(&mut state.store, &mut state.tabs, &plan.change) {
            return vec![WorkspaceEffect::MutationSettled(MutationReport {
                id,
                kind,
                phase: MutationPhase::Rejected,
                error: Some(err),
            })];
        }
    }

    let call = plan.call.clone();
    state.pending.push(PendingMutation {
        id,
        request,
        plan,
    });
    vec![
        WorkspaceEffect::Persist { id, call },
        WorkspaceEffect::RequestFrame,
    ]
}

fn settle_mutation(
    state: &mut WorkspaceState,
    id: MutationId,
    reply: RemoteReply,
) -> Vec<WorkspaceEffect> {
    let Some(index) = state.pending.iter().position(|pending| pending.id == id) else {
        tracing::debug!(id = id.0, "reply for unknown mutation");
        return Vec::new();
    };
    let pending = state.pending.remove(index);
    let kind = pending.request.kind();
    let optimistic = pending.plan.change.is_optimistic();
    let mut effects = Vec::new();

    let (phase, error) = match reply {
        RemoteReply::Accepted if optimistic => (MutationPhase::LocalApplied, None),
        RemoteReply::Accepted => match commit(state, &pending) {
            Ok(()) => (MutationPhase::LocalApplied, None),
            Err(err) => {
                effects.push(WorkspaceEffect::FetchWorkspace);
                (
                    MutationPhase::RolledBack,
                    Some(WorkspaceError::StaleCommit(Box::new(err))),
                )
            }
        },
        RemoteReply::Rejected { reason } => {
            mutation::revert(&mut state.store, &mut state.tabs, &pending.plan.change);
            (
                MutationPhase::RolledBack,
                Some(WorkspaceError::from_remote_reason(reason)),
            )
        }
        RemoteReply::TransportFailed { message } => {
            mutation::revert(&mut state.store, &mut state.tabs, &pending.plan.change);
            (MutationPhase::Idle, Some(WorkspaceError::Transport(message)))
        }
    };

    match &error {
        Some(err) => tracing::info!(id = id.0, kind = kind.label(), phase = ?phase, error = %err, "mutation settled"),
        None => tracing::info!(id = id.0, kind = kind.label(), phase = ?phase, "mutation settled"),
    }
    effects.push(WorkspaceEffect::MutationSettled(MutationReport {
        id,
        kind,
        phase,
        error,
    }));
    effects.push(WorkspaceEffect::RequestFrame);
    effects
}

/// Re-validates against the current map and applies the fresh plan.
fn commit(state: &mut WorkspaceState, pending: &PendingMutation) -> Result<(), WorkspaceError> {
    let reserved = state.reserved_destinations();
    let plan = mutation::plan(state.mutation_context(&reserved), &pending.request)?;
    mutation::apply(&mut state.store, &mut state.tabs, &plan.change)
}

#[cfg(test)]
mod tests;

use serde_json::json;

pub(super) use super::reduce;
pub(super) use super::WorkspaceEffect;
pub(super) use crate::actions::RunReport;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::actions::WorkspaceAction;
pub(super) use crate::config::RUN_OUTPUT_LOG;
pub(super) use crate::config::TEST_RESULTS_LOG;
pub(super) use crate::error::WorkspaceError;
pub(super) use crate::mutation::MutationId;
pub(super) use crate::mutation::MutationPhase;
pub(super) use crate::mutation::MutationReport;
pub(super) use crate::mutation::MutationRequest;
pub(super) use crate::mutation::RemoteCall;
pub(super) use crate::mutation::RemoteReply;
pub(super) use crate::pipeline::ConnectionId;
pub(super) use crate::state::WorkspaceState;
pub(super) use crate::timeline::EntryStatus;

mod log_stream;
mod mutation_cascade;

fn state() -> WorkspaceState {
    WorkspaceState::default()
}

fn seeded(entries: &[(&str, &str)]) -> WorkspaceState {
    let mut state = state();
    run_runtime(
        &mut state,
        RuntimeAction::SeedWorkspace {
            files: entries
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        },
    );
    state
}

fn run_user(state: &mut WorkspaceState, action: UserAction) -> Vec<WorkspaceEffect> {
    reduce(state, WorkspaceAction::User(action))
}

fn run_runtime(state: &mut WorkspaceState, action: RuntimeAction) -> Vec<WorkspaceEffect> {
    reduce(state, WorkspaceAction::Runtime(action))
}

fn keys(state: &WorkspaceState) -> Vec<&str> {
    state.store.keys().collect()
}

/// Starts a generation and returns the connection it opened.
fn start(state: &mut WorkspaceState, prompt: &str) -> ConnectionId {
    let effects = run_user(
        state,
        UserAction::StartGeneration {
            prompt: prompt.to_string(),
            use_local_llm: true,
        },
    );
    effects
        .iter()
        .find_map(|effect| match effect {
            WorkspaceEffect::OpenPipeline { connection, .. } => Some(*connection),
            _ => None,
        })
        .expect("open pipeline effect")
}

fn agent(name: &str, content: &str) -> String {
    json!({ "agent_name": name, "content": content, "is_error": false }).to_string()
}

fn agent_with_files(name: &str, content: &str, files: &[(&str, &str)]) -> String {
    // Built by hand so payload order is exactly as listed.
    let files = files
        .iter()
        .map(|(path, content)| format!("{}:{}", json!(path), json!(content)))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{{\"agent_name\":{},\"content\":{},\"files\":{{{files}}}}}",
        json!(name),
        json!(content)
    )
}

fn frame(state: &mut WorkspaceState, connection: ConnectionId, text: String) -> Vec<WorkspaceEffect> {
    run_runtime(
        state,
        RuntimeAction::PipelineMessage {
            connection,
            text,
            at_ms: None,
        },
    )
}

fn mutate(state: &mut WorkspaceState, request: MutationRequest) -> Vec<WorkspaceEffect> {
    run_user(state, UserAction::Mutate(request))
}

/// Id of the persistence call a mutation issued.
fn persisted(effects: &[WorkspaceEffect]) -> MutationId {
    effects
        .iter()
        .find_map(|effect| match effect {
            WorkspaceEffect::Persist { id, .. } => Some(*id),
            _ => None,
        })
        .expect("persist effect")
}

fn report(effects: &[WorkspaceEffect]) -> MutationReport {
    effects
        .iter()
        .find_map(|effect| match effect {
            WorkspaceEffect::MutationSettled(report) => Some(report.clone()),
            _ => None,
        })
        .expect("settled report")
}

fn settle(state: &mut WorkspaceState, id: MutationId, reply: RemoteReply) -> Vec<WorkspaceEffect> {
    run_runtime(state, RuntimeAction::RemoteSettled { id, reply })
}

fn rename(path: &str, new_name: &str) -> MutationRequest {
    MutationRequest::Rename {
        path: path.to_string(),
        new_name: new_name.to_string(),
    }
}

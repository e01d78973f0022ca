use super::mutation::MutationId;
use super::mutation::MutationRequest;
use super::mutation::RemoteReply;
use super::pipeline::ConnectionId;

#[derive(Debug, Clone)]
pub enum WorkspaceAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    Mutate(MutationRequest),
    OpenFile { path: String },
    SelectTab { path: String },
    CloseTab { path: String },
    StartGeneration { prompt: String, use_local_llm: bool },
    CancelGeneration,
    RunFile { path: String },
    /// Closes an output console by dropping its log file locally.
    DismissLog { path: String },
    Refresh,
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    PipelineMessage {
        connection: ConnectionId,
        text: String,
        at_ms: Option<u64>,
    },
    PipelineClosed {
        connection: ConnectionId,
    },
    PipelineFailed {
        connection: ConnectionId,
        message: String,
    },
    RemoteSettled {
        id: MutationId,
        reply: RemoteReply,
    },
    SeedWorkspace {
        files: Vec<(String, String)>,
    },
    WorkspaceFetchFailed {
        message: String,
    },
    RunFinished(RunReport),
    RunFailed {
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub output: String,
    pub error: String,
    pub exit_code: i64,
}

impl RunReport {
    /// Console text shown for a finished script.
    pub fn render(&self) -> String {
        let mut text = String::new();
        if !self.error.is_empty() {
            text.push_str(&format!("Error:\n{}\n", self.error));
        }
        if !self.output.is_empty() {
            text.push_str(&format!("Output:\n{}\n", self.output));
        }
        if text.is_empty() {
            text.push_str("Script executed successfully with no output.");
        }
        text.push_str(&format!("\nExit Code: {}", self.exit_code));
        text
    }
}

pub fn run_failure_text(message: &str) -> String {
    format!("Failed to execute script.\nError: {message}")
}

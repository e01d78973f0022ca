use serde::{Deserialize, Serialize};

use super::path_key::CasePolicy;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub pipeline: PipelineConfig,
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub pipeline_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            pipeline_url: "ws://127.0.0.1:8000/generate".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    pub use_local_llm: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_local_llm: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub case_policy: CasePolicy,
    /// Workspace files whose growth is streamed to the terminal.
    pub terminal_logs: Vec<String>,
    pub terminal_capacity: usize,
}

pub const TEST_RESULTS_LOG: &str = "TEST_RESULTS.log";
pub const RUN_OUTPUT_LOG: &str = "RUN_OUTPUT.log";

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            case_policy: CasePolicy::Sensitive,
            terminal_logs: vec![TEST_RESULTS_LOG.to_string(), RUN_OUTPUT_LOG.to_string()],
            terminal_capacity: 2_000,
        }
    }
}

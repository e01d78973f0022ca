//! JSON bodies exchanged with the persistence collaborator.

use std::collections::BTreeMap;

use forge_core::actions::RunReport;
use forge_core::mutation::RemoteCall;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

pub const LIST_FILES_ROUTE: &str = "/files";
pub const RUN_ROUTE: &str = "/run";

pub fn route(call: &RemoteCall) -> &'static str {
    match call {
        RemoteCall::CreateFolder { .. } => "/create-folder",
        RemoteCall::SaveFile { .. } => "/save-file",
        RemoteCall::DeleteItem { .. } => "/delete-item",
        RemoteCall::RenameItem { .. } => "/rename-item",
        RemoteCall::DuplicateItem { .. } => "/duplicate-item",
        RemoteCall::DeleteAll => "/delete-all",
    }
}

/// Request body for `call`; `delete-all` carries none.
pub fn body(call: &RemoteCall) -> Option<Value> {
    match call {
        RemoteCall::CreateFolder { path } | RemoteCall::DeleteItem { path } => {
            Some(json!({ "path": path }))
        }
        RemoteCall::SaveFile { path, content } => Some(json!({ "path": path, "content": content })),
        RemoteCall::RenameItem { old_path, new_path } => {
            Some(json!({ "old_path": old_path, "new_path": new_path }))
        }
        RemoteCall::DuplicateItem {
            source_path,
            new_path,
        } => Some(json!({ "source_path": source_path, "new_path": new_path })),
        RemoteCall::DeleteAll => None,
    }
}

/// Reply shape shared by every mutating route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationReply {
    pub error: Option<String>,
    pub ok: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilesReply {
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunReply {
    pub output: Option<String>,
    pub error: Option<String>,
    pub exit_code: Option<i64>,
}

impl From<RunReply> for RunReport {
    fn from(reply: RunReply) -> Self {
        RunReport {
            output: reply.output.unwrap_or_default(),
            error: reply.error.unwrap_or_default(),
            exit_code: reply.exit_code.unwrap_or(-1),
        }
    }
}

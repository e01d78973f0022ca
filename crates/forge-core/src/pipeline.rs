//! Generation pipeline wire frames and connection bookkeeping.

use std::fmt;

use serde::de::MapAccess;
use serde::de::Visitor;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use thiserror::Error;

use super::timeline::AgentUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// First frame sent on a fresh pipeline connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub use_local_llm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    pub update: AgentUpdate,
    /// Emitted files in the order the pipeline sent them.
    pub files: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineFrame {
    Agent(AgentMessage),
    Done,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed pipeline frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("pipeline frame has neither agent_name, status nor error")]
    Unrecognized,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrame {
    agent_name: Option<String>,
    content: Option<String>,
    files: Option<OrderedFiles>,
    is_error: bool,
    clear_history: bool,
    status: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default)]
struct OrderedFiles(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedFiles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FilesVisitor;

        impl<'de> Visitor<'de> for FilesVisitor {
            type Value = OrderedFiles;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of path to file content")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut files = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((path, content)) = map.next_entry::<String, String>()? {
                    files.push((path, content));
                }
                Ok(OrderedFiles(files))
            }
        }

        deserializer.deserialize_map(FilesVisitor)
    }
}

pub fn decode_frame(text: &str) -> Result<PipelineFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;

    if raw.status.as_deref() == Some("done") {
        return Ok(PipelineFrame::Done);
    }
    if let Some(error) = raw.error {
        return Ok(PipelineFrame::Failed(error));
    }
    if let Some(agent_name) = raw.agent_name {
        return Ok(PipelineFrame::Agent(AgentMessage {
            update: AgentUpdate {
                agent_name,
                content: raw.content.unwrap_or_default(),
                is_error: raw.is_error,
                clear_history: raw.clear_history,
            },
            files: raw.files.map(|files| files.0).unwrap_or_default(),
        }));
    }
    Err(FrameError::Unrecognized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Streaming,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    active: Option<ConnectionId>,
    next_id: u64,
    pub last_request: Option<GenerationRequest>,
}

impl PipelineState {
    pub fn active(&self) -> Option<ConnectionId> {
        self.active
    }

    pub fn status(&self) -> PipelineStatus {
        if self.active.is_some() {
            PipelineStatus::Streaming
        } else {
            PipelineStatus::Idle
        }
    }

    pub fn is_active(&self, connection: ConnectionId) -> bool {
        self.active == Some(connection)
    }

    /// Allocates a new connection and makes it the only active one.
    pub fn begin(&mut self, request: GenerationRequest) -> ConnectionId {
        self.next_id += 1;
        let connection = ConnectionId(self.next_id);
        self.active = Some(connection);
        self.last_request = Some(request);
        connection
    }

    pub fn end(&mut self) -> Option<ConnectionId> {
        self.active.take()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn payload_files_keep_wire_order() {
        let frame = decode_frame(
            r#"{"agent_name":"Coder","content":"Done! Code generated.",
                "files":{"zeta.py":"z","alpha.py":"a","mid/x.md":"m"},
                "is_error":false,"internal_output":null}"#,
        )
        .expect("decodes");
        let PipelineFrame::Agent(message) = frame else {
            panic!("expected agent frame");
        };
        let paths: Vec<&str> = message.files.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(paths, vec!["zeta.py", "alpha.py", "mid/x.md"]);
        assert_eq!(message.update.agent_name, "Coder");
    }

    #[test]
    fn null_files_and_missing_flags_default() {
        let frame = decode_frame(r#"{"agent_name":"Planner","content":"Thinking","files":null}"#)
            .expect("decodes");
        assert_eq!(
            frame,
            PipelineFrame::Agent(AgentMessage {
                update: AgentUpdate {
                    agent_name: "Planner".to_string(),
                    content: "Thinking".to_string(),
                    is_error: false,
                    clear_history: false,
                },
                files: Vec::new(),
            })
        );
    }

    #[test]
    fn sentinels_decode() {
        assert_eq!(decode_frame(r#"{"status":"done"}"#).expect("done"), PipelineFrame::Done);
        assert_eq!(
            decode_frame(r#"{"error":"No prompt provided"}"#).expect("error"),
            PipelineFrame::Failed("No prompt provided".to_string())
        );
    }

    #[test]
    fn done_and_error_take_precedence_over_agent_fields() {
        assert_eq!(
            decode_frame(r#"{"agent_name":"Coder","content":"bye","status":"done"}"#)
                .expect("done"),
            PipelineFrame::Done
        );
        assert_eq!(
            decode_frame(r#"{"agent_name":"Coder","content":"x","error":"model crashed"}"#)
                .expect("error"),
            PipelineFrame::Failed("model crashed".to_string())
        );
    }

    #[test]
    fn garbage_frames_are_errors() {
        assert!(matches!(decode_frame("not json"), Err(FrameError::Json(_))));
        assert!(matches!(decode_frame(r#"{"status":"busy"}"#), Err(FrameError::Unrecognized)));
    }

    #[test]
    fn begin_supersedes_previous_connection() {
        let mut pipeline = PipelineState::default();
        let request = GenerationRequest {
            prompt: "snake game".to_string(),
            use_local_llm: true,
        };
        let first = pipeline.begin(request.clone());
        let second = pipeline.begin(request);
        assert!(!pipeline.is_active(first));
        assert!(pipeline.is_active(second));
        assert_eq!(pipeline.end(), Some(second));
        assert_eq!(pipeline.status(), PipelineStatus::Idle);
    }
}

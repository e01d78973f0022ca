use thiserror::Error;

/// Reply string the persistence collaborator uses for a taken destination.
pub const DESTINATION_EXISTS_REASON: &str = "Destination already exists";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("unsupported extension for '{name}'")]
    DisallowedExtension { name: String },

    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    #[error("'{path}' is a file and cannot contain other entries")]
    ParentIsFile { path: String },

    #[error("'{path}' does not exist")]
    NotFound { path: String },

    #[error("'{path}' is unchanged")]
    NoChange { path: String },

    #[error("cannot move '{path}' into '{target}'")]
    InvalidMove { path: String, target: String },

    #[error("destination already exists")]
    DestinationExists,

    #[error("backend rejected the request: {0}")]
    RemoteRejected(String),

    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("workspace changed while the request was in flight: {0}")]
    StaleCommit(Box<WorkspaceError>),
}

impl WorkspaceError {
    /// Maps a structured `error` string from the collaborator.
    pub fn from_remote_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.trim() == DESTINATION_EXISTS_REASON {
            Self::DestinationExists
        } else {
            Self::RemoteRejected(reason)
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::InvalidName { .. }
                | Self::DisallowedExtension { .. }
                | Self::AlreadyExists { .. }
                | Self::ParentIsFile { .. }
                | Self::NotFound { .. }
                | Self::NoChange { .. }
                | Self::InvalidMove { .. }
        )
    }

    pub fn is_remote_rejection(&self) -> bool {
        matches!(self, Self::DestinationExists | Self::RemoteRejected(_))
    }
}

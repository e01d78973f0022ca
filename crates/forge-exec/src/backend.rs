use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use forge_core::actions::RunReport;
use forge_core::error::DESTINATION_EXISTS_REASON;
use forge_core::mutation::RemoteCall;
use forge_core::mutation::RemoteReply;
use forge_core::path_key;
use forge_core::store::WorkspaceStore;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::contracts;
use crate::contracts::ListFilesReply;
use crate::contracts::MutationReply;
use crate::contracts::RunReply;
use crate::contracts::RunRequest;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {route} failed: {source}")]
    Http {
        route: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{route} answered with status {status}")]
    Status { route: &'static str, status: u16 },
    #[error("{route} rejected the request: {reason}")]
    Rejected { route: &'static str, reason: String },
    #[error("malformed reply from {route}: {source}")]
    Decode {
        route: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend is offline")]
    Offline,
    #[error("{0} is not available without a backend")]
    Unsupported(&'static str),
}

impl BackendError {
    /// Structured rejections keep their reason; everything else is a transport failure.
    pub fn into_reply(self) -> RemoteReply {
        match self {
            Self::Rejected { reason, .. } => RemoteReply::Rejected { reason },
            other => RemoteReply::TransportFailed {
                message: other.to_string(),
            },
        }
    }
}

pub trait PersistenceBackend {
    fn list_files(&self) -> Result<Vec<(String, String)>, BackendError>;

    fn persist(&self, call: &RemoteCall) -> Result<(), BackendError>;

    fn run_script(&self, request: &RunRequest) -> Result<RunReport, BackendError>;
}

/// Executes `call` and folds the outcome into the reply the reducer expects.
pub fn settle(backend: &dyn PersistenceBackend, call: &RemoteCall) -> RemoteReply {
    match backend.persist(call) {
        Ok(()) => RemoteReply::Accepted,
        Err(err) => {
            tracing::debug!(route = contracts::route(call), error = %err, "persist failed");
            err.into_reply()
        }
    }
}

pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| BackendError::Http { route: "/", source })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{route}", self.base_url)
    }

    fn decode<T: DeserializeOwned>(
        route: &'static str,
        response: reqwest::blocking::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        let text = response
            .text()
            .map_err(|source| BackendError::Http { route, source })?;
        if !status.is_success() {
            // Non-2xx replies only count as rejections when they carry an `error` body.
            return match serde_json::from_str::<MutationReply>(&text) {
                Ok(MutationReply {
                    error: Some(reason),
                    ..
                }) => Err(BackendError::Rejected { route, reason }),
                _ => Err(BackendError::Status {
                    route,
                    status: status.as_u16(),
                }),
            };
        }
        serde_json::from_str(&text).map_err(|source| BackendError::Decode { route, source })
    }
}

impl PersistenceBackend for HttpBackend {
    fn list_files(&self) -> Result<Vec<(String, String)>, BackendError> {
        let route = contracts::LIST_FILES_ROUTE;
        let response = self
            .client
            .get(self.url(route))
            .send()
            .map_err(|source| BackendError::Http { route, source })?;
        let reply: ListFilesReply = Self::decode(route, response)?;
        Ok(reply.files.into_iter().collect())
    }

    fn persist(&self, call: &RemoteCall) -> Result<(), BackendError> {
        let route = contracts::route(call);
        let mut request = self.client.post(self.url(route));
        if let Some(body) = contracts::body(call) {
            request = request.json(&body);
        }
        let response = request
            .send()
            .map_err(|source| BackendError::Http { route, source })?;
        let reply: MutationReply = Self::decode(route, response)?;
        match reply.error {
            Some(reason) => Err(BackendError::Rejected { route, reason }),
            None => Ok(()),
        }
    }

    fn run_script(&self, request: &RunRequest) -> Result<RunReport, BackendError> {
        let route = contracts::RUN_ROUTE;
        let response = self
            .client
            .post(self.url(route))
            .json(request)
            .send()
            .map_err(|source| BackendError::Http { route, source })?;
        let reply: RunReply = Self::decode(route, response)?;
        Ok(reply.into())
    }
}

/// In-memory stand-in that answers like the real collaborator.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    files: Mutex<WorkspaceStore>,
    offline: Mutex<bool>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let backend = Self::default();
        backend.lock_files().seed(files);
        backend
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap_or_else(PoisonError::into_inner) = offline;
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.lock_files().snapshot().into_iter().collect()
    }

    fn lock_files(&self) -> MutexGuard<'_, WorkspaceStore> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> Result<(), BackendError> {
        if *self.offline.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(BackendError::Offline);
        }
        Ok(())
    }
}

fn reject(route: &'static str, reason: &str) -> BackendError {
    BackendError::Rejected {
        route,
        reason: reason.to_string(),
    }
}

impl PersistenceBackend for SimulatedBackend {
    fn list_files(&self) -> Result<Vec<(String, String)>, BackendError> {
        self.ensure_online()?;
        Ok(self.snapshot())
    }

    fn persist(&self, call: &RemoteCall) -> Result<(), BackendError> {
        self.ensure_online()?;
        let route = contracts::route(call);
        let mut files = self.lock_files();
        let invalid = |_| reject(route, "Invalid path");

        match call {
            RemoteCall::CreateFolder { path } => {
                if files.exists(path) {
                    return Err(reject(route, DESTINATION_EXISTS_REASON));
                }
                files.put(path_key::marker_for(path), "").map_err(invalid)?;
            }
            RemoteCall::SaveFile { path, content } => {
                files.put(path.as_str(), content.as_str()).map_err(invalid)?;
            }
            RemoteCall::DeleteItem { path } => {
                let keys = files.affected_keys(path);
                if keys.is_empty() {
                    return Err(reject(route, "Item not found"));
                }
                for key in keys {
                    files.remove(&key);
                }
            }
            RemoteCall::RenameItem { old_path, new_path }
            | RemoteCall::DuplicateItem {
                source_path: old_path,
                new_path,
            } => {
                let keys = files.affected_keys(old_path);
                if keys.is_empty() {
                    return Err(reject(route, "Item not found"));
                }
                if files.exists(new_path) {
                    return Err(reject(route, DESTINATION_EXISTS_REASON));
                }
                let copy = matches!(call, RemoteCall::DuplicateItem { .. });
                for key in keys {
                    let Some(target) = path_key::rewrite(&key, old_path, new_path) else {
                        continue;
                    };
                    let content = if copy {
                        files.get(&key).map(str::to_string)
                    } else {
                        files.remove(&key)
                    };
                    if let Some(content) = content {
                        files.put(target, content).map_err(invalid)?;
                    }
                }
            }
            RemoteCall::DeleteAll => files.clear(),
        }
        Ok(())
    }

    fn run_script(&self, _request: &RunRequest) -> Result<RunReport, BackendError> {
        self.ensure_online()?;
        Err(BackendError::Unsupported("script execution"))
    }
}

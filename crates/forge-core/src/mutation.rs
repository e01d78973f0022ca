//! Validation and local application of workspace edits.
//!
//! A request is validated into a [`MutationPlan`]: the collaborator call to make plus the
//! equivalent [`LocalChange`]. Writes are applied before the call and reverted if it fails;
//! everything else waits for the collaborator and is re-validated at commit.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use super::error::WorkspaceError;
use super::path_key;
use super::path_key::CasePolicy;
use super::store::WorkspaceStore;
use super::tabs::OpenFiles;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "java", "c", "cpp", "h", "hpp", "rs", "go", "md", "txt",
    "json", "html", "css",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    CreateFile {
        dir: String,
        name: String,
        content: String,
    },
    CreateFolder {
        dir: String,
        name: String,
    },
    SaveFile {
        path: String,
        content: String,
    },
    Rename {
        path: String,
        new_name: String,
    },
    Move {
        path: String,
        target_dir: String,
    },
    Duplicate {
        path: String,
        new_name: String,
    },
    Delete {
        path: String,
    },
    DeleteAll,
}

impl MutationRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::CreateFile { .. } => MutationKind::CreateFile,
            Self::CreateFolder { .. } => MutationKind::CreateFolder,
            Self::SaveFile { .. } => MutationKind::SaveFile,
            Self::Rename { .. } => MutationKind::Rename,
            Self::Move { .. } => MutationKind::Move,
            Self::Duplicate { .. } => MutationKind::Duplicate,
            Self::Delete { .. } => MutationKind::Delete,
            Self::DeleteAll => MutationKind::DeleteAll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    CreateFile,
    CreateFolder,
    SaveFile,
    Rename,
    Move,
    Duplicate,
    Delete,
    DeleteAll,
}

impl MutationKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::CreateFile => "create-file",
            Self::CreateFolder => "create-folder",
            Self::SaveFile => "save-file",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Duplicate => "duplicate",
            Self::Delete => "delete",
            Self::DeleteAll => "delete-all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    Validating,
    Rejected,
    PersistingRemote,
    LocalApplied,
    RolledBack,
}

impl MutationPhase {
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Rejected | Self::LocalApplied | Self::RolledBack
        )
    }
}

/// Calls understood by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum RemoteCall {
    CreateFolder { path: String },
    SaveFile { path: String, content: String },
    DeleteItem { path: String },
    RenameItem { old_path: String, new_path: String },
    DuplicateItem { source_path: String, new_path: String },
    DeleteAll,
}

/// Outcome of a collaborator round-trip as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteReply {
    Accepted,
    Rejected { reason: String },
    TransportFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    pub id: MutationId,
    pub kind: MutationKind,
    pub phase: MutationPhase,
    pub error: Option<WorkspaceError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalChange {
    Write {
        path: String,
        content: String,
        previous: Option<String>,
        open_tab: bool,
    },
    Relocate {
        from: String,
        to: String,
        keys: Vec<(String, String)>,
        copy: bool,
    },
    Remove {
        root: String,
        keys: Vec<String>,
    },
    Clear,
}

impl LocalChange {
    /// Writes are applied before the collaborator answers.
    pub fn is_optimistic(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Keys this change will create; no other mutation may target them while it is pending.
    pub fn destinations(&self) -> Vec<&str> {
        match self {
            Self::Write { path, .. } => vec![path.as_str()],
            Self::Relocate { to, keys, .. } => std::iter::once(to.as_str())
                .chain(keys.iter().map(|(_, new)| new.as_str()))
                .collect(),
            Self::Remove { .. } | Self::Clear => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    pub call: RemoteCall,
    pub change: LocalChange,
}

/// Everything a plan is validated against besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub store: &'a WorkspaceStore,
    pub policy: CasePolicy,
    /// Destinations of in-flight mutations.
    pub reserved: &'a [String],
}

pub fn plan(ctx: MutationContext<'_>, request: &MutationRequest) -> Result<MutationPlan, WorkspaceError> {
    match request {
        MutationRequest::CreateFile { dir, name, content } => {
            validate_file_name(name)?;
            let path = creation_target(ctx, dir, name)?;
            Ok(MutationPlan {
                call: RemoteCall::SaveFile {
                    path: path.clone(),
                    content: content.clone(),
                },
                change: LocalChange::Write {
                    path,
                    content: content.clone(),
                    previous: None,
                    open_tab: true,
                },
            })
        }
        MutationRequest::CreateFolder { dir, name } => {
            validate_entry_name(name)?;
            let path = creation_target(ctx, dir, name)?;
            let marker = path_key::marker_for(&path);
            check_reserved(ctx, &[marker.clone()])?;
            Ok(MutationPlan {
                call: RemoteCall::CreateFolder { path },
                change: LocalChange::Write {
                    path: marker,
                    content: String::new(),
                    previous: None,
                    open_tab: false,
                },
            })
        }
        MutationRequest::SaveFile { path, content } => {
            let previous = match ctx.store.get(path) {
                Some(previous) if !path_key::is_marker(path) => previous.to_string(),
                _ => return Err(WorkspaceError::NotFound { path: path.clone() }),
            };
            check_reserved(ctx, std::slice::from_ref(path))?;
            Ok(MutationPlan {
                call: RemoteCall::SaveFile {
                    path: path.clone(),
                    content: content.clone(),
                },
                change: LocalChange::Write {
                    path: path.clone(),
                    content: content.clone(),
                    previous: Some(previous),
                    open_tab: false,
                },
            })
        }
        MutationRequest::Rename { path, new_name } => {
            require_entry(ctx.store, path)?;
            validate_sibling_name(ctx.store, path, new_name)?;
            let to = path_key::join(path_key::parent(path), new_name);
            relocation(ctx, path, to, false)
        }
        MutationRequest::Move { path, target_dir } => {
            require_entry(ctx.store, path)?;
            if path_key::is_self_or_descendant(target_dir, path) {
                return Err(WorkspaceError::InvalidMove {
                    path: path.clone(),
                    target: target_dir.clone(),
                });
            }
            if !target_dir.is_empty() && !ctx.store.is_directory(target_dir) {
                return Err(WorkspaceError::NotFound {
                    path: target_dir.clone(),
                });
            }
            let to = path_key::join(target_dir, path_key::basename(path));
            relocation(ctx, path, to, false)
        }
        MutationRequest::Duplicate { path, new_name } => {
            require_entry(ctx.store, path)?;
            validate_sibling_name(ctx.store, path, new_name)?;
            let to = path_key::join(path_key::parent(path), new_name);
            relocation(ctx, path, to, true)
        }
        MutationRequest::Delete { path } => {
            require_entry(ctx.store, path)?;
            Ok(MutationPlan {
                call: RemoteCall::DeleteItem { path: path.clone() },
                change: LocalChange::Remove {
                    root: path.clone(),
                    keys: ctx.store.affected_keys(path),
                },
            })
        }
        MutationRequest::DeleteAll => Ok(MutationPlan {
            call: RemoteCall::DeleteAll,
            change: LocalChange::Clear,
        }),
    }
}

pub fn validate_file_name(name: &str) -> Result<(), WorkspaceError> {
    validate_entry_name(name)?;
    if name.starts_with('.') {
        return Err(WorkspaceError::InvalidName {
            name: name.to_string(),
            reason: "names may not start with '.'",
        });
    }
    let allowed = path_key::extension(name).is_some_and(|ext| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    });
    if !allowed {
        return Err(WorkspaceError::DisallowedExtension {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn validate_entry_name(name: &str) -> Result<(), WorkspaceError> {
    let invalid = |reason| WorkspaceError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') {
        return Err(invalid("names may not contain '/'"));
    }
    if name == "." || name == ".." || name == path_key::DIR_MARKER {
        return Err(invalid("reserved name"));
    }
    Ok(())
}

fn validate_sibling_name(store: &WorkspaceStore, path: &str, name: &str) -> Result<(), WorkspaceError> {
    if store.is_file(path) {
        validate_file_name(name)
    } else {
        validate_entry_name(name)
    }
}

fn require_entry(store: &WorkspaceStore, path: &str) -> Result<(), WorkspaceError> {
    if path_key::validate(path).is_err()
        || path_key::is_marker(path)
        || !store.exists(path)
    {
        return Err(WorkspaceError::NotFound {
            path: path.to_string(),
        });
    }
    Ok(())
}

fn creation_target(ctx: MutationContext<'_>, dir: &str, name: &str) -> Result<String, WorkspaceError> {
    if !dir.is_empty() {
        path_key::validate(dir)?;
    }
    let path = path_key::join(dir, name);
    path_key::validate(&path)?;

    let everything = |_: &str| true;
    check_root(ctx, &path, everything)?;
    check_new_key(ctx, &path, everything)?;
    check_reserved(ctx, std::slice::from_ref(&path))?;
    Ok(path)
}

fn relocation(
    ctx: MutationContext<'_>,
    from: &str,
    to: String,
    copy: bool,
) -> Result<MutationPlan, WorkspaceError> {
    if to == from {
        return Err(WorkspaceError::NoChange {
            path: from.to_string(),
        });
    }
    path_key::validate(&to)?;

    let affected: BTreeSet<String> = ctx.store.affected_keys(from).into_iter().collect();
    let keys: Vec<(String, String)> = affected
        .iter()
        .filter_map(|old| path_key::rewrite(old, from, &to).map(|new| (old.clone(), new)))
        .collect();

    // A copy leaves its sources in place, so every existing key stays in the way.
    let unaffected = |key: &str| copy || !affected.contains(key);
    check_root(ctx, &to, unaffected)?;
    for (_, new) in &keys {
        check_new_key(ctx, new, unaffected)?;
    }
    let destinations: Vec<String> = std::iter::once(to.clone())
        .chain(keys.iter().map(|(_, new)| new.clone()))
        .collect();
    check_reserved(ctx, &destinations)?;

    let call = if copy {
        RemoteCall::DuplicateItem {
            source_path: from.to_string(),
            new_path: to.clone(),
        }
    } else {
        RemoteCall::RenameItem {
            old_path: from.to_string(),
            new_path: to.clone(),
        }
    };
    Ok(MutationPlan {
        call,
        change: LocalChange::Relocate {
            from: from.to_string(),
            to,
            keys,
            copy,
        },
    })
}

/// The destination root may not already exist as a key or directory.
fn check_root(
    ctx: MutationContext<'_>,
    root: &str,
    unaffected: impl Fn(&str) -> bool,
) -> Result<(), WorkspaceError> {
    let taken = ctx.store.keys().filter(|key| unaffected(key)).any(|key| {
        ctx.policy.collides(key, root) || ctx.policy.is_descendant(key, root)
    });
    if taken {
        return Err(WorkspaceError::AlreadyExists {
            path: root.to_string(),
        });
    }
    Ok(())
}

fn check_new_key(
    ctx: MutationContext<'_>,
    new: &str,
    unaffected: impl Fn(&str) -> bool,
) -> Result<(), WorkspaceError> {
    let is_file = !path_key::is_marker(new);
    for key in ctx.store.keys().filter(|key| unaffected(key)) {
        if ctx.policy.collides(key, new) || (is_file && ctx.policy.is_descendant(key, new)) {
            return Err(WorkspaceError::AlreadyExists {
                path: new.to_string(),
            });
        }
    }
    for ancestor in path_key::ancestors(new) {
        let blocked = ctx
            .store
            .keys()
            .filter(|key| unaffected(key) && !path_key::is_marker(key))
            .any(|key| ctx.policy.collides(key, ancestor));
        if blocked {
            return Err(WorkspaceError::ParentIsFile {
                path: ancestor.to_string(),
            });
        }
    }
    Ok(())
}

fn check_reserved(ctx: MutationContext<'_>, destinations: &[String]) -> Result<(), WorkspaceError> {
    for new in destinations {
        let pending = ctx.reserved.iter().any(|reserved| {
            ctx.policy.collides(reserved, new) || ctx.policy.is_descendant(reserved, new)
        });
        if pending {
            return Err(WorkspaceError::AlreadyExists { path: new.clone() });
        }
    }
    Ok(())
}

/// Applies `change` to the store and tabs.
pub fn apply(
    store: &mut WorkspaceStore,
    tabs: &mut OpenFiles,
    change: &LocalChange,
) -> Result<(), WorkspaceError> {
    match change {
        LocalChange::Write {
            path,
            content,
            open_tab,
            ..
        } => {
            store.put(path.as_str(), content.as_str())?;
            if *open_tab {
                tabs.open(path);
            }
        }
        LocalChange::Relocate {
            from,
            to,
            keys,
            copy,
        } => {
            let moved: Vec<(&str, String)> = keys
                .iter()
                .filter_map(|(old, new)| {
                    let content = if *copy {
                        store.get(old).map(str::to_string)
                    } else {
                        store.remove(old)
                    };
                    content.map(|content| (new.as_str(), content))
                })
                .collect();
            for (new, content) in moved {
                store.put(new, content)?;
            }
            if !copy {
                tabs.rewrite(from, to);
            }
        }
        LocalChange::Remove { root, keys } => {
            for key in keys {
                store.remove(key);
            }
            tabs.remove_under(root);
        }
        LocalChange::Clear => {
            store.clear();
            tabs.clear();
        }
    }
    Ok(())
}

/// Undoes an optimistic write. Other changes are never applied before acceptance.
/// A key rewritten since the write (by the pipeline, say) is left alone.
pub fn revert(store: &mut WorkspaceStore, tabs: &mut OpenFiles, change: &LocalChange) {
    if let LocalChange::Write {
        path,
        content,
        previous,
        ..
    } = change
    {
        if store.get(path) != Some(content.as_str()) {
            tracing::debug!(path = %path, "keeping newer content over rollback");
            return;
        }
        match previous {
            Some(previous) => {
                // The key was valid when the write was planned.
                let _ = store.put(path.as_str(), previous.as_str());
            }
            None => {
                store.remove(path);
                tabs.close(path);
            }
        }
    }
}

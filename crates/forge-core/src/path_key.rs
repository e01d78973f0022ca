//! Canonical workspace paths: `/`-separated, relative, no empty or dot segments.

use serde::Deserialize;
use serde::Serialize;

use super::error::WorkspaceError;

/// Reserved basename that keeps an otherwise empty directory in the flat map.
pub const DIR_MARKER: &str = ".keep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePolicy {
    #[default]
    Sensitive,
    Insensitive,
}

impl CasePolicy {
    pub fn collides(self, a: &str, b: &str) -> bool {
        match self {
            Self::Sensitive => a == b,
            Self::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }

    /// `path` starts with `ancestor/` under this policy.
    pub fn is_descendant(self, path: &str, ancestor: &str) -> bool {
        match self {
            Self::Sensitive => is_descendant(path, ancestor),
            Self::Insensitive => {
                path.len() > ancestor.len() + 1
                    && path.as_bytes()[ancestor.len()] == b'/'
                    && path.is_char_boundary(ancestor.len())
                    && path[..ancestor.len()].eq_ignore_ascii_case(ancestor)
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sensitive => "sensitive",
            Self::Insensitive => "insensitive",
        }
    }
}

pub fn validate(path: &str) -> Result<(), WorkspaceError> {
    let invalid = |reason| WorkspaceError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.starts_with('/') {
        return Err(invalid("leading slash"));
    }
    if path.contains('\0') {
        return Err(invalid("NUL byte"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid("empty segment")),
            "." | ".." => return Err(invalid("relative segment")),
            _ => {}
        }
    }
    Ok(())
}

pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Directory holding `path`; empty for root-level entries.
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

pub fn basename(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

pub fn is_self_or_descendant(path: &str, ancestor: &str) -> bool {
    path == ancestor || is_descendant(path, ancestor)
}

/// Rewrites `path` when it is `from` or lives under it.
pub fn rewrite(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        Some(to.to_string())
    } else if is_descendant(path, from) {
        Some(format!("{to}{}", &path[from.len()..]))
    } else {
        None
    }
}

pub fn marker_for(dir: &str) -> String {
    join(dir, DIR_MARKER)
}

pub fn is_marker(path: &str) -> bool {
    basename(path) == DIR_MARKER
}

/// Proper ancestors of `path`, nearest first.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .filter(|(_, ch)| *ch == '/')
        .map(|(idx, _)| &path[..idx])
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
}

pub fn extension(name: &str) -> Option<&str> {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

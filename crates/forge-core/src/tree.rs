//! Read-only hierarchical view derived from the flat store.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::path_key;
use super::store::WorkspaceStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode<'a> {
    File {
        name: &'a str,
        path: &'a str,
        content: &'a str,
    },
    Directory {
        name: &'a str,
        path: &'a str,
        children: Vec<TreeNode<'a>>,
    },
}

impl<'a> TreeNode<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    pub fn path(&self) -> &'a str {
        match self {
            Self::File { path, .. } | Self::Directory { path, .. } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    pub fn children(&self) -> &[TreeNode<'a>] {
        match self {
            Self::Directory { children, .. } => children,
            Self::File { .. } => &[],
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            Self::File { .. } => 1,
            Self::Directory { children, .. } => children.iter().map(TreeNode::file_count).sum(),
        }
    }

    pub fn find(&self, path: &str) -> Option<&TreeNode<'a>> {
        if self.path() == path {
            return Some(self);
        }
        self.children().iter().find_map(|child| {
            if path_key::is_self_or_descendant(path, child.path()) {
                child.find(path)
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection<'a> {
    pub root: TreeNode<'a>,
    /// Keys that could not be placed because an ancestor is a file.
    pub dropped: Vec<&'a str>,
}

impl<'a> Projection<'a> {
    /// Depth-first `(depth, node)` rows, root excluded.
    pub fn rows(&self) -> Vec<(usize, &TreeNode<'a>)> {
        fn walk<'n, 'a>(
            node: &'n TreeNode<'a>,
            depth: usize,
            out: &mut Vec<(usize, &'n TreeNode<'a>)>,
        ) {
            for child in node.children() {
                out.push((depth, child));
                walk(child, depth + 1, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.root, 0, &mut out);
        out
    }
}

enum Slot<'a> {
    File { path: &'a str, content: &'a str },
    Dir { path: &'a str, children: BTreeMap<&'a str, Slot<'a>> },
}

pub fn project(store: &WorkspaceStore) -> Projection<'_> {
    let mut root: BTreeMap<&str, Slot<'_>> = BTreeMap::new();
    let mut dropped = Vec::new();

    'keys: for (path, content) in store.iter() {
        let mut level = &mut root;
        let mut consumed = 0;
        let mut parts = path.split('/').peekable();

        while let Some(segment) = parts.next() {
            let end = consumed + segment.len();
            let is_last = parts.peek().is_none();

            if is_last {
                if segment == path_key::DIR_MARKER {
                    continue 'keys;
                }
                if level.contains_key(segment) {
                    dropped.push(path);
                    continue 'keys;
                }
                level.insert(segment, Slot::File { path, content });
                continue 'keys;
            }

            let slot = level.entry(segment).or_insert_with(|| Slot::Dir {
                path: &path[..end],
                children: BTreeMap::new(),
            });
            match slot {
                Slot::Dir { children, .. } => level = children,
                Slot::File { .. } => {
                    dropped.push(path);
                    continue 'keys;
                }
            }
            consumed = end + 1;
        }
    }

    for path in &dropped {
        tracing::warn!(path = %path, "workspace key shadowed by a file; omitted from tree");
    }

    Projection {
        root: TreeNode::Directory {
            name: "",
            path: "",
            children: into_nodes(root),
        },
        dropped,
    }
}

fn into_nodes<'a>(level: BTreeMap<&'a str, Slot<'a>>) -> Vec<TreeNode<'a>> {
    let mut nodes: Vec<TreeNode<'a>> = level
        .into_iter()
        .map(|(name, slot)| match slot {
            Slot::File { path, content } => TreeNode::File {
                name,
                path,
                content,
            },
            Slot::Dir { path, children } => TreeNode::Directory {
                name,
                path,
                children: into_nodes(children),
            },
        })
        .collect();
    nodes.sort_by(compare_nodes);
    nodes
}

fn compare_nodes(a: &TreeNode<'_>, b: &TreeNode<'_>) -> Ordering {
    b.is_directory()
        .cmp(&a.is_directory())
        .then_with(|| a.name().cmp(b.name()))
}

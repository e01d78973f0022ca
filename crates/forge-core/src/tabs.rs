use super::path_key;

/// Ordered editor tabs plus the focused one. Paths are weak references into the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFiles {
    paths: Vec<String>,
    selected: Option<String>,
}

impl OpenFiles {
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.paths.iter().any(|open| open == path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Adds a tab without moving focus. Returns false when already open.
    pub fn add(&mut self, path: &str) -> bool {
        if self.is_open(path) {
            return false;
        }
        self.paths.push(path.to_string());
        true
    }

    pub fn open(&mut self, path: &str) {
        self.add(path);
        self.selected = Some(path.to_string());
    }

    pub fn select(&mut self, path: &str) -> bool {
        if !self.is_open(path) {
            return false;
        }
        self.selected = Some(path.to_string());
        true
    }

    pub fn close(&mut self, path: &str) -> bool {
        let before = self.paths.len();
        self.paths.retain(|open| open != path);
        if self.paths.len() == before {
            return false;
        }
        if self.selected.as_deref() == Some(path) {
            self.selected = self.paths.last().cloned();
        }
        true
    }

    /// Applies a rename/move prefix rewrite to every tab and the selection.
    pub fn rewrite(&mut self, from: &str, to: &str) {
        for open in &mut self.paths {
            if let Some(next) = path_key::rewrite(open, from, to) {
                *open = next;
            }
        }
        if let Some(selected) = self.selected.as_mut() {
            if let Some(next) = path_key::rewrite(selected, from, to) {
                *selected = next;
            }
        }
    }

    /// Drops `root` and everything below it; a removed selection becomes none.
    pub fn remove_under(&mut self, root: &str) {
        self.retain(|path| !path_key::is_self_or_descendant(path, root));
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.paths.retain(|open| keep(open));
        let dangling = self
            .selected
            .as_deref()
            .is_some_and(|selected| !self.is_open(selected));
        if dangling {
            self.selected = None;
        }
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.selected = None;
    }
}

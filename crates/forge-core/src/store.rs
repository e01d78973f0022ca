use std::collections::BTreeMap;

use super::error::WorkspaceError;
use super::path_key;

/// Flat path → content table. The only owner of workspace content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceStore {
    entries: BTreeMap<String, String>,
}

impl WorkspaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Creates or overwrites `path`, returning the previous content.
    pub fn put(
        &mut self,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Option<String>, WorkspaceError> {
        let path = path.into();
        path_key::validate(&path)?;
        Ok(self.entries.insert(path, content.into()))
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the whole map, skipping malformed keys.
    pub fn seed(&mut self, files: impl IntoIterator<Item = (String, String)>) -> Vec<String> {
        self.entries.clear();
        let mut rejected = Vec::new();
        for (path, content) in files {
            if path_key::validate(&path).is_ok() {
                self.entries.insert(path, content);
            } else {
                rejected.push(path);
            }
        }
        rejected
    }

    /// Keys strictly below `dir`, in order.
    pub fn descendants<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let prefix = format!("{dir}/");
        self.entries
            .range(prefix.clone()..)
            .map(|(path, _)| path.as_str())
            .take_while(move |path| path.starts_with(prefix.as_str()))
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.descendants(path).next().is_some()
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.contains(path) && !path_key::is_marker(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.contains(path) || self.is_directory(path)
    }

    /// `{path} ∪ descendants(path)` as currently stored.
    pub fn affected_keys(&self, path: &str) -> Vec<String> {
        let mut keys = Vec::new();
        if self.contains(path) {
            keys.push(path.to_string());
        }
        keys.extend(self.descendants(path).map(str::to_string));
        keys
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }
}

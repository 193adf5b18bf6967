//! In-memory host backed by a sorted path map.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tslens_paths::{normalize_path, project_relative};

use crate::{FileStats, HostError, HostResult, ProjectHost, SearchFilter, SearchOptions};

/// A [`ProjectHost`] serving files from memory. Used by tests and by
/// embedders that mirror an editor buffer set instead of a real
/// directory tree. Iteration order is the sorted path order, so search
/// results are deterministic.
#[derive(Debug, Default)]
pub struct MemoryHost {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for test setup.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.files
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .insert(normalize_path(path), content.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files
            .write()
            .unwrap_or_else(|err| err.into_inner())
            .remove(&normalize_path(path));
    }

    pub fn len(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProjectHost for MemoryHost {
    async fn open_file(&self, path: &str) -> HostResult<String> {
        let files = self.files.read().unwrap_or_else(|err| err.into_inner());
        files
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }

    async fn search_files(
        &self,
        pattern: &str,
        root: &str,
        options: &SearchOptions,
    ) -> HostResult<Vec<String>> {
        let filter = SearchFilter::new(pattern, options)?;
        let root = normalize_path(root);
        let prefix = format!("{}/", root.trim_end_matches('/'));
        let files = self.files.read().unwrap_or_else(|err| err.into_inner());
        let matches = files
            .keys()
            .filter(|path| path.starts_with(&prefix))
            .filter(|path| filter.matches(&project_relative(&root, path)))
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn file_stats(&self, path: &str) -> HostResult<FileStats> {
        let files = self.files.read().unwrap_or_else(|err| err.into_inner());
        files
            .get(&normalize_path(path))
            .map(|content| FileStats {
                size: content.len() as u64,
                is_file: true,
            })
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }
}

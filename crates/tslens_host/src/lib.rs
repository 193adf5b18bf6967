//! tslens_host: Host abstraction over file access.
//!
//! The intellisense service never touches the filesystem directly. It
//! goes through [`ProjectHost`], which an embedder implements to serve
//! files from disk, an archive, or an in-memory workspace. Two
//! implementations ship here: [`LocalHost`] for real directories and
//! [`MemoryHost`] for tests and embedded use.

use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use thiserror::Error;

mod local;
mod memory;

pub use local::LocalHost;
pub use memory::MemoryHost;

/// Errors surfaced by host implementations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("could not read {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("invalid search pattern `{0}`")]
    InvalidPattern(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// Size and kind information for a host path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub size: u64,
    pub is_file: bool,
}

/// Include/exclude filters applied on top of a search pattern. All
/// patterns are globs matched against root-relative paths, where `*`
/// stops at `/` and `**` crosses it.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// File access as seen by the intellisense service.
///
/// Paths handed to these methods are normalized forward-slash strings;
/// `search_files` returns paths in the same form, sorted, so discovery
/// order is stable across hosts.
#[async_trait]
pub trait ProjectHost: Send + Sync {
    /// Read a file's full text.
    async fn open_file(&self, path: &str) -> HostResult<String>;

    /// Find files under `root` whose root-relative path matches
    /// `pattern`, the include list (when non-empty), and none of the
    /// excludes.
    async fn search_files(
        &self,
        pattern: &str,
        root: &str,
        options: &SearchOptions,
    ) -> HostResult<Vec<String>>;

    /// Stat a path.
    async fn file_stats(&self, path: &str) -> HostResult<FileStats>;

    /// Whether the path exists and is a regular file.
    async fn is_file(&self, path: &str) -> bool {
        matches!(self.file_stats(path).await, Ok(stats) if stats.is_file)
    }
}

/// A compiled search: primary pattern plus include/exclude sets.
pub(crate) struct SearchFilter {
    pattern: GlobSet,
    include: GlobSet,
    include_empty: bool,
    exclude: GlobSet,
}

impl SearchFilter {
    pub(crate) fn new(pattern: &str, options: &SearchOptions) -> HostResult<Self> {
        Ok(SearchFilter {
            pattern: compile_globs(std::iter::once(pattern))?,
            include: compile_globs(options.include.iter().map(String::as_str))?,
            include_empty: options.include.is_empty(),
            exclude: compile_globs(options.exclude.iter().map(String::as_str))?,
        })
    }

    pub(crate) fn matches(&self, relative: &str) -> bool {
        self.pattern.is_match(relative)
            && (self.include_empty || self.include.is_match(relative))
            && !self.exclude.is_match(relative)
    }
}

fn compile_globs<'a>(patterns: impl IntoIterator<Item = &'a str>) -> HostResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|_| HostError::InvalidPattern(pattern.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| HostError::InvalidPattern(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_does_not_cross_directories() {
        let filter = SearchFilter::new("*.d.ts", &SearchOptions::default()).unwrap();
        assert!(filter.matches("index.d.ts"));
        assert!(!filter.matches("types/index.d.ts"));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        let filter = SearchFilter::new("**/*.d.ts", &SearchOptions::default()).unwrap();
        assert!(filter.matches("types/deep/index.d.ts"));
    }

    #[test]
    fn test_include_and_exclude() {
        let options = SearchOptions {
            include: vec!["src/**".to_string()],
            exclude: vec!["**/node_modules/**".to_string()],
        };
        let filter = SearchFilter::new("**/*.ts", &options).unwrap();
        assert!(filter.matches("src/app.ts"));
        assert!(!filter.matches("scripts/app.ts"));
        assert!(!filter.matches("src/node_modules/dep/app.ts"));
    }

    #[test]
    fn test_brace_alternation() {
        let filter = SearchFilter::new("**/*.{ts,tsx}", &SearchOptions::default()).unwrap();
        assert!(filter.matches("a/b.tsx"));
        assert!(!filter.matches("a/b.js"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = SearchFilter::new("[", &SearchOptions::default()).unwrap_err();
        assert!(matches!(err, HostError::InvalidPattern(_)));
    }
}

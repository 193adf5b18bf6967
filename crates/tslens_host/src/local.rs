//! Host over a local directory tree.

use async_trait::async_trait;
use tracing::debug;
use tslens_paths::normalize_slashes;
use walkdir::WalkDir;

use crate::{FileStats, HostError, HostResult, ProjectHost, SearchFilter, SearchOptions};

/// A [`ProjectHost`] over the real filesystem. Reads go through
/// `tokio::fs`; directory walks run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        LocalHost
    }
}

fn read_error(path: &str, err: std::io::Error) -> HostError {
    if err.kind() == std::io::ErrorKind::NotFound {
        HostError::NotFound(path.to_string())
    } else {
        HostError::Unreadable {
            path: path.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ProjectHost for LocalHost {
    async fn open_file(&self, path: &str) -> HostResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|err| read_error(path, err))
    }

    async fn search_files(
        &self,
        pattern: &str,
        root: &str,
        options: &SearchOptions,
    ) -> HostResult<Vec<String>> {
        let filter = SearchFilter::new(pattern, options)?;
        let root = root.to_string();
        let walk_root = root.clone();
        let mut matches = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for entry in WalkDir::new(&walk_root).into_iter() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        debug!(root = %walk_root, error = %err, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = match entry.path().strip_prefix(&walk_root) {
                    Ok(relative) => normalize_slashes(&relative.to_string_lossy()),
                    Err(_) => continue,
                };
                if filter.matches(&relative) {
                    found.push(normalize_slashes(&entry.path().to_string_lossy()));
                }
            }
            found
        })
        .await
        .map_err(std::io::Error::other)?;
        matches.sort();
        Ok(matches)
    }

    async fn file_stats(&self, path: &str) -> HostResult<FileStats> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|err| read_error(path, err))?;
        Ok(FileStats {
            size: meta.len(),
            is_file: meta.is_file(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_host_reads_and_searches() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/dep")).unwrap();
        std::fs::write(root.join("src/a.ts"), "export const a = 1;").unwrap();
        std::fs::write(root.join("node_modules/dep/index.ts"), "export {}").unwrap();

        let host = LocalHost::new();
        let root_str = normalize_slashes(&root.to_string_lossy());

        let content = host
            .open_file(&format!("{}/src/a.ts", root_str))
            .await
            .unwrap();
        assert_eq!(content, "export const a = 1;");

        let options = SearchOptions {
            include: Vec::new(),
            exclude: vec!["**/node_modules/**".to_string()],
        };
        let found = host
            .search_files("**/*.ts", &root_str, &options)
            .await
            .unwrap();
        assert_eq!(found, vec![format!("{}/src/a.ts", root_str)]);
    }

    #[tokio::test]
    async fn test_missing_path_maps_to_not_found() {
        let host = LocalHost::new();
        let err = host.open_file("/definitely/not/here.ts").await.unwrap_err();
        assert!(matches!(err, HostError::NotFound(_)));
    }
}

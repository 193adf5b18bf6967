//! Bounded recursive scans for satellite declaration files.
//!
//! Manifests rarely point at every declaration a package ships, so after
//! built-in discovery a scan walks a fixed list of conventional
//! locations. Two caps bound the worst case on pathological packages: a
//! per-pattern file cap and a cumulative per-dependency cap that stops
//! the whole scan.

use futures::future::join_all;
use tracing::debug;
use tslens_host::SearchOptions;
use tslens_paths::{join_paths, project_relative};

use crate::{DependencyTypeLoader, FrameworkProfile};

/// Scan locations, in priority order.
pub(crate) const SCAN_PATTERNS: [&str; 6] = [
    "*.d.ts",
    "types/**/*.d.ts",
    "lib/**/*.d.ts",
    "dist/**/*.d.ts",
    "src/**/*.d.ts",
    "typings/**/*.d.ts",
];

/// Test and spec locations are never worth registering.
pub(crate) const TEST_EXCLUDES: [&str; 5] = [
    "**/test/**",
    "**/tests/**",
    "**/__tests__/**",
    "**/spec/**",
    "**/*.spec.*",
];

/// Per-pattern file cap for `@types/*` packages, which are all signal.
pub const PATTERN_CAP_TYPES_PACKAGE: usize = 100;
/// Per-pattern file cap for everything else.
pub const PATTERN_CAP_DEFAULT: usize = 30;
/// Cumulative registration cap for one dependency pass.
pub const SCAN_TOTAL_CAP: usize = 500;

pub(crate) fn per_pattern_cap(package: &str) -> usize {
    if package.starts_with("@types/") {
        PATTERN_CAP_TYPES_PACKAGE
    } else {
        PATTERN_CAP_DEFAULT
    }
}

impl DependencyTypeLoader {
    /// Walk [`SCAN_PATTERNS`] under the package directory, registering
    /// up to `per_pattern_cap` files per pattern and stopping outright
    /// at the cumulative cap.
    pub(crate) async fn scan_declarations(
        &self,
        package: &str,
        per_pattern_cap: usize,
        scanned: &mut usize,
    ) -> usize {
        let package_dir = self.package_dir(package);
        let mut registered = 0;
        for pattern in SCAN_PATTERNS {
            if *scanned >= SCAN_TOTAL_CAP {
                debug!(package, "declaration scan budget exhausted");
                break;
            }
            registered += self
                .scan_one_root(package, &package_dir, &package_dir, pattern, per_pattern_cap, scanned)
                .await;
        }
        registered
    }

    /// The wider framework variant: each profile directory is searched
    /// recursively with the profile's higher cap.
    pub(crate) async fn scan_framework_dirs(
        &self,
        profile: &FrameworkProfile,
        scanned: &mut usize,
    ) -> usize {
        let package_dir = self.package_dir(profile.package);
        let mut registered = 0;
        for dir in profile.scan_dirs {
            if *scanned >= SCAN_TOTAL_CAP {
                break;
            }
            let search_root = join_paths(&package_dir, dir);
            registered += self
                .scan_one_root(
                    profile.package,
                    &package_dir,
                    &search_root,
                    "**/*.d.ts",
                    profile.per_pattern_cap,
                    scanned,
                )
                .await;
        }
        registered
    }

    async fn scan_one_root(
        &self,
        package: &str,
        package_dir: &str,
        search_root: &str,
        pattern: &str,
        cap: usize,
        scanned: &mut usize,
    ) -> usize {
        let options = SearchOptions {
            include: Vec::new(),
            exclude: TEST_EXCLUDES.iter().map(|e| e.to_string()).collect(),
        };
        let found = match self.host.search_files(pattern, search_root, &options).await {
            Ok(found) => found,
            Err(err) => {
                debug!(package, pattern, error = %err, "declaration search failed");
                return 0;
            }
        };
        let budget = cap.min(SCAN_TOTAL_CAP.saturating_sub(*scanned));
        let selected: Vec<String> = found.into_iter().take(budget).collect();
        let reads = join_all(
            selected
                .iter()
                .map(|path| async move { self.host.open_file(path).await.ok() }),
        )
        .await;
        let mut registered = 0;
        for (path, content) in selected.iter().zip(reads) {
            let Some(content) = content else { continue };
            let rel = project_relative(package_dir, path);
            if self.register(package, &rel, &content) {
                registered += 1;
                *scanned += 1;
            }
        }
        registered
    }
}

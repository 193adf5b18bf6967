//! tslens_loader: Bounded bulk loading of project sources.
//!
//! One recursive search discovers every source-like file, results are
//! partitioned into "likely relevant" and "everything else", and a
//! bounded number of each is loaded into the registry in concurrent
//! batches. The bounds keep first-open latency flat on large
//! repositories; files past the cap stay resolvable on demand. A side
//! product is the [`FileIndex`] that maps short-form names to absolute
//! paths for the resolver.

use futures::future::join_all;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use tslens_config::ProjectConfig;
use tslens_host::{ProjectHost, SearchOptions};
use tslens_paths::{directory_of, file_name, file_stem, project_relative};
use tslens_registry::FileRegistry;

/// Cap on files loaded from the likely-relevant bucket.
pub const MAX_RELEVANT_FILES: usize = 200;
/// Cap on files loaded from everything else.
pub const MAX_OTHER_FILES: usize = 100;
/// Files loaded concurrently per batch.
pub const LOAD_BATCH: usize = 20;

/// Directory names that mark a path as likely relevant to intellisense.
pub const RELEVANT_DIR_NAMES: [&str; 9] = [
    "src", "source", "components", "pages", "lib", "utils", "app", "layouts", "hooks",
];

/// Exclusions applied when the configuration declares none.
pub const DEFAULT_EXCLUDES: [&str; 5] = [
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/.git/**",
    "**/*.min.js",
];

const SOURCE_SEARCH_PATTERN: &str = "**/*.{ts,tsx,js,jsx}";

/// Short-form name lookup over discovered files: bare file name, file
/// stem, and directory basename for `index.*` files. First discovery
/// wins on collisions, and discovery order is sorted, so lookups are
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    by_name: FxHashMap<String, String>,
    by_stem: FxHashMap<String, String>,
    by_index_dir: FxHashMap<String, String>,
}

impl FileIndex {
    fn insert(&mut self, absolute: &str) {
        let name = file_name(absolute).to_string();
        let stem = file_stem(absolute);
        if stem == "index" {
            let dir = directory_of(absolute);
            let dir_name = file_name(&dir);
            if !dir_name.is_empty() {
                self.by_index_dir
                    .entry(dir_name.to_string())
                    .or_insert_with(|| absolute.to_string());
            }
        }
        self.by_name
            .entry(name)
            .or_insert_with(|| absolute.to_string());
        self.by_stem
            .entry(stem)
            .or_insert_with(|| absolute.to_string());
    }

    /// Resolve a short form to an absolute path: exact file name first,
    /// then stem, then index-carrying directory name.
    pub fn lookup(&self, short: &str) -> Option<&str> {
        self.by_name
            .get(short)
            .or_else(|| self.by_stem.get(short))
            .or_else(|| self.by_index_dir.get(short))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// What a bulk load did.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub total_discovered: usize,
    pub loaded: usize,
    pub index: FileIndex,
}

/// Turn a config include/exclude entry into a glob. Bare directory
/// entries ("src") mean their whole subtree.
fn normalize_glob_entry(entry: &str) -> String {
    let entry = entry.trim_start_matches("./");
    if entry.contains(['*', '?', '[', '{']) {
        entry.to_string()
    } else {
        format!("{}/**", entry.trim_end_matches('/'))
    }
}

fn search_options(config: Option<&ProjectConfig>) -> SearchOptions {
    let include = config
        .map(|c| c.include.iter().map(|e| normalize_glob_entry(e)).collect())
        .unwrap_or_default();
    let exclude = match config {
        Some(c) if !c.exclude.is_empty() => {
            c.exclude.iter().map(|e| normalize_glob_entry(e)).collect()
        }
        _ => DEFAULT_EXCLUDES.iter().map(|e| e.to_string()).collect(),
    };
    SearchOptions { include, exclude }
}

/// Whether a root-relative path lands in the likely-relevant bucket:
/// top-level files, or anything under a conventional source directory.
fn is_relevant(relative: &str) -> bool {
    let mut segments = relative.split('/').peekable();
    let mut saw_dir = false;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            break;
        }
        saw_dir = true;
        if RELEVANT_DIR_NAMES.contains(&segment) {
            return true;
        }
    }
    !saw_dir
}

/// Discover and bulk-load project sources into `registry`.
///
/// Individual file failures are logged inside [`FileRegistry::load`] and
/// never abort their batch; a failed search yields an empty summary.
pub async fn load_all(
    host: &dyn ProjectHost,
    registry: &FileRegistry,
    config: Option<&ProjectConfig>,
) -> LoadSummary {
    let root = registry.project_root().to_string();
    let options = search_options(config);
    let discovered = match host
        .search_files(SOURCE_SEARCH_PATTERN, &root, &options)
        .await
    {
        Ok(found) => found,
        Err(err) => {
            warn!(root = %root, error = %err, "project file search failed");
            return LoadSummary::default();
        }
    };

    let mut index = FileIndex::default();
    let mut relevant = Vec::new();
    let mut other = Vec::new();
    for path in &discovered {
        index.insert(path);
        if is_relevant(&project_relative(&root, path)) {
            relevant.push(path.clone());
        } else {
            other.push(path.clone());
        }
    }
    debug!(
        discovered = discovered.len(),
        relevant = relevant.len(),
        "partitioned project files"
    );

    let selected: Vec<String> = relevant
        .into_iter()
        .take(MAX_RELEVANT_FILES)
        .chain(other.into_iter().take(MAX_OTHER_FILES))
        .collect();

    let mut loaded = 0;
    for batch in selected.chunks(LOAD_BATCH) {
        let results = join_all(batch.iter().map(|path| registry.load(path))).await;
        loaded += results.into_iter().filter(|ok| *ok).count();
    }

    info!(
        discovered = discovered.len(),
        loaded,
        "bulk project load finished"
    );
    LoadSummary {
        total_discovered: discovered.len(),
        loaded,
        index,
    }
}

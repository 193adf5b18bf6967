//! tslens_config: Project configuration discovery and parsing.
//!
//! Locates a project's compiler configuration (`tsconfig.json` and its
//! variants), tolerates the comments editors leave in those files, and
//! follows a first-level `extends` reference. Also parses `package.json`
//! manifests, strictly. Every entry point degrades to `None` instead of
//! erroring: a project with no readable configuration still gets
//! intellisense, just with default options.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tslens_host::ProjectHost;
use tslens_paths::{directory_of, join_paths};

mod manifest;

pub use manifest::{parse_manifest, PackageManifest};

/// Configuration file names tried in order: the primary config, the
/// app-scoped variant some scaffolds emit, and the plain-JS variant.
pub const CANDIDATE_FILES: [&str; 3] = ["tsconfig.json", "tsconfig.app.json", "jsconfig.json"];

/// Remove `//` line comments and `/* ... */` block comments from JSON
/// text, preserving newlines so parse errors keep their line numbers.
///
/// The stripper is deliberately naive: it does not track string
/// literals, so a string value containing `//` is truncated at that
/// point. Known limitation.
pub fn strip_json_comments(source: &str) -> String {
    enum State {
        Normal,
        Line,
        Block,
    }
    let mut state = State::Normal;
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Normal => {
                if c == '/' {
                    match chars.peek() {
                        Some('/') => {
                            chars.next();
                            state = State::Line;
                        }
                        Some('*') => {
                            chars.next();
                            state = State::Block;
                        }
                        _ => out.push(c),
                    }
                } else {
                    out.push(c);
                }
            }
            State::Line => {
                if c == '\n' {
                    out.push(c);
                    state = State::Normal;
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                } else if c == '\n' {
                    out.push(c);
                }
            }
        }
    }
    out
}

/// The `compilerOptions` block as written on disk. Everything is
/// optional; translation to analyzer options happens downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptionsRaw {
    pub target: Option<String>,
    pub module: Option<String>,
    pub module_resolution: Option<String>,
    pub jsx: Option<String>,
    pub strict: Option<bool>,
    pub es_module_interop: Option<bool>,
    pub allow_synthetic_default_imports: Option<bool>,
    pub skip_lib_check: Option<bool>,
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub base_url: Option<String>,
    pub paths: Option<IndexMap<String, Vec<String>>>,
    pub lib: Option<Vec<String>>,
}

impl CompilerOptionsRaw {
    /// Layer these options over an extended base. The child wins per
    /// field; `paths` maps are replaced wholesale, never key-merged.
    fn or_base(self, base: CompilerOptionsRaw) -> CompilerOptionsRaw {
        CompilerOptionsRaw {
            target: self.target.or(base.target),
            module: self.module.or(base.module),
            module_resolution: self.module_resolution.or(base.module_resolution),
            jsx: self.jsx.or(base.jsx),
            strict: self.strict.or(base.strict),
            es_module_interop: self.es_module_interop.or(base.es_module_interop),
            allow_synthetic_default_imports: self
                .allow_synthetic_default_imports
                .or(base.allow_synthetic_default_imports),
            skip_lib_check: self.skip_lib_check.or(base.skip_lib_check),
            allow_js: self.allow_js.or(base.allow_js),
            check_js: self.check_js.or(base.check_js),
            base_url: self.base_url.or(base.base_url),
            paths: self.paths.or(base.paths),
            lib: self.lib.or(base.lib),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawTsConfig {
    extends: Option<String>,
    compiler_options: Option<CompilerOptionsRaw>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

/// A parsed project configuration. Built once at initialization and
/// replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub compiler_options: CompilerOptionsRaw,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Absolute path of the file this configuration came from.
    pub source_file: String,
}

/// Finds and parses project configuration through a [`ProjectHost`].
pub struct ConfigLoader {
    host: Arc<dyn ProjectHost>,
}

impl ConfigLoader {
    pub fn new(host: Arc<dyn ProjectHost>) -> Self {
        ConfigLoader { host }
    }

    /// Try each candidate file under `project_root` and return the first
    /// that parses. Returns `None` when no candidate exists or parses;
    /// parse failures are logged and the next candidate is tried.
    pub async fn load(&self, project_root: &str) -> Option<ProjectConfig> {
        for candidate in CANDIDATE_FILES {
            let path = join_paths(project_root, candidate);
            let text = match self.host.open_file(&path).await {
                Ok(text) => text,
                Err(_) => continue,
            };
            match serde_json::from_str::<RawTsConfig>(&strip_json_comments(&text)) {
                Ok(raw) => {
                    let raw = self.resolve_extends(raw, &path).await;
                    info!(config = %path, "loaded project configuration");
                    return Some(ProjectConfig {
                        compiler_options: raw.compiler_options.unwrap_or_default(),
                        include: raw.include.unwrap_or_default(),
                        exclude: raw.exclude.unwrap_or_default(),
                        source_file: path,
                    });
                }
                Err(err) => {
                    warn!(config = %path, error = %err, "configuration failed to parse, trying next candidate");
                }
            }
        }
        debug!(root = %project_root, "no project configuration found");
        None
    }

    /// Strict `package.json` parsing: no comment stripping, `None` on
    /// any read or parse failure.
    pub async fn load_manifest(&self, path: &str) -> Option<PackageManifest> {
        let text = self.host.open_file(path).await.ok()?;
        let parsed = parse_manifest(&text);
        if parsed.is_none() {
            warn!(manifest = %path, "package manifest failed to parse");
        }
        parsed
    }

    /// Follow a first-level `extends` reference, merging the base file's
    /// options underneath the child's. Chains beyond one hop are not
    /// followed.
    async fn resolve_extends(&self, child: RawTsConfig, config_path: &str) -> RawTsConfig {
        let Some(reference) = child.extends.clone() else {
            return child;
        };
        let dir = directory_of(config_path);
        let mut candidates = vec![join_paths(&dir, &reference)];
        if !reference.ends_with(".json") {
            candidates.push(join_paths(&dir, &format!("{}.json", reference)));
        }
        for base_path in candidates {
            let Ok(text) = self.host.open_file(&base_path).await else {
                continue;
            };
            match serde_json::from_str::<RawTsConfig>(&strip_json_comments(&text)) {
                Ok(base) => {
                    if base.extends.is_some() {
                        debug!(base = %base_path, "nested extends not followed");
                    }
                    return RawTsConfig {
                        extends: None,
                        compiler_options: Some(
                            child
                                .compiler_options
                                .unwrap_or_default()
                                .or_base(base.compiler_options.unwrap_or_default()),
                        ),
                        include: child.include.or(base.include),
                        exclude: child.exclude.or(base.exclude),
                    };
                }
                Err(err) => {
                    warn!(base = %base_path, error = %err, "extended configuration failed to parse");
                    return child;
                }
            }
        }
        warn!(config = %config_path, extends = %reference, "extended configuration not found");
        child
    }
}

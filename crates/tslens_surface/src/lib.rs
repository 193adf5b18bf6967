//! tslens_surface: Analyzer-side vocabulary and option translation.
//!
//! The service drives an embedded editor's language analyzer through the
//! [`AnalysisSurface`] trait: compiler options per language family, live
//! text models, and ambient declarations. This crate owns that trait,
//! the analyzer option types, and the translator that maps a parsed
//! project configuration onto them.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;
use tslens_config::ProjectConfig;
use tslens_paths::join_paths;

pub mod recording;

pub use recording::{RecordingSurface, SurfaceEvent};

/// The two language families the analyzer configures separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptFamily {
    TypeScript,
    JavaScript,
}

impl ScriptFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptFamily::TypeScript => "typescript",
            ScriptFamily::JavaScript => "javascript",
        }
    }
}

/// Script target version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptTarget {
    ES3,
    ES5,
    ES2015,
    ES2016,
    ES2017,
    ES2018,
    ES2019,
    ES2020,
    ES2021,
    ES2022,
    ES2023,
    ES2024,
    ESNext,
    Latest,
}

impl ScriptTarget {
    /// Map a tsconfig `target` string. Absent or unrecognized values
    /// fall back to `Latest`.
    pub fn from_label(label: Option<&str>) -> ScriptTarget {
        match label.map(str::to_ascii_lowercase).as_deref() {
            Some("es3") => ScriptTarget::ES3,
            Some("es5") => ScriptTarget::ES5,
            Some("es6") | Some("es2015") => ScriptTarget::ES2015,
            Some("es2016") => ScriptTarget::ES2016,
            Some("es2017") => ScriptTarget::ES2017,
            Some("es2018") => ScriptTarget::ES2018,
            Some("es2019") => ScriptTarget::ES2019,
            Some("es2020") => ScriptTarget::ES2020,
            Some("es2021") => ScriptTarget::ES2021,
            Some("es2022") => ScriptTarget::ES2022,
            Some("es2023") => ScriptTarget::ES2023,
            Some("es2024") => ScriptTarget::ES2024,
            Some("esnext") => ScriptTarget::ESNext,
            _ => ScriptTarget::Latest,
        }
    }
}

/// Module kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleKind {
    None,
    CommonJS,
    AMD,
    UMD,
    System,
    ES2015,
    ESNext,
}

impl ModuleKind {
    /// Map a tsconfig `module` string. The modern module values
    /// (`es2020`, `es2022`, `node16`, `nodenext`, `preserve`) all land
    /// on `ESNext`, which is also the fallback.
    pub fn from_label(label: Option<&str>) -> ModuleKind {
        match label.map(str::to_ascii_lowercase).as_deref() {
            Some("none") => ModuleKind::None,
            Some("commonjs") => ModuleKind::CommonJS,
            Some("amd") => ModuleKind::AMD,
            Some("umd") => ModuleKind::UMD,
            Some("system") => ModuleKind::System,
            Some("es6") | Some("es2015") => ModuleKind::ES2015,
            _ => ModuleKind::ESNext,
        }
    }
}

/// Module resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionKind {
    Classic,
    Node,
}

impl ResolutionKind {
    /// Map a tsconfig `moduleResolution` string. `bundler` has no
    /// analyzer counterpart; `node` is the closest supported strategy
    /// and is also the fallback.
    pub fn from_label(label: Option<&str>) -> ResolutionKind {
        match label.map(str::to_ascii_lowercase).as_deref() {
            Some("classic") => ResolutionKind::Classic,
            _ => ResolutionKind::Node,
        }
    }
}

/// JSX emit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JsxMode {
    None,
    Preserve,
    React,
    ReactNative,
    ReactJSX,
    ReactJSXDev,
}

impl JsxMode {
    /// Map a tsconfig `jsx` string. Absent or unrecognized means no JSX.
    pub fn from_label(label: Option<&str>) -> JsxMode {
        match label.map(str::to_ascii_lowercase).as_deref() {
            Some("preserve") => JsxMode::Preserve,
            Some("react") => JsxMode::React,
            Some("react-native") => JsxMode::ReactNative,
            Some("react-jsx") => JsxMode::ReactJSX,
            Some("react-jsxdev") => JsxMode::ReactJSXDev,
            _ => JsxMode::None,
        }
    }

    /// Whether this mode enables JSX syntax at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, JsxMode::None)
    }
}

/// Compiler options in the analyzer's vocabulary, one instance per
/// [`ScriptFamily`] slot. `allow_non_ts_extensions` and `no_emit` are
/// always true: this service analyzes, it never emits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOptions {
    pub target: ScriptTarget,
    pub module: ModuleKind,
    pub module_resolution: ResolutionKind,
    pub jsx: JsxMode,
    pub strict: Option<bool>,
    pub es_module_interop: Option<bool>,
    pub allow_synthetic_default_imports: Option<bool>,
    pub skip_lib_check: Option<bool>,
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub base_url: Option<String>,
    pub paths: Option<IndexMap<String, Vec<String>>>,
    pub lib: Option<Vec<String>>,
    pub allow_non_ts_extensions: bool,
    pub no_emit: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            target: ScriptTarget::Latest,
            module: ModuleKind::ESNext,
            module_resolution: ResolutionKind::Node,
            jsx: JsxMode::None,
            strict: None,
            es_module_interop: None,
            allow_synthetic_default_imports: None,
            skip_lib_check: None,
            allow_js: None,
            check_js: None,
            base_url: None,
            paths: None,
            lib: None,
            allow_non_ts_extensions: true,
            no_emit: true,
        }
    }
}

impl AnalyzerOptions {
    /// Translate a parsed project configuration, resolving `baseUrl` and
    /// every `paths` target to absolute form under `project_root`.
    pub fn from_config(config: &ProjectConfig, project_root: &str) -> AnalyzerOptions {
        let raw = &config.compiler_options;
        AnalyzerOptions {
            target: ScriptTarget::from_label(raw.target.as_deref()),
            module: ModuleKind::from_label(raw.module.as_deref()),
            module_resolution: ResolutionKind::from_label(raw.module_resolution.as_deref()),
            jsx: JsxMode::from_label(raw.jsx.as_deref()),
            strict: raw.strict,
            es_module_interop: raw.es_module_interop,
            allow_synthetic_default_imports: raw.allow_synthetic_default_imports,
            skip_lib_check: raw.skip_lib_check,
            allow_js: raw.allow_js,
            check_js: raw.check_js,
            base_url: raw
                .base_url
                .as_deref()
                .map(|base| join_paths(project_root, base)),
            paths: raw.paths.as_ref().map(|paths| {
                paths
                    .iter()
                    .map(|(pattern, targets)| {
                        let absolute = targets
                            .iter()
                            .map(|target| join_paths(project_root, target))
                            .collect();
                        (pattern.clone(), absolute)
                    })
                    .collect()
            }),
            lib: raw
                .lib
                .as_ref()
                .map(|entries| entries.iter().map(|e| normalize_lib_entry(e)).collect()),
            ..AnalyzerOptions::default()
        }
    }
}

/// Strip conventional decoration from a `lib` entry: `lib.` prefix,
/// `.d.ts` suffix, case. `"lib.DOM.d.ts"` and `"DOM"` both become `"dom"`.
pub fn normalize_lib_entry(entry: &str) -> String {
    let lower = entry.to_ascii_lowercase();
    let lower = lower.strip_prefix("lib.").unwrap_or(&lower);
    let lower = lower.strip_suffix(".d.ts").unwrap_or(lower);
    lower.to_string()
}

/// The editor-side language analyzer as the service sees it: per-family
/// compiler options, live text models keyed by absolute path, and a set
/// of ambient declarations keyed by virtual path.
///
/// Implementations must tolerate redundant calls (disposing an unknown
/// model, re-adding an ambient path) without erroring; the service
/// treats the surface as idempotent.
pub trait AnalysisSurface: Send + Sync {
    fn set_compiler_options(&self, family: ScriptFamily, options: AnalyzerOptions);
    fn has_model(&self, path: &str) -> bool;
    fn create_model(&self, path: &str, family: ScriptFamily, content: &str);
    fn set_model_content(&self, path: &str, content: &str);
    fn dispose_model(&self, path: &str);
    fn add_ambient_declaration(&self, virtual_path: &str, content: &str);
    fn clear_ambient_declarations(&self);
}

/// Translate `config` and install the result into both family slots.
/// Returns the translated options for logging and inspection. When a
/// project has no configuration this is simply never called and the
/// surface keeps its own defaults.
pub fn apply_compiler_options(
    config: &ProjectConfig,
    project_root: &str,
    surface: &dyn AnalysisSurface,
) -> AnalyzerOptions {
    let options = AnalyzerOptions::from_config(config, project_root);
    debug!(
        target = ?options.target,
        module = ?options.module,
        jsx = ?options.jsx,
        "translated compiler options"
    );
    surface.set_compiler_options(ScriptFamily::TypeScript, options.clone());
    surface.set_compiler_options(ScriptFamily::JavaScript, options.clone());
    options
}

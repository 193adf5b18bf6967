//! tslens_deps: Dependency type-declaration loading.
//!
//! For every dependency declared in the project manifest, find its type
//! declarations and register them with the analysis surface as ambient
//! declarations: shipped declarations first (manifest `types`/`typings`,
//! `main`-derived, `exports` map, conventional entry paths), a bounded
//! recursive scan for satellite declaration files, and `@types/*`
//! packages as a fallback. Known large frameworks get wider scans plus
//! implied peer types. Everything is capped, batched, and
//! failure-isolated; a session-wide seen-set makes registration
//! idempotent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, info};
use tslens_config::parse_manifest;
use tslens_host::ProjectHost;
use tslens_paths::{declaration_sibling, join_paths, normalize_path, types_package_name};
use tslens_surface::AnalysisSurface;

mod frameworks;
mod scan;
mod stdlib;

pub use frameworks::{profile_for, FrameworkProfile, FRAMEWORK_PROFILES};
pub use scan::{PATTERN_CAP_DEFAULT, PATTERN_CAP_TYPES_PACKAGE, SCAN_TOTAL_CAP};

/// Dependencies processed concurrently per batch.
pub const DEPENDENCY_BATCH: usize = 10;
/// Pause between dependency batches, as backpressure on the host.
pub const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Conventional declaration entry paths probed when the manifest does
/// not point anywhere useful, in probe order.
const BUILTIN_FALLBACKS: [&str; 5] = [
    "index.d.ts",
    "lib/index.d.ts",
    "dist/index.d.ts",
    "types/index.d.ts",
    "typings/index.d.ts",
];

/// What a full dependency pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencySummary {
    pub dependencies: usize,
    pub registered: usize,
}

/// Loads dependency declarations through a [`ProjectHost`] and registers
/// them on an [`AnalysisSurface`]. One instance per project session; the
/// seen-set spans the session so each virtual path registers at most
/// once until [`reset`](Self::reset).
pub struct DependencyTypeLoader {
    host: Arc<dyn ProjectHost>,
    surface: Arc<dyn AnalysisSurface>,
    root: String,
    seen: Mutex<FxHashSet<String>>,
}

impl DependencyTypeLoader {
    pub fn new(
        host: Arc<dyn ProjectHost>,
        surface: Arc<dyn AnalysisSurface>,
        project_root: &str,
    ) -> Self {
        DependencyTypeLoader {
            host,
            surface,
            root: normalize_path(project_root),
            seen: Mutex::new(FxHashSet::default()),
        }
    }

    /// Load declarations for every dependency named in the project
    /// manifest, all four categories merged. Dependencies run in batches
    /// of [`DEPENDENCY_BATCH`] with a short pause between batches; a
    /// missing or malformed dependency never aborts the pass.
    pub async fn load_all(&self) -> DependencySummary {
        let manifest = match self
            .host
            .open_file(&join_paths(&self.root, "package.json"))
            .await
        {
            Ok(text) => parse_manifest(&text),
            Err(_) => None,
        };
        let Some(manifest) = manifest else {
            debug!(root = %self.root, "no readable project manifest, skipping dependency types");
            return DependencySummary::default();
        };
        let names: Vec<String> = manifest.all_dependencies().keys().cloned().collect();
        let mut registered = 0;
        let mut batches = names.chunks(DEPENDENCY_BATCH).peekable();
        while let Some(batch) = batches.next() {
            let counts = join_all(batch.iter().map(|name| self.load_one(name))).await;
            registered += counts.into_iter().sum::<usize>();
            if batches.peek().is_some() {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
        }
        info!(
            dependencies = names.len(),
            registered, "dependency type loading finished"
        );
        DependencySummary {
            dependencies: names.len(),
            registered,
        }
    }

    /// Load declarations for one dependency. Returns how many new
    /// ambient declarations were registered.
    pub async fn load_one(&self, name: &str) -> usize {
        let mut scanned = 0usize;
        let mut registered = 0usize;

        if let Some(profile) = frameworks::profile_for(name) {
            registered += self.framework_pass(profile, &mut scanned).await;
        }

        let (found, count) = self
            .load_package(name, scan::per_pattern_cap(name), &mut scanned)
            .await;
        registered += count;

        // Shipped nothing: try the community types-only package.
        if !found && !name.starts_with("@types/") {
            let fallback = types_package_name(name);
            let (_, count) = self
                .load_package(&fallback, PATTERN_CAP_TYPES_PACKAGE, &mut scanned)
                .await;
            registered += count;
        }
        // Scoped names sometimes have a types package keyed by the bare
        // package name rather than the mangled scope form.
        if let Some(short) = scoped_types_fallback(name) {
            let (_, count) = self
                .load_package(&short, PATTERN_CAP_TYPES_PACKAGE, &mut scanned)
                .await;
            registered += count;
        }

        if registered > 0 {
            debug!(dependency = name, registered, "loaded dependency types");
        }
        registered
    }

    /// Forget every registration. The next pass re-registers everything;
    /// used by project refresh after ambient declarations are cleared.
    pub fn reset(&self) {
        self.seen
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }

    /// Built-in discovery plus the bounded declaration scan for one
    /// package directory.
    async fn load_package(
        &self,
        package: &str,
        per_pattern_cap: usize,
        scanned: &mut usize,
    ) -> (bool, usize) {
        let (found, mut registered) = self.load_builtin(package).await;
        registered += self
            .scan_declarations(package, per_pattern_cap, scanned)
            .await;
        (found, registered)
    }

    /// Probe the manifest-declared and conventional declaration entry
    /// points, all concurrently, and register every one that reads.
    async fn load_builtin(&self, package: &str) -> (bool, usize) {
        let package_dir = self.package_dir(package);
        let manifest = match self
            .host
            .open_file(&join_paths(&package_dir, "package.json"))
            .await
        {
            Ok(text) => parse_manifest(&text),
            Err(_) => None,
        };

        let mut candidates: IndexSet<String> = IndexSet::new();
        if let Some(manifest) = &manifest {
            if let Some(types) = manifest.types_entry() {
                candidates.insert(normalize_path(types));
            }
            if let Some(typings) = &manifest.typings {
                candidates.insert(normalize_path(typings));
            }
            if let Some(main) = &manifest.main {
                candidates.insert(normalize_path(&declaration_sibling(main)));
            }
            if let Some(exports) = &manifest.exports {
                let mut export_types = Vec::new();
                collect_exports_types(exports, &mut export_types);
                for entry in export_types {
                    candidates.insert(normalize_path(&entry));
                }
            }
        }
        for fallback in BUILTIN_FALLBACKS {
            candidates.insert(fallback.to_string());
        }

        let reads = join_all(candidates.iter().map(|rel| {
            let path = join_paths(&package_dir, rel);
            async move { self.host.open_file(&path).await.ok() }
        }))
        .await;

        let mut found = false;
        let mut registered = 0;
        for (rel, content) in candidates.iter().zip(reads) {
            let Some(content) = content else { continue };
            found = true;
            if self.register(package, rel, &content) {
                registered += 1;
            }
        }
        (found, registered)
    }

    /// Framework-specific pass: scan the profile's extra directories and
    /// pull in the types packages for implied peers.
    async fn framework_pass(&self, profile: &FrameworkProfile, scanned: &mut usize) -> usize {
        debug!(framework = profile.package, "framework-specific type loading");
        let mut registered = self.scan_framework_dirs(profile, scanned).await;
        for implied in profile.implied_types {
            let types_package = types_package_name(implied);
            let (_, count) = self
                .load_package(&types_package, PATTERN_CAP_TYPES_PACKAGE, scanned)
                .await;
            registered += count;
        }
        registered
    }

    /// Register a declaration under its package-namespaced virtual path.
    /// Returns false when the path was already registered this session.
    fn register(&self, package: &str, rel: &str, content: &str) -> bool {
        let virtual_path = format!("node_modules/{}/{}", package, rel);
        {
            let mut seen = self.seen.lock().unwrap_or_else(|err| err.into_inner());
            if !seen.insert(virtual_path.clone()) {
                return false;
            }
        }
        self.surface.add_ambient_declaration(&virtual_path, content);
        true
    }

    fn package_dir(&self, package: &str) -> String {
        join_paths(&self.root, &format!("node_modules/{}", package))
    }
}

/// The short-name types fallback for a scoped package: `@scope/name`
/// gives `@types/name`. `@types/*` inputs have no further fallback.
fn scoped_types_fallback(name: &str) -> Option<String> {
    if !name.starts_with('@') || name.starts_with("@types/") {
        return None;
    }
    name.split('/').nth(1).map(|short| format!("@types/{}", short))
}

/// Collect every string sitting under a `types` key anywhere in a
/// conditional `exports` value.
fn collect_exports_types(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "types" {
                    collect_strings(child, out);
                } else {
                    collect_exports_types(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_exports_types(item, out);
            }
        }
        _ => {}
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Object(map) => {
            for child in map.values() {
                collect_strings(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
pub(crate) fn test_loader(
    host: tslens_host::MemoryHost,
) -> (DependencyTypeLoader, Arc<tslens_surface::RecordingSurface>) {
    let surface = Arc::new(tslens_surface::RecordingSurface::new());
    let loader = DependencyTypeLoader::new(Arc::new(host), surface.clone(), "/proj");
    (loader, surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tslens_host::MemoryHost;

    #[test]
    fn test_scoped_types_fallback() {
        assert_eq!(
            scoped_types_fallback("@tanstack/react-query").as_deref(),
            Some("@types/react-query")
        );
        assert_eq!(scoped_types_fallback("lodash"), None);
        assert_eq!(scoped_types_fallback("@types/node"), None);
    }

    #[test]
    fn test_collect_exports_types() {
        let exports: Value = serde_json::from_str(
            r#"{
                ".": {"types": "./index.d.ts", "import": "./index.mjs"},
                "./utils": {"import": {"types": "./utils/index.d.mts"}, "require": "./utils/index.js"}
            }"#,
        )
        .unwrap();
        let mut out = Vec::new();
        collect_exports_types(&exports, &mut out);
        assert_eq!(out, vec!["./index.d.ts", "./utils/index.d.mts"]);
    }

    #[tokio::test]
    async fn test_types_field_registered_under_package_namespace() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/zustand/package.json",
                r#"{"name": "zustand", "types": "./dist/zustand.d.ts"}"#,
            )
            .with_file("/proj/node_modules/zustand/dist/zustand.d.ts", "declare const s: 1;");
        let (loader, surface) = test_loader(host);
        let registered = loader.load_one("zustand").await;
        assert!(registered >= 1);
        assert_eq!(
            surface
                .ambient_content("node_modules/zustand/dist/zustand.d.ts")
                .as_deref(),
            Some("declare const s: 1;")
        );
    }

    #[tokio::test]
    async fn test_exports_map_types_are_found() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/modern/package.json",
                r#"{"name": "modern", "main": "./run.js", "exports": {".": {"types": "./dist/public.d.ts"}}}"#,
            )
            .with_file("/proj/node_modules/modern/dist/public.d.ts", "");
        let (loader, surface) = test_loader(host);
        loader.load_one("modern").await;
        assert!(surface
            .ambient_paths()
            .contains(&"node_modules/modern/dist/public.d.ts".to_string()));
    }

    #[tokio::test]
    async fn test_untyped_package_registers_nothing() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/left-pad/package.json",
                r#"{"name": "left-pad", "main": "index.js"}"#,
            )
            .with_file("/proj/node_modules/left-pad/index.js", "module.exports = {}");
        let (loader, surface) = test_loader(host);
        assert_eq!(loader.load_one("left-pad").await, 0);
        assert_eq!(surface.ambient_count(), 0);
    }

    #[tokio::test]
    async fn test_types_package_fallback() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/left-pad/package.json",
                r#"{"name": "left-pad", "main": "index.js"}"#,
            )
            .with_file(
                "/proj/node_modules/@types/left-pad/index.d.ts",
                "declare function leftPad(s: string, n: number): string;",
            );
        let (loader, surface) = test_loader(host);
        assert!(loader.load_one("left-pad").await >= 1);
        assert!(surface
            .ambient_paths()
            .contains(&"node_modules/@types/left-pad/index.d.ts".to_string()));
    }

    #[tokio::test]
    async fn test_scoped_mangled_types_fallback() {
        let host = MemoryHost::new().with_file(
            "/proj/node_modules/@types/foo__bar/index.d.ts",
            "declare module '@foo/bar';",
        );
        let (loader, surface) = test_loader(host);
        assert!(loader.load_one("@foo/bar").await >= 1);
        assert!(surface
            .ambient_paths()
            .contains(&"node_modules/@types/foo__bar/index.d.ts".to_string()));
    }

    #[tokio::test]
    async fn test_loading_is_idempotent() {
        let host = MemoryHost::new().with_file("/proj/node_modules/dep/index.d.ts", "declare const d: 1;");
        let (loader, surface) = test_loader(host);
        assert_eq!(loader.load_one("dep").await, 1);
        assert_eq!(loader.load_one("dep").await, 0);
        assert_eq!(surface.ambient_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_allows_reregistration() {
        let host = MemoryHost::new().with_file("/proj/node_modules/dep/index.d.ts", "");
        let (loader, surface) = test_loader(host);
        assert_eq!(loader.load_one("dep").await, 1);
        surface.clear_ambient_declarations();
        loader.reset();
        assert_eq!(loader.load_one("dep").await, 1);
        assert_eq!(surface.ambient_count(), 1);
    }

    #[tokio::test]
    async fn test_load_all_merges_categories_and_isolates_failures() {
        let host = MemoryHost::new();
        host.insert(
            "/proj/package.json",
            r#"{
                "dependencies": {"a": "1", "broken": "1"},
                "devDependencies": {"b": "1"},
                "peerDependencies": {"c": "1"}
            }"#,
        );
        for name in ["a", "b", "c"] {
            host.insert(
                &format!("/proj/node_modules/{}/index.d.ts", name),
                "declare const x: 1;",
            );
        }
        // A malformed manifest must not take down the batch.
        host.insert("/proj/node_modules/broken/package.json", "{ not json");
        let (loader, surface) = test_loader(host);
        let summary = loader.load_all().await;
        assert_eq!(summary.dependencies, 4);
        assert_eq!(summary.registered, 3);
        assert_eq!(surface.ambient_count(), 3);
    }

    #[tokio::test]
    async fn test_load_all_without_manifest_is_noop() {
        let (loader, surface) = test_loader(MemoryHost::new());
        let summary = loader.load_all().await;
        assert_eq!(summary.dependencies, 0);
        assert_eq!(surface.ambient_count(), 0);
    }
}

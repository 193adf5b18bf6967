//! tslens_registry: Versioned file registry synchronized with the
//! analysis surface.
//!
//! The registry is the single source of truth for what the language
//! analyzer currently sees: a map from absolute path to
//! `{content, version}` kept in lockstep with the surface's live text
//! models. Its central invariant is edit provenance: an edit pushed by
//! the editing surface itself must never be written back into the
//! surface's model, or the two sides feed each other forever.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};
use tslens_host::ProjectHost;
use tslens_paths::{is_declaration_path, normalize_path, project_relative, Extension};
use tslens_surface::{AnalysisSurface, ScriptFamily};

/// One tracked file. The version increments on every content mutation,
/// so consumers may cache derived state keyed by `(path, version)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFile {
    pub content: String,
    pub version: u64,
}

/// Where an edit came from. `Surface` means the tracked editing surface
/// caused the change itself; `External` means the registry is being told
/// about a change it did not witness (watcher, tooling, another editor).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    Surface,
    External,
}

/// Versioned path → content map, bidirectionally synchronized with an
/// [`AnalysisSurface`].
pub struct FileRegistry {
    host: Arc<dyn ProjectHost>,
    surface: Arc<dyn AnalysisSurface>,
    root: String,
    files: DashMap<String, RegisteredFile>,
}

fn family_for(path: &str) -> ScriptFamily {
    match Extension::from_path(path) {
        Some(ext) if ext.is_javascript_family() => ScriptFamily::JavaScript,
        _ => ScriptFamily::TypeScript,
    }
}

impl FileRegistry {
    pub fn new(
        host: Arc<dyn ProjectHost>,
        surface: Arc<dyn AnalysisSurface>,
        project_root: &str,
    ) -> Self {
        FileRegistry {
            host,
            surface,
            root: normalize_path(project_root),
            files: DashMap::new(),
        }
    }

    pub fn project_root(&self) -> &str {
        &self.root
    }

    /// Read `path` through the host and register it. An existing live
    /// model keeps its identity and gets new content; a missing one is
    /// created with a family inferred from the extension. Declaration
    /// files are additionally registered as ambient declarations under
    /// their project-relative path. Unreadable files are logged and
    /// skipped; a failed load never mutates registry state.
    ///
    /// Returns true when the file was loaded.
    pub async fn load(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let content = match self.host.open_file(&path).await {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %path, error = %err, "could not load file");
                return false;
            }
        };
        if self.surface.has_model(&path) {
            self.surface.set_model_content(&path, &content);
        } else {
            self.surface.create_model(&path, family_for(&path), &content);
        }
        let version = self.bump(&path, &content);
        if is_declaration_path(&path) {
            let virtual_path = project_relative(&self.root, &path);
            self.surface.add_ambient_declaration(&virtual_path, &content);
        }
        trace!(file = %path, version, "loaded file");
        true
    }

    /// Load `path` only when the registry has no entry for it yet. Used
    /// by on-demand resolution so a resolved-but-untracked file becomes
    /// visible to the analyzer.
    pub async fn load_if_absent(&self, path: &str) -> bool {
        if self.contains(path) {
            return false;
        }
        self.load(path).await
    }

    /// Record an edit. The cache and version always update; what happens
    /// to the live model depends on provenance:
    ///
    /// - [`EditOrigin::External`]: a model is created if none exists, but
    ///   an existing model is left untouched so in-progress edits are
    ///   not clobbered.
    /// - [`EditOrigin::Surface`]: the model already reflects the edit;
    ///   writing it back would loop, so no model call is made at all.
    pub fn apply_edit(&self, path: &str, content: &str, origin: EditOrigin) {
        let path = normalize_path(path);
        if origin == EditOrigin::External && !self.surface.has_model(&path) {
            self.surface.create_model(&path, family_for(&path), content);
        }
        let version = self.bump(&path, content);
        trace!(file = %path, version, ?origin, "applied edit");
    }

    /// Dispose the live model if present and evict the entry.
    pub fn remove(&self, path: &str) {
        let path = normalize_path(path);
        if self.surface.has_model(&path) {
            self.surface.dispose_model(&path);
        }
        if self.files.remove(&path).is_some() {
            debug!(file = %path, "removed file");
        }
    }

    /// Dispose every tracked model and drop all entries.
    pub fn clear(&self) {
        let paths: Vec<String> = self.files.iter().map(|entry| entry.key().clone()).collect();
        for path in &paths {
            if self.surface.has_model(path) {
                self.surface.dispose_model(path);
            }
        }
        self.files.clear();
        debug!(count = paths.len(), "cleared file registry");
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn version_of(&self, path: &str) -> Option<u64> {
        self.files.get(&normalize_path(path)).map(|f| f.version)
    }

    pub fn content_of(&self, path: &str) -> Option<String> {
        self.files
            .get(&normalize_path(path))
            .map(|f| f.content.clone())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn tracked_paths(&self) -> Vec<String> {
        self.files.iter().map(|entry| entry.key().clone()).collect()
    }

    fn bump(&self, path: &str, content: &str) -> u64 {
        let mut entry = self
            .files
            .entry(path.to_string())
            .or_insert_with(|| RegisteredFile {
                content: String::new(),
                version: 0,
            });
        entry.version += 1;
        entry.content = content.to_string();
        entry.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tslens_host::MemoryHost;
    use tslens_surface::{RecordingSurface, SurfaceEvent};

    fn registry_over(host: MemoryHost) -> (FileRegistry, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::new());
        let registry = FileRegistry::new(Arc::new(host), surface.clone(), "/proj");
        (registry, surface)
    }

    #[tokio::test]
    async fn test_load_creates_model_and_version() {
        let host = MemoryHost::new().with_file("/proj/src/a.ts", "export const a = 1;");
        let (registry, surface) = registry_over(host);
        assert!(registry.load("/proj/src/a.ts").await);
        assert_eq!(registry.version_of("/proj/src/a.ts"), Some(1));
        assert_eq!(
            registry.content_of("/proj/src/a.ts").as_deref(),
            Some("export const a = 1;")
        );
        assert_eq!(
            surface.model_family("/proj/src/a.ts"),
            Some(ScriptFamily::TypeScript)
        );
    }

    #[tokio::test]
    async fn test_reload_keeps_model_identity() {
        let host = MemoryHost::new().with_file("/proj/a.ts", "v1");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/a.ts").await;
        registry.load("/proj/a.ts").await;
        assert_eq!(registry.version_of("/proj/a.ts"), Some(2));
        // One creation, then a content replacement on the same model.
        assert_eq!(
            surface.events_for("/proj/a.ts"),
            vec![
                SurfaceEvent::ModelCreated { path: "/proj/a.ts".into() },
                SurfaceEvent::ModelContentSet { path: "/proj/a.ts".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_family_buckets_by_extension() {
        let host = MemoryHost::new()
            .with_file("/proj/a.tsx", "")
            .with_file("/proj/b.jsx", "");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/a.tsx").await;
        registry.load("/proj/b.jsx").await;
        assert_eq!(surface.model_family("/proj/a.tsx"), Some(ScriptFamily::TypeScript));
        assert_eq!(surface.model_family("/proj/b.jsx"), Some(ScriptFamily::JavaScript));
    }

    #[tokio::test]
    async fn test_unreadable_load_mutates_nothing() {
        let (registry, surface) = registry_over(MemoryHost::new());
        assert!(!registry.load("/proj/missing.ts").await);
        assert!(!registry.contains("/proj/missing.ts"));
        assert!(surface.events().is_empty());
    }

    #[tokio::test]
    async fn test_declaration_load_registers_ambient() {
        let host = MemoryHost::new().with_file("/proj/types/global.d.ts", "declare const g: 1;");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/types/global.d.ts").await;
        assert_eq!(surface.ambient_paths(), vec!["types/global.d.ts"]);
    }

    #[tokio::test]
    async fn test_version_reflects_every_mutation() {
        let (registry, _surface) = registry_over(MemoryHost::new());
        for i in 1..=5 {
            registry.apply_edit("/proj/a.ts", &format!("v{}", i), EditOrigin::External);
        }
        assert_eq!(registry.version_of("/proj/a.ts"), Some(5));
        assert_eq!(registry.content_of("/proj/a.ts").as_deref(), Some("v5"));
    }

    #[tokio::test]
    async fn test_surface_edit_never_touches_model() {
        let host = MemoryHost::new().with_file("/proj/a.ts", "v1");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/a.ts").await;
        let before = surface.events_for("/proj/a.ts").len();
        registry.apply_edit("/proj/a.ts", "v2", EditOrigin::Surface);
        assert_eq!(surface.events_for("/proj/a.ts").len(), before);
        assert_eq!(registry.version_of("/proj/a.ts"), Some(2));
        assert_eq!(registry.content_of("/proj/a.ts").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_external_edit_creates_but_never_overwrites() {
        let (registry, surface) = registry_over(MemoryHost::new());
        registry.apply_edit("/proj/a.ts", "v1", EditOrigin::External);
        assert_eq!(
            surface.events_for("/proj/a.ts"),
            vec![SurfaceEvent::ModelCreated { path: "/proj/a.ts".into() }]
        );
        // The model exists now; a second external edit must leave it be.
        registry.apply_edit("/proj/a.ts", "v2", EditOrigin::External);
        assert_eq!(surface.events_for("/proj/a.ts").len(), 1);
        assert_eq!(surface.model_content("/proj/a.ts").as_deref(), Some("v1"));
        assert_eq!(registry.content_of("/proj/a.ts").as_deref(), Some("v2"));
        assert_eq!(registry.version_of("/proj/a.ts"), Some(2));
    }

    #[tokio::test]
    async fn test_remove_disposes_and_evicts() {
        let host = MemoryHost::new().with_file("/proj/a.ts", "x");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/a.ts").await;
        registry.remove("/proj/a.ts");
        assert!(!registry.contains("/proj/a.ts"));
        assert_eq!(surface.model_count(), 0);
        // Removing again is harmless.
        registry.remove("/proj/a.ts");
    }

    #[tokio::test]
    async fn test_clear_disposes_everything() {
        let host = MemoryHost::new()
            .with_file("/proj/a.ts", "")
            .with_file("/proj/b.ts", "");
        let (registry, surface) = registry_over(host);
        registry.load("/proj/a.ts").await;
        registry.load("/proj/b.ts").await;
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(surface.model_count(), 0);
    }

    #[tokio::test]
    async fn test_load_if_absent_skips_tracked_files() {
        let host = MemoryHost::new()
            .with_file("/proj/a.ts", "disk")
            .with_file("/proj/b.ts", "fresh");
        let (registry, _surface) = registry_over(host);
        registry.apply_edit("/proj/a.ts", "edited", EditOrigin::External);
        assert!(!registry.load_if_absent("/proj/a.ts").await);
        assert_eq!(registry.content_of("/proj/a.ts").as_deref(), Some("edited"));
        assert!(registry.load_if_absent("/proj/b.ts").await);
        assert_eq!(registry.content_of("/proj/b.ts").as_deref(), Some("fresh"));
    }
}

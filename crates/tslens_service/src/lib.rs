//! tslens_service: Project lifecycle facade wiring configuration, file
//! loading, import resolution, and dependency types behind one entry point.

mod detect;

pub use detect::ProjectTraits;

use std::sync::{Arc, RwLock};
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

use tslens_config::{ConfigLoader, ProjectConfig};
use tslens_deps::DependencyTypeLoader;
use tslens_host::{ProjectHost, SearchOptions};
use tslens_loader::{load_all, FileIndex, DEFAULT_EXCLUDES};
use tslens_paths::{join_paths, normalize_path};
use tslens_registry::{EditOrigin, FileRegistry};
use tslens_resolver::{ImportResolver, ResolutionTrace};
use tslens_surface::{apply_compiler_options, AnalysisSurface};

/// Everything one initialization (or refresh) pass did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub root: String,
    pub config_found: bool,
    pub files_discovered: usize,
    pub files_loaded: usize,
    pub stdlib_files: usize,
    pub dependency_declarations: usize,
    pub own_declarations: usize,
    pub elapsed_ms: u64,
    /// True when `initialize` found the same project already active;
    /// every count above is zero in that case.
    pub already_initialized: bool,
}

struct ProjectState {
    root: String,
    config: Option<ProjectConfig>,
    registry: Arc<FileRegistry>,
    resolver: Arc<ImportResolver>,
    deps: Arc<DependencyTypeLoader>,
    index: FileIndex,
    traits: ProjectTraits,
}

/// Facade over the whole intellisense pipeline. One instance serves one
/// project at a time; pointing it at a different root tears the active
/// project down first. Construction is plain dependency injection, the
/// embedding shell owns the instance.
pub struct ProjectService {
    host: Arc<dyn ProjectHost>,
    surface: Arc<dyn AnalysisSurface>,
    state: RwLock<Option<ProjectState>>,
    // Serializes initialize/refresh/clear so two passes never interleave.
    lifecycle: tokio::sync::Mutex<()>,
}

impl ProjectService {
    pub fn new(host: Arc<dyn ProjectHost>, surface: Arc<dyn AnalysisSurface>) -> Self {
        ProjectService {
            host,
            surface,
            state: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Point the service at a project root and run the full load
    /// sequence. Idempotent for the already-active root.
    pub async fn initialize(&self, project_path: &str) -> InitReport {
        let _guard = self.lifecycle.lock().await;
        let root = normalize_path(project_path);

        if let Some(active) = self.with_state(|s| (s.root.clone(), s.config.is_some())) {
            let (active_root, config_found) = active;
            if active_root == root {
                debug!(root = %root, "project already initialized");
                return InitReport {
                    root,
                    config_found,
                    already_initialized: true,
                    ..InitReport::default()
                };
            }
            self.teardown();
        }

        let registry = Arc::new(FileRegistry::new(
            self.host.clone(),
            self.surface.clone(),
            &root,
        ));
        let deps = Arc::new(DependencyTypeLoader::new(
            self.host.clone(),
            self.surface.clone(),
            &root,
        ));
        self.run_sequence(root, registry, deps).await
    }

    /// Re-run the whole load sequence against the active project,
    /// keeping the registry so tracked files keep their version history.
    /// Ambient declarations are cleared first so none go stale.
    pub async fn refresh(&self) -> Option<InitReport> {
        let _guard = self.lifecycle.lock().await;
        let (root, registry, deps) =
            self.with_state(|s| (s.root.clone(), s.registry.clone(), s.deps.clone()))?;
        info!(root = %root, "refreshing project");
        self.surface.clear_ambient_declarations();
        deps.reset();
        Some(self.run_sequence(root, registry, deps).await)
    }

    /// Drop the active project and all registry/version state.
    pub async fn clear(&self) {
        let _guard = self.lifecycle.lock().await;
        self.teardown();
    }

    /// Record an edit that did not come from the editing surface. The
    /// model is created when absent. No-op while uninitialized.
    pub fn update_file(&self, path: &str, content: &str) {
        if let Some(registry) = self.registry() {
            registry.apply_edit(path, content, EditOrigin::External);
        }
    }

    /// Record an editor-origin edit; the live model already holds the
    /// text, only the registry cache and version move.
    pub fn update_file_from_editor(&self, path: &str, content: &str) {
        if let Some(registry) = self.registry() {
            registry.apply_edit(path, content, EditOrigin::Surface);
        }
    }

    /// Forget a file and dispose its model. No-op while uninitialized.
    pub fn remove_file(&self, path: &str) {
        if let Some(registry) = self.registry() {
            registry.remove(path);
        }
    }

    /// Resolve an import specifier and pull the target into the
    /// registry when it is not already tracked.
    pub async fn load_on_demand(&self, specifier: &str, from_file: &str) -> Option<String> {
        let resolver = self.with_state(|s| s.resolver.clone())?;
        resolver.resolve_and_load(specifier, from_file).await
    }

    /// Trace every strategy and probe for one specifier. Diagnostic
    /// surface only; returns `None` while uninitialized.
    pub async fn explain_resolution(
        &self,
        specifier: &str,
        from_file: &str,
    ) -> Option<ResolutionTrace> {
        let resolver = self.with_state(|s| s.resolver.clone())?;
        Some(resolver.explain(specifier, from_file).await)
    }

    pub fn is_initialized(&self) -> bool {
        self.with_state(|_| ()).is_some()
    }

    pub fn project_root(&self) -> Option<String> {
        self.with_state(|s| s.root.clone())
    }

    pub fn config(&self) -> Option<ProjectConfig> {
        self.with_state(|s| s.config.clone()).flatten()
    }

    pub fn traits(&self) -> Option<ProjectTraits> {
        self.with_state(|s| s.traits.clone())
    }

    /// Look a tracked file up by bare name, stem, or directory name.
    pub fn lookup_short(&self, short: &str) -> Option<String> {
        self.with_state(|s| s.index.lookup(short).map(str::to_string))
            .flatten()
    }

    pub fn file_version(&self, path: &str) -> Option<u64> {
        self.with_state(|s| s.registry.version_of(path)).flatten()
    }

    pub fn file_content(&self, path: &str) -> Option<String> {
        self.with_state(|s| s.registry.content_of(path)).flatten()
    }

    pub fn tracked_file_count(&self) -> usize {
        self.with_state(|s| s.registry.len()).unwrap_or(0)
    }

    /// The load sequence proper. Order is fixed: configuration, compiler
    /// options, bulk sources, standard library, dependency types, own
    /// declaration files. Every step degrades instead of aborting, so a
    /// project with no configuration or no manifest still comes up.
    async fn run_sequence(
        &self,
        root: String,
        registry: Arc<FileRegistry>,
        deps: Arc<DependencyTypeLoader>,
    ) -> InitReport {
        let started = Instant::now();
        info!(root = %root, "initializing project");

        let loader = ConfigLoader::new(self.host.clone());
        let config = loader.load(&root).await;
        if let Some(config) = config.as_ref() {
            apply_compiler_options(config, &root, self.surface.as_ref());
        }
        let resolver = Arc::new(ImportResolver::new(
            self.host.clone(),
            registry.clone(),
            config.as_ref(),
        ));

        let summary = load_all(self.host.as_ref(), &registry, config.as_ref()).await;
        let stdlib_files = deps.load_stdlib(config.as_ref()).await;
        let dep_summary = deps.load_all().await;
        let own_declarations = self.load_own_declarations(&root, &registry).await;

        let manifest = loader
            .load_manifest(&join_paths(&root, "package.json"))
            .await;
        let traits = detect::detect_traits(config.as_ref(), manifest.as_ref());

        let report = InitReport {
            root: root.clone(),
            config_found: config.is_some(),
            files_discovered: summary.total_discovered,
            files_loaded: summary.loaded,
            stdlib_files,
            dependency_declarations: dep_summary.registered,
            own_declarations,
            elapsed_ms: started.elapsed().as_millis() as u64,
            already_initialized: false,
        };
        info!(
            root = %root,
            files = report.files_loaded,
            dependencies = dep_summary.dependencies,
            declarations = report.dependency_declarations,
            elapsed_ms = report.elapsed_ms,
            "project initialized"
        );

        let state = ProjectState {
            root,
            config,
            registry,
            resolver,
            deps,
            index: summary.index,
            traits,
        };
        let mut guard = self.state.write().unwrap_or_else(|err| err.into_inner());
        *guard = Some(state);
        report
    }

    /// Load every project-owned `.d.ts` so its globals register even
    /// when the bulk pass capped it out. Already-tracked files reload,
    /// which re-registers their ambient entries after a refresh.
    async fn load_own_declarations(&self, root: &str, registry: &FileRegistry) -> usize {
        let options = SearchOptions {
            include: Vec::new(),
            exclude: DEFAULT_EXCLUDES.iter().map(|e| e.to_string()).collect(),
        };
        let found = match self.host.search_files("**/*.d.ts", root, &options).await {
            Ok(found) => found,
            Err(err) => {
                debug!(root = %root, error = %err, "declaration search failed");
                return 0;
            }
        };
        let loads = join_all(found.iter().map(|path| registry.load(path))).await;
        loads.into_iter().filter(|loaded| *loaded).count()
    }

    fn with_state<T>(&self, f: impl FnOnce(&ProjectState) -> T) -> Option<T> {
        let guard = self.state.read().unwrap_or_else(|err| err.into_inner());
        guard.as_ref().map(f)
    }

    fn registry(&self) -> Option<Arc<FileRegistry>> {
        self.with_state(|s| s.registry.clone())
    }

    fn teardown(&self) {
        let previous = {
            let mut guard = self.state.write().unwrap_or_else(|err| err.into_inner());
            guard.take()
        };
        if let Some(state) = previous {
            state.registry.clear();
            self.surface.clear_ambient_declarations();
            info!(root = %state.root, "project cleared");
        }
    }
}

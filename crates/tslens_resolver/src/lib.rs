//! tslens_resolver: Multi-strategy import resolution.
//!
//! Given an import specifier and the file importing it, find the
//! concrete file the specifier means. Three strategies run in fixed
//! order: relative paths, tsconfig path aliases, then node_modules
//! package resolution. A miss is not an error; the embedding language
//! service falls back to its own resolution. A hit can lazily pull the
//! resolved file into the registry, which is how opening one file grows
//! the visible import graph over time.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};
use tslens_config::{parse_manifest, ProjectConfig};
use tslens_host::ProjectHost;
use tslens_paths::{
    declaration_sibling, directory_of, is_relative_specifier, join_paths, split_package_specifier,
    PROBE_EXTENSIONS,
};
use tslens_registry::FileRegistry;

/// The probe list for one candidate base path, in probe order: the bare
/// path, the four source extensions, then `index.*` underneath it.
pub fn plan_candidates(base: &str) -> Vec<String> {
    let mut plan = Vec::with_capacity(1 + 2 * PROBE_EXTENSIONS.len());
    plan.push(base.to_string());
    for ext in PROBE_EXTENSIONS {
        plan.push(format!("{}{}", base, ext.as_str()));
    }
    for ext in PROBE_EXTENSIONS {
        plan.push(format!("{}/index{}", base, ext.as_str()));
    }
    plan
}

/// One tsconfig `paths` rule: a pattern with at most one `*` and its
/// ordered target templates.
#[derive(Debug, Clone)]
pub struct AliasRule {
    pub pattern: String,
    pub targets: Vec<String>,
}

impl AliasRule {
    /// Match a specifier against the pattern. Exact patterns yield an
    /// empty capture; wildcard patterns yield the span the `*` covered.
    pub fn capture<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        match self.pattern.split_once('*') {
            None => (self.pattern == specifier).then_some(""),
            Some((prefix, suffix)) => specifier
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix)),
        }
    }

    /// The target templates with the capture substituted for the first
    /// `*` of each.
    pub fn expand(&self, capture: &str) -> Vec<String> {
        self.targets
            .iter()
            .map(|target| target.replacen('*', capture, 1))
            .collect()
    }
}

/// Which strategy an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Relative,
    Alias,
    Package,
}

/// One probed candidate and whether it existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Probe {
    pub candidate: String,
    pub exists: bool,
}

/// One strategy's worth of probing for a trace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub note: Option<String>,
    pub probes: Vec<Probe>,
    pub matched: Option<String>,
}

/// Full account of one resolution, for interactive diagnosis. Not used
/// on the production path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionTrace {
    pub specifier: String,
    pub from_file: String,
    pub attempts: Vec<StrategyAttempt>,
    pub resolved: Option<String>,
}

/// Resolves import specifiers to absolute paths through a
/// [`ProjectHost`]. Candidates are checked by existence probe; the only
/// content read is a package manifest's declaration entry.
pub struct ImportResolver {
    host: Arc<dyn ProjectHost>,
    registry: Arc<FileRegistry>,
    root: String,
    base_url: String,
    rules: Vec<AliasRule>,
}

impl ImportResolver {
    /// Build a resolver for the registry's project. Alias rules and
    /// `baseUrl` come from the configuration when present; without one
    /// the base URL is the project root and no alias rules exist.
    pub fn new(
        host: Arc<dyn ProjectHost>,
        registry: Arc<FileRegistry>,
        config: Option<&ProjectConfig>,
    ) -> Self {
        let root = registry.project_root().to_string();
        let base_url = config
            .and_then(|c| c.compiler_options.base_url.as_deref())
            .map(|base| join_paths(&root, base))
            .unwrap_or_else(|| root.clone());
        let rules = config
            .and_then(|c| c.compiler_options.paths.as_ref())
            .map(|paths| {
                paths
                    .iter()
                    .map(|(pattern, targets)| AliasRule {
                        pattern: pattern.clone(),
                        targets: targets.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        ImportResolver {
            host,
            registry,
            root,
            base_url,
            rules,
        }
    }

    pub fn alias_rules(&self) -> &[AliasRule] {
        &self.rules
    }

    /// Resolve a specifier to an absolute path, or `None` when no
    /// strategy finds an existing file.
    pub async fn resolve(&self, specifier: &str, from_file: &str) -> Option<String> {
        let (resolved, _) = self.run(specifier, from_file, false).await;
        if let Some(path) = &resolved {
            trace!(specifier, resolved = %path, "resolved import");
        }
        resolved
    }

    /// Resolve and, on a hit, pull the file into the registry if it is
    /// not already tracked.
    pub async fn resolve_and_load(&self, specifier: &str, from_file: &str) -> Option<String> {
        let resolved = self.resolve(specifier, from_file).await?;
        if self.registry.load_if_absent(&resolved).await {
            debug!(specifier, file = %resolved, "lazily loaded resolved import");
        }
        Some(resolved)
    }

    /// Probe every strategy the specifier is eligible for and report
    /// each candidate's existence, regardless of early hits.
    pub async fn explain(&self, specifier: &str, from_file: &str) -> ResolutionTrace {
        let (resolved, attempts) = self.run(specifier, from_file, true).await;
        ResolutionTrace {
            specifier: specifier.to_string(),
            from_file: from_file.to_string(),
            attempts,
            resolved,
        }
    }

    async fn run(
        &self,
        specifier: &str,
        from_file: &str,
        collect: bool,
    ) -> (Option<String>, Vec<StrategyAttempt>) {
        let mut attempts = Vec::new();
        let mut resolved: Option<String> = None;

        if is_relative_specifier(specifier) {
            let base = join_paths(&directory_of(from_file), specifier);
            let (matched, probes) = self.probe_plan(&plan_candidates(&base), collect).await;
            resolved = matched.clone();
            if collect {
                attempts.push(StrategyAttempt {
                    strategy: Strategy::Relative,
                    note: Some(format!("joined to {}", base)),
                    probes,
                    matched,
                });
            }
            // Relative specifiers never fall through to other strategies.
            return (resolved, attempts);
        }

        let mut alias_matched_any = false;
        for rule in &self.rules {
            let Some(capture) = rule.capture(specifier) else {
                continue;
            };
            alias_matched_any = true;
            for target in rule.expand(capture) {
                let base = join_paths(&self.base_url, &target);
                let (matched, probes) = self.probe_plan(&plan_candidates(&base), collect).await;
                if resolved.is_none() {
                    resolved = matched.clone();
                }
                if collect {
                    attempts.push(StrategyAttempt {
                        strategy: Strategy::Alias,
                        note: Some(format!("rule {} -> {}", rule.pattern, target)),
                        probes,
                        matched,
                    });
                }
                if resolved.is_some() && !collect {
                    return (resolved, attempts);
                }
            }
        }
        if collect && !self.rules.is_empty() && !alias_matched_any {
            attempts.push(StrategyAttempt {
                strategy: Strategy::Alias,
                note: Some("no alias pattern matched".to_string()),
                probes: Vec::new(),
                matched: None,
            });
        }

        let (matched, attempt) = self.package_attempt(specifier, collect).await;
        if resolved.is_none() {
            resolved = matched;
        }
        if collect {
            attempts.push(attempt);
        }
        (resolved, attempts)
    }

    /// node_modules resolution: split the specifier into package and
    /// sub-path, read the package manifest for its declared declaration
    /// entry, and probe declaration-shaped candidates.
    async fn package_attempt(
        &self,
        specifier: &str,
        collect: bool,
    ) -> (Option<String>, StrategyAttempt) {
        let (package, subpath) = split_package_specifier(specifier);
        let package_dir = join_paths(&self.root, &format!("node_modules/{}", package));
        let manifest = match self
            .host
            .open_file(&join_paths(&package_dir, "package.json"))
            .await
        {
            Ok(text) => parse_manifest(&text),
            Err(_) => None,
        };
        let entry = match subpath {
            Some(sub) => sub.to_string(),
            None => manifest
                .as_ref()
                .and_then(|m| m.types_entry().map(str::to_string))
                .or_else(|| {
                    manifest
                        .as_ref()
                        .and_then(|m| m.main.as_deref().map(declaration_sibling))
                })
                .unwrap_or_else(|| "index.d.ts".to_string()),
        };
        let base = join_paths(&package_dir, &entry);
        let mut plan = vec![base.clone()];
        if !base.ends_with(".d.ts") {
            plan.push(format!("{}.d.ts", base));
        }
        plan.push(format!("{}/index.d.ts", base));
        let (matched, probes) = self.probe_plan(&plan, collect).await;
        let attempt = StrategyAttempt {
            strategy: Strategy::Package,
            note: Some(format!("package {} entry {}", package, entry)),
            probes,
            matched: matched.clone(),
        };
        (matched, attempt)
    }

    /// Probe candidates in order. In fast mode, stop at the first hit;
    /// in collect mode, probe everything and record each result.
    async fn probe_plan(&self, plan: &[String], collect: bool) -> (Option<String>, Vec<Probe>) {
        let mut probes = Vec::new();
        let mut matched = None;
        for candidate in plan {
            let exists = self.host.is_file(candidate).await;
            if collect {
                probes.push(Probe {
                    candidate: candidate.clone(),
                    exists,
                });
            }
            if exists && matched.is_none() {
                matched = Some(candidate.clone());
                if !collect {
                    break;
                }
            }
        }
        (matched, probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tslens_host::MemoryHost;
    use tslens_surface::RecordingSurface;

    fn resolver_over(host: MemoryHost, config: Option<&ProjectConfig>) -> ImportResolver {
        let host: Arc<dyn ProjectHost> = Arc::new(host);
        let registry = Arc::new(FileRegistry::new(
            host.clone(),
            Arc::new(RecordingSurface::new()),
            "/proj",
        ));
        ImportResolver::new(host, registry, config)
    }

    fn config_with_paths(base_url: &str, rules: &[(&str, &[&str])]) -> ProjectConfig {
        let mut paths = indexmap::IndexMap::new();
        for (pattern, targets) in rules {
            paths.insert(
                pattern.to_string(),
                targets.iter().map(|t| t.to_string()).collect(),
            );
        }
        ProjectConfig {
            compiler_options: tslens_config::CompilerOptionsRaw {
                base_url: Some(base_url.to_string()),
                paths: Some(paths),
                ..Default::default()
            },
            include: Vec::new(),
            exclude: Vec::new(),
            source_file: "/proj/tsconfig.json".to_string(),
        }
    }

    #[test]
    fn test_plan_candidates_order() {
        let plan = plan_candidates("/p/a");
        assert_eq!(plan[0], "/p/a");
        assert_eq!(plan[1], "/p/a.ts");
        assert_eq!(plan[4], "/p/a.jsx");
        assert_eq!(plan[5], "/p/a/index.ts");
        assert_eq!(plan.len(), 9);
    }

    #[test]
    fn test_alias_capture() {
        let rule = AliasRule {
            pattern: "@/*".to_string(),
            targets: vec!["./src/*".to_string()],
        };
        assert_eq!(rule.capture("@/components/Foo"), Some("components/Foo"));
        assert_eq!(rule.capture("lodash"), None);
        assert_eq!(rule.expand("utils/math"), vec!["./src/utils/math"]);

        let exact = AliasRule {
            pattern: "app-config".to_string(),
            targets: vec!["./config/index.ts".to_string()],
        };
        assert_eq!(exact.capture("app-config"), Some(""));
        assert_eq!(exact.capture("app-config/x"), None);
    }

    #[tokio::test]
    async fn test_relative_extension_beats_index() {
        let host = MemoryHost::new()
            .with_file("/proj/src/a.ts", "")
            .with_file("/proj/src/a/index.ts", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver.resolve("./a", "/proj/src/main.ts").await;
        assert_eq!(resolved.as_deref(), Some("/proj/src/a.ts"));
    }

    #[tokio::test]
    async fn test_relative_parent_traversal() {
        let host = MemoryHost::new().with_file("/proj/lib/helper.tsx", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver
            .resolve("../lib/helper", "/proj/src/pages/home.ts")
            .await;
        assert_eq!(resolved.as_deref(), Some("/proj/lib/helper.tsx"));
    }

    #[tokio::test]
    async fn test_relative_miss_does_not_fall_through() {
        let host = MemoryHost::new().with_file("/proj/node_modules/a/index.d.ts", "");
        let resolver = resolver_over(host, None);
        assert!(resolver.resolve("./a", "/proj/src/main.ts").await.is_none());
    }

    #[tokio::test]
    async fn test_alias_wildcard_lands_on_index_file() {
        let host = MemoryHost::new().with_file("/proj/src/components/Foo/index.tsx", "");
        let config = config_with_paths(".", &[("@/*", &["./src/*"])]);
        let resolver = resolver_over(host, Some(&config));
        let resolved = resolver
            .resolve("@/components/Foo", "/proj/src/main.tsx")
            .await;
        assert_eq!(
            resolved.as_deref(),
            Some("/proj/src/components/Foo/index.tsx")
        );
    }

    #[tokio::test]
    async fn test_alias_targets_probed_in_order() {
        let host = MemoryHost::new()
            .with_file("/proj/fallback/x.ts", "")
            .with_file("/proj/primary/x.ts", "");
        let config = config_with_paths(".", &[("#/*", &["./primary/*", "./fallback/*"])]);
        let resolver = resolver_over(host, Some(&config));
        let resolved = resolver.resolve("#/x", "/proj/main.ts").await;
        assert_eq!(resolved.as_deref(), Some("/proj/primary/x.ts"));
    }

    #[tokio::test]
    async fn test_alias_wins_over_package() {
        let host = MemoryHost::new()
            .with_file("/proj/src/shims/react.ts", "")
            .with_file("/proj/node_modules/react/index.d.ts", "");
        let config = config_with_paths(".", &[("react", &["./src/shims/react.ts"])]);
        let resolver = resolver_over(host, Some(&config));
        let resolved = resolver.resolve("react", "/proj/src/app.tsx").await;
        assert_eq!(resolved.as_deref(), Some("/proj/src/shims/react.ts"));
    }

    #[tokio::test]
    async fn test_package_types_field() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/zustand/package.json",
                r#"{"name": "zustand", "types": "./dist/zustand.d.ts", "main": "./dist/zustand.js"}"#,
            )
            .with_file("/proj/node_modules/zustand/dist/zustand.d.ts", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver.resolve("zustand", "/proj/src/store.ts").await;
        assert_eq!(
            resolved.as_deref(),
            Some("/proj/node_modules/zustand/dist/zustand.d.ts")
        );
    }

    #[tokio::test]
    async fn test_package_main_derived_declaration() {
        let host = MemoryHost::new()
            .with_file(
                "/proj/node_modules/dep/package.json",
                r#"{"name": "dep", "main": "./lib/entry.js"}"#,
            )
            .with_file("/proj/node_modules/dep/lib/entry.d.ts", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver.resolve("dep", "/proj/src/a.ts").await;
        assert_eq!(
            resolved.as_deref(),
            Some("/proj/node_modules/dep/lib/entry.d.ts")
        );
    }

    #[tokio::test]
    async fn test_package_without_manifest_defaults_to_index() {
        let host = MemoryHost::new().with_file("/proj/node_modules/bare/index.d.ts", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver.resolve("bare", "/proj/src/a.ts").await;
        assert_eq!(
            resolved.as_deref(),
            Some("/proj/node_modules/bare/index.d.ts")
        );
    }

    #[tokio::test]
    async fn test_scoped_package_subpath() {
        let host =
            MemoryHost::new().with_file("/proj/node_modules/@scope/pkg/testing/index.d.ts", "");
        let resolver = resolver_over(host, None);
        let resolved = resolver.resolve("@scope/pkg/testing", "/proj/src/a.ts").await;
        assert_eq!(
            resolved.as_deref(),
            Some("/proj/node_modules/@scope/pkg/testing/index.d.ts")
        );
    }

    #[tokio::test]
    async fn test_total_miss_is_none() {
        let resolver = resolver_over(MemoryHost::new(), None);
        assert!(resolver.resolve("ghost", "/proj/src/a.ts").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_and_load_tracks_file_once() {
        let host = MemoryHost::new().with_file("/proj/src/util.ts", "export {}");
        let host: Arc<dyn ProjectHost> = Arc::new(host);
        let registry = Arc::new(FileRegistry::new(
            host.clone(),
            Arc::new(RecordingSurface::new()),
            "/proj",
        ));
        let resolver = ImportResolver::new(host, registry.clone(), None);
        let resolved = resolver
            .resolve_and_load("./util", "/proj/src/main.ts")
            .await
            .unwrap();
        assert_eq!(registry.version_of(&resolved), Some(1));
        // A second resolution must not reload or bump.
        resolver
            .resolve_and_load("./util", "/proj/src/main.ts")
            .await
            .unwrap();
        assert_eq!(registry.version_of(&resolved), Some(1));
    }

    #[tokio::test]
    async fn test_explain_records_probes() {
        let host = MemoryHost::new().with_file("/proj/src/a.tsx", "");
        let resolver = resolver_over(host, None);
        let trace = resolver.explain("./a", "/proj/src/main.ts").await;
        assert_eq!(trace.resolved.as_deref(), Some("/proj/src/a.tsx"));
        assert_eq!(trace.attempts.len(), 1);
        let attempt = &trace.attempts[0];
        assert_eq!(attempt.strategy, Strategy::Relative);
        assert_eq!(attempt.probes.len(), 9);
        assert!(!attempt.probes[0].exists);
        assert!(attempt.probes[2].exists);
    }

    #[tokio::test]
    async fn test_explain_covers_alias_and_package() {
        let host = MemoryHost::new().with_file("/proj/node_modules/lodash/index.d.ts", "");
        let config = config_with_paths(".", &[("@/*", &["./src/*"])]);
        let resolver = resolver_over(host, Some(&config));
        let trace = resolver.explain("lodash", "/proj/src/a.ts").await;
        let strategies: Vec<Strategy> = trace.attempts.iter().map(|a| a.strategy).collect();
        assert_eq!(strategies, vec![Strategy::Alias, Strategy::Package]);
        assert_eq!(
            trace.resolved.as_deref(),
            Some("/proj/node_modules/lodash/index.d.ts")
        );
    }
}

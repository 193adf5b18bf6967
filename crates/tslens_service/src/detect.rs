//! Project-type heuristics read off the configuration and manifest.

use serde::Serialize;

use tslens_config::{PackageManifest, ProjectConfig};
use tslens_deps::FRAMEWORK_PROFILES;
use tslens_surface::JsxMode;

/// Coarse project traits. Consumers use these to tune completions and
/// diagnostics; nothing in the core branches on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTraits {
    /// The configuration enables JSX, or a JSX runtime is a dependency.
    pub uses_jsx: bool,
    /// `@types/node` is installed, so Node globals are expected.
    pub node_oriented: bool,
    /// First recognized framework found among the dependencies.
    pub framework: Option<String>,
}

const JSX_RUNTIME_PACKAGES: [&str; 3] = ["react", "preact", "solid-js"];

pub(crate) fn detect_traits(
    config: Option<&ProjectConfig>,
    manifest: Option<&PackageManifest>,
) -> ProjectTraits {
    let jsx_configured = config
        .map(|c| JsxMode::from_label(c.compiler_options.jsx.as_deref()).is_enabled())
        .unwrap_or(false);
    let dependencies = manifest
        .map(PackageManifest::all_dependencies)
        .unwrap_or_default();
    let uses_jsx = jsx_configured
        || JSX_RUNTIME_PACKAGES
            .iter()
            .any(|name| dependencies.contains_key(*name));
    let node_oriented = dependencies.contains_key("@types/node");
    let framework = FRAMEWORK_PROFILES
        .iter()
        .find(|profile| dependencies.contains_key(profile.package))
        .map(|profile| profile.package.to_string());
    ProjectTraits {
        uses_jsx,
        node_oriented,
        framework,
    }
}

//! Standard-library declarations from the project's own TypeScript
//! install.

use futures::future::join_all;
use indexmap::IndexSet;
use tracing::debug;
use tslens_config::ProjectConfig;
use tslens_paths::join_paths;
use tslens_surface::normalize_lib_entry;

use crate::DependencyTypeLoader;

/// The lib set implied by a `target` value when the configuration does
/// not list one. DOM globals always ride along.
fn default_libs_for(target: Option<&str>) -> Vec<String> {
    let lowered = target.map(str::to_ascii_lowercase);
    let base = match lowered.as_deref() {
        Some("es3") | Some("es5") => "es5",
        Some("es6") | Some("es2015") => "es2015",
        Some(t) if t.starts_with("es2") => t,
        _ => "esnext",
    };
    vec![base.to_string(), "dom".to_string()]
}

impl DependencyTypeLoader {
    /// Register `lib.<name>.d.ts` files out of
    /// `node_modules/typescript/lib` for the configured lib set, or a
    /// target-derived default set. A project without a TypeScript
    /// install simply registers nothing.
    pub async fn load_stdlib(&self, config: Option<&ProjectConfig>) -> usize {
        let names: IndexSet<String> = match config.and_then(|c| c.compiler_options.lib.as_ref()) {
            Some(libs) => libs.iter().map(|l| normalize_lib_entry(l)).collect(),
            None => default_libs_for(
                config.and_then(|c| c.compiler_options.target.as_deref()),
            )
            .into_iter()
            .collect(),
        };
        let lib_dir = join_paths(&self.root, "node_modules/typescript/lib");
        let reads = join_all(names.iter().map(|name| {
            let path = join_paths(&lib_dir, &format!("lib.{}.d.ts", name));
            async move { self.host.open_file(&path).await.ok() }
        }))
        .await;
        let mut registered = 0;
        for (name, content) in names.iter().zip(reads) {
            let Some(content) = content else { continue };
            if self.register("typescript", &format!("lib/lib.{}.d.ts", name), &content) {
                registered += 1;
            }
        }
        if registered == 0 {
            debug!("no standard library declarations found");
        } else {
            debug!(libs = registered, "registered standard library declarations");
        }
        registered
    }
}

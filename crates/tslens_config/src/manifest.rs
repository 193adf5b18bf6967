//! `package.json` manifest model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The slice of `package.json` the service cares about: entry points,
/// declaration pointers, and the four dependency categories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub types: Option<String>,
    pub typings: Option<String>,
    /// Conditional exports map, kept raw; only its `types` leaves are
    /// consulted, and shapes vary too much for a typed model.
    pub exports: Option<serde_json::Value>,
    pub dependencies: Option<IndexMap<String, String>>,
    pub dev_dependencies: Option<IndexMap<String, String>>,
    pub peer_dependencies: Option<IndexMap<String, String>>,
    pub optional_dependencies: Option<IndexMap<String, String>>,
}

impl PackageManifest {
    /// The declared declaration entry point: `types` wins over `typings`.
    pub fn types_entry(&self) -> Option<&str> {
        self.types.as_deref().or(self.typings.as_deref())
    }

    /// All dependency names with their version ranges, merged across
    /// runtime, dev, peer, and optional categories. First category
    /// mentioning a name wins; declaration order is preserved.
    pub fn all_dependencies(&self) -> IndexMap<String, String> {
        let mut merged = IndexMap::new();
        for category in [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
        ] {
            if let Some(entries) = category {
                for (name, range) in entries {
                    merged
                        .entry(name.clone())
                        .or_insert_with(|| range.clone());
                }
            }
        }
        merged
    }
}

/// Parse manifest text strictly. Unlike tsconfig parsing there is no
/// comment tolerance here; `package.json` is spec JSON.
pub fn parse_manifest(text: &str) -> Option<PackageManifest> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_entry_prefers_types() {
        let manifest = PackageManifest {
            types: Some("index.d.ts".to_string()),
            typings: Some("typings.d.ts".to_string()),
            ..Default::default()
        };
        assert_eq!(manifest.types_entry(), Some("index.d.ts"));
        let manifest = PackageManifest {
            typings: Some("typings.d.ts".to_string()),
            ..Default::default()
        };
        assert_eq!(manifest.types_entry(), Some("typings.d.ts"));
    }

    #[test]
    fn test_all_dependencies_merges_first_wins() {
        let manifest: PackageManifest = serde_json::from_str(
            r#"{
                "dependencies": {"react": "^18.0.0", "zustand": "^4.0.0"},
                "devDependencies": {"react": "^17.0.0", "vitest": "^1.0.0"},
                "peerDependencies": {"three": "*"},
                "optionalDependencies": {"fsevents": "^2.0.0"}
            }"#,
        )
        .unwrap();
        let all = manifest.all_dependencies();
        assert_eq!(all.get("react").map(String::as_str), Some("^18.0.0"));
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["react", "zustand", "vitest", "three", "fsevents"]);
    }

    #[test]
    fn test_parse_rejects_comments() {
        assert!(parse_manifest("{\"name\": \"x\"}").is_some());
        assert!(parse_manifest("{// c\n\"name\": \"x\"}").is_none());
    }
}

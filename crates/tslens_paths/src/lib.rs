//! tslens_paths: Path normalization and specifier handling.
//!
//! Every path that crosses a crate boundary in this workspace is a
//! forward-slash, `.`/`..`-free string. This crate owns that normal form,
//! plus the specifier-level helpers the resolver and dependency loader
//! share: extension classification, package-name splitting, `@types`
//! package naming, and declaration-path derivation.

/// File extensions the intellisense service tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Ts,
    Tsx,
    Js,
    Jsx,
    Dts,
    Json,
}

impl Extension {
    /// The string form of this extension, including the leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Ts => ".ts",
            Extension::Tsx => ".tsx",
            Extension::Js => ".js",
            Extension::Jsx => ".jsx",
            Extension::Dts => ".d.ts",
            Extension::Json => ".json",
        }
    }

    /// Classify a path by extension. `.d.ts` is checked before `.ts`.
    pub fn from_path(path: &str) -> Option<Extension> {
        let lower = path.to_lowercase();
        if lower.ends_with(".d.ts") {
            Some(Extension::Dts)
        } else if lower.ends_with(".ts") {
            Some(Extension::Ts)
        } else if lower.ends_with(".tsx") {
            Some(Extension::Tsx)
        } else if lower.ends_with(".js") {
            Some(Extension::Js)
        } else if lower.ends_with(".jsx") {
            Some(Extension::Jsx)
        } else if lower.ends_with(".json") {
            Some(Extension::Json)
        } else {
            None
        }
    }

    /// Whether this extension belongs to the TypeScript model family.
    pub fn is_typescript_family(&self) -> bool {
        matches!(self, Extension::Ts | Extension::Tsx | Extension::Dts)
    }

    /// Whether this extension belongs to the JavaScript model family.
    pub fn is_javascript_family(&self) -> bool {
        matches!(self, Extension::Js | Extension::Jsx)
    }
}

/// Extensions probed during import resolution, in probe order.
pub const PROBE_EXTENSIONS: [Extension; 4] = [
    Extension::Ts,
    Extension::Tsx,
    Extension::Js,
    Extension::Jsx,
];

/// Convert backslashes to forward slashes.
pub fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalize a path: forward slashes only, `.` segments dropped, `..`
/// segments folded into their parent where one exists.
pub fn normalize_path(path: &str) -> String {
    let path = normalize_slashes(path);
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(&s) if s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join a base directory and a relative path, normalizing the result.
/// An already-rooted `relative` wins outright.
pub fn join_paths(base: &str, relative: &str) -> String {
    if is_rooted(relative) {
        return normalize_path(relative);
    }
    if base.is_empty() {
        return normalize_path(relative);
    }
    normalize_path(&format!("{}/{}", base, relative))
}

/// Check whether a path is rooted (absolute).
pub fn is_rooted(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    if bytes[0] == b'/' {
        return true;
    }
    // Windows drive prefix (C:/ or C:\)
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// The directory portion of a path, without a trailing slash.
/// `"/a/b/c.ts"` -> `"/a/b"`; a bare file name yields `""`.
pub fn directory_of(path: &str) -> String {
    let normalized = normalize_slashes(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => String::new(),
    }
}

/// The final component of a path.
pub fn file_name(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// The file name with its extension removed. `.d.ts` is stripped whole.
pub fn file_stem(path: &str) -> String {
    let name = file_name(path);
    let lower = name.to_lowercase();
    if lower.ends_with(".d.ts") {
        return name[..name.len() - 5].to_string();
    }
    match name.rfind('.') {
        Some(0) | None => name.to_string(),
        Some(idx) => name[..idx].to_string(),
    }
}

/// Whether a path names a declaration file.
pub fn is_declaration_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".d.ts")
}

/// Derive the declaration file that would sit next to a JavaScript entry
/// point: `lib/index.js` -> `lib/index.d.ts`. Paths without a recognized
/// JavaScript extension get `.d.ts` appended.
pub fn declaration_sibling(path: &str) -> String {
    for ext in [".js", ".jsx", ".mjs", ".cjs"] {
        if let Some(stripped) = path.strip_suffix(ext) {
            return format!("{}.d.ts", stripped);
        }
    }
    if is_declaration_path(path) {
        return path.to_string();
    }
    format!("{}.d.ts", path)
}

/// Whether an import specifier is relative (`./x`, `../x`, `.`, `..`).
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Split a bare import specifier into package name and optional sub-path,
/// treating `@scope/name` as a single package name.
///
/// `"@scope/pkg/sub"` -> `("@scope/pkg", Some("sub"))`
/// `"lodash/fp"` -> `("lodash", Some("fp"))`
/// `"lodash"` -> `("lodash", None)`
pub fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        match specifier.find('/') {
            Some(first) => specifier[first + 1..]
                .find('/')
                .map(|second| first + 1 + second),
            None => None,
        }
    } else {
        specifier.find('/')
    };
    match name_end {
        Some(idx) => (&specifier[..idx], Some(&specifier[idx + 1..])),
        None => (specifier, None),
    }
}

/// The types-only package name for a dependency: `@scope/name` becomes
/// `@types/scope__name`, anything else becomes `@types/name`.
pub fn types_package_name(package: &str) -> String {
    match package.strip_prefix('@') {
        Some(scoped) => format!("@types/{}", scoped.replace('/', "__")),
        None => format!("@types/{}", package),
    }
}

/// The project-relative virtual identifier for an absolute path. Paths
/// outside the root are returned unchanged (minus any leading slash).
pub fn project_relative(root: &str, path: &str) -> String {
    let root = normalize_slashes(root);
    let path = normalize_slashes(path);
    let trimmed_root = root.trim_end_matches('/');
    if let Some(rest) = path.strip_prefix(trimmed_root) {
        if rest.is_empty() || rest.starts_with('/') {
            return rest.trim_start_matches('/').to_string();
        }
    }
    path.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_path() {
        assert_eq!(Extension::from_path("a.ts"), Some(Extension::Ts));
        assert_eq!(Extension::from_path("a.d.ts"), Some(Extension::Dts));
        assert_eq!(Extension::from_path("a.tsx"), Some(Extension::Tsx));
        assert_eq!(Extension::from_path("a.jsx"), Some(Extension::Jsx));
        assert_eq!(Extension::from_path("a.JSON"), Some(Extension::Json));
        assert_eq!(Extension::from_path("a.rs"), None);
    }

    #[test]
    fn test_family_buckets() {
        assert!(Extension::Dts.is_typescript_family());
        assert!(Extension::Tsx.is_typescript_family());
        assert!(Extension::Jsx.is_javascript_family());
        assert!(!Extension::Js.is_typescript_family());
    }

    #[test]
    fn test_normalize_path_folds_segments() {
        assert_eq!(normalize_path("/a/b/../c/./d.ts"), "/a/c/d.ts");
        assert_eq!(normalize_path("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_path("/a/b/.."), "/a");
        assert_eq!(normalize_path("../x"), "../x");
        assert_eq!(normalize_path("./"), ".");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/proj/src", "./util.ts"), "/proj/src/util.ts");
        assert_eq!(join_paths("/proj/src", "../lib/a.ts"), "/proj/lib/a.ts");
        assert_eq!(join_paths("/proj", "/other/b.ts"), "/other/b.ts");
        assert_eq!(join_paths("", "b.ts"), "b.ts");
    }

    #[test]
    fn test_directory_and_names() {
        assert_eq!(directory_of("/a/b/c.ts"), "/a/b");
        assert_eq!(directory_of("/c.ts"), "/");
        assert_eq!(directory_of("c.ts"), "");
        assert_eq!(file_name("/a/b/c.ts"), "c.ts");
        assert_eq!(file_stem("/a/b/index.d.ts"), "index");
        assert_eq!(file_stem("Foo.tsx"), "Foo");
        assert_eq!(file_stem(".env"), ".env");
    }

    #[test]
    fn test_declaration_sibling() {
        assert_eq!(declaration_sibling("dist/index.js"), "dist/index.d.ts");
        assert_eq!(declaration_sibling("dist/app.cjs"), "dist/app.d.ts");
        assert_eq!(declaration_sibling("dist/types.d.ts"), "dist/types.d.ts");
        assert_eq!(declaration_sibling("dist/entry"), "dist/entry.d.ts");
    }

    #[test]
    fn test_split_package_specifier() {
        assert_eq!(split_package_specifier("lodash"), ("lodash", None));
        assert_eq!(split_package_specifier("lodash/fp"), ("lodash", Some("fp")));
        assert_eq!(split_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            split_package_specifier("@angular/core/testing"),
            ("@angular/core", Some("testing"))
        );
    }

    #[test]
    fn test_types_package_name() {
        assert_eq!(types_package_name("left-pad"), "@types/left-pad");
        assert_eq!(types_package_name("@foo/bar"), "@types/foo__bar");
    }

    #[test]
    fn test_project_relative() {
        assert_eq!(project_relative("/proj", "/proj/src/a.ts"), "src/a.ts");
        assert_eq!(project_relative("/proj/", "/proj/a.ts"), "a.ts");
        assert_eq!(project_relative("/proj", "/elsewhere/a.ts"), "elsewhere/a.ts");
        // A sibling directory sharing the root's prefix is not inside it.
        assert_eq!(project_relative("/proj", "/project2/a.ts"), "project2/a.ts");
    }

    #[test]
    fn test_relative_specifier() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(!is_relative_specifier("lodash"));
        assert!(!is_relative_specifier("@scope/pkg"));
    }
}

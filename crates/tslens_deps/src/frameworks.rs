//! Profiles for frameworks that spread declarations across many
//! directories the generic scan would miss or under-prioritize.

/// How to treat one recognized framework: extra directories to scan
/// recursively, a wider per-pattern cap, and peer packages whose types
/// the framework implies.
#[derive(Debug, Clone, Copy)]
pub struct FrameworkProfile {
    pub package: &'static str,
    pub scan_dirs: &'static [&'static str],
    pub per_pattern_cap: usize,
    pub implied_types: &'static [&'static str],
}

pub const FRAMEWORK_PROFILES: [FrameworkProfile; 3] = [
    FrameworkProfile {
        package: "next",
        scan_dirs: &[
            "types",
            "dist/client",
            "dist/server",
            "dist/shared/lib",
            "dist/shared/lib/router",
            "dist/client/components",
        ],
        per_pattern_cap: 50,
        implied_types: &["react", "react-dom"],
    },
    FrameworkProfile {
        package: "nuxt",
        scan_dirs: &["types", "dist/app", "dist/pages"],
        per_pattern_cap: 50,
        implied_types: &["vue"],
    },
    FrameworkProfile {
        package: "react-native",
        scan_dirs: &["types", "Libraries"],
        per_pattern_cap: 50,
        implied_types: &["react"],
    },
];

/// The profile for a dependency name, if it is a recognized framework.
pub fn profile_for(name: &str) -> Option<&'static FrameworkProfile> {
    FRAMEWORK_PROFILES.iter().find(|p| p.package == name)
}

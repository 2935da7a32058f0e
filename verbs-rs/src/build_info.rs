//! Compile-time build information.
//!
//! `--version` falls back to [`version_short`] when the application did not
//! configure a version of its own.

#[cfg(feature = "build-info")]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Multi-line version report for diagnostics.
///
/// ```text
/// verbs 0.3.0 (x86_64-unknown-linux-gnu)
/// Built: Mon, 19 Oct 2026 09:12:44 +0000
/// Commit: a1b2c3d
/// Rustc: 1.82.0
/// ```
#[cfg(feature = "build-info")]
pub fn version_info() -> String {
    format!(
        "{} {} ({})\nBuilt: {}\nCommit: {}\nRustc: {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION,
        built_info::TARGET,
        built_info::BUILT_TIME_UTC,
        built_info::GIT_COMMIT_HASH_SHORT.unwrap_or("unknown"),
        built_info::RUSTC_VERSION
    )
}

#[cfg(feature = "build-info")]
pub fn version_short() -> &'static str {
    built_info::PKG_VERSION
}

#[cfg(feature = "build-info")]
pub fn package_name() -> &'static str {
    built_info::PKG_NAME
}

#[cfg(feature = "build-info")]
pub fn git_commit() -> Option<&'static str> {
    built_info::GIT_COMMIT_HASH_SHORT
}

#[cfg(not(feature = "build-info"))]
pub fn version_info() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

#[cfg(not(feature = "build-info"))]
pub fn version_short() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(not(feature = "build-info"))]
pub fn package_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

#[cfg(not(feature = "build-info"))]
pub fn git_commit() -> Option<&'static str> {
    None
}

/// The configured application version, or the engine's own.
pub fn resolve_version(configured: Option<&str>) -> &str {
    match configured {
        Some(v) if !v.trim().is_empty() => v,
        _ => version_short(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info_starts_with_package() {
        assert!(version_info().starts_with("verbs "));
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name(), "verbs");
    }

    #[test]
    fn test_resolve_version_prefers_configured() {
        assert_eq!(resolve_version(Some("2.1.0")), "2.1.0");
        assert_eq!(resolve_version(Some("  ")), version_short());
        assert_eq!(resolve_version(None), env!("CARGO_PKG_VERSION"));
    }
}

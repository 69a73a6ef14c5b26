//! Version resolution through the package manager's own tooling
//!
//! This module provides:
//! - The helper subprocess protocol and its command runner seam
//! - A `VersionResolver` trait with Bundler and CocoaPods implementations
//! - The native tool version gate

mod bundler;
mod cocoapods;
mod helper;

pub use bundler::BundlerResolver;
pub use cocoapods::CocoaPodsResolver;
pub use helper::{
    clamp_timeout, resolve_helper_path, resolve_timeout, CommandOutput, CommandRunner,
    HelperSubprocess, SystemCommandRunner, DEFAULT_TIMEOUT, HELPERS_PATH_ENV, HELPERS_TIMEOUT_ENV,
    MAX_TIMEOUT, MIN_TIMEOUT,
};

#[cfg(test)]
pub(crate) use helper::tests::FakeRunner;

use crate::domain::{Credential, Dependency, DependencyFile, PackageManager, PackageManagerTable};
use crate::error::{BlockingRequirement, ResolverError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::warn;

/// `rails (~> 5.0)` lines in a conflict report
static CONFLICT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?P<name>[A-Za-z0-9_.\-/]+) \((?P<requirement>[^)]+)\)").unwrap()
});

/// What the native resolver settled on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// `None` when a git dependency could not be resolved after unlocking
    #[serde(default)]
    pub version: Option<String>,
    /// Revision for git dependencies
    #[serde(default)]
    pub commit_sha: Option<String>,
}

/// Resolves dependencies and regenerates lockfiles with native tooling
#[async_trait]
pub trait VersionResolver: Send + Sync {
    fn package_manager(&self) -> PackageManager;

    /// Latest version the resolver accepts with the dependency unlocked.
    /// With `unlock_requirements` the manifest constraint is relaxed too.
    async fn resolve(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        unlock_requirements: bool,
    ) -> Result<Option<ResolvedVersion>, ResolverError>;

    /// New lockfile content after the given dependencies were updated
    async fn update_lockfile(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<String, ResolverError>;

    /// Version of the native tool the helper runs against
    async fn tool_version(&self) -> Result<Option<String>, ResolverError>;
}

/// Resolver construction options shared by every package manager
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub credentials: Vec<Credential>,
}

/// Create a resolver for the given package manager
pub fn create_resolver(
    package_manager: PackageManager,
    helper: HelperSubprocess,
    options: ResolverOptions,
) -> Box<dyn VersionResolver> {
    match package_manager {
        PackageManager::Bundler => Box::new(BundlerResolver::new(helper, options.credentials)),
        PackageManager::CocoaPods => Box::new(CocoaPodsResolver::new(helper)),
    }
}

/// Fails for unsupported tool versions when `fail_on_unsupported` is set;
/// deprecated versions only warn
pub fn check_tool_version(
    table: &PackageManagerTable,
    package_manager: PackageManager,
    version: &str,
    fail_on_unsupported: bool,
) -> Result<(), ResolverError> {
    let Some(policy) = table.tool_versions(package_manager) else {
        return Ok(());
    };
    let Some(parsed) = parse_tool_version(version) else {
        warn!(tool = package_manager.as_str(), version, "could not parse tool version");
        return Ok(());
    };

    if !policy.supported.matches(&parsed) {
        if fail_on_unsupported {
            return Err(ResolverError::ToolVersionNotSupported {
                tool: package_manager.as_str().to_string(),
                version: version.to_string(),
                supported: policy.supported.to_string(),
            });
        }
        warn!(tool = package_manager.as_str(), version, "tool version is not supported");
        return Ok(());
    }

    if policy.deprecated.as_ref().is_some_and(|d| d.matches(&parsed)) {
        warn!(
            tool = package_manager.as_str(),
            version, "tool version is deprecated and will stop being supported"
        );
    }
    Ok(())
}

/// `2`, `2.4` and `2.4.10` all parse; prerelease suffixes are dropped
fn parse_tool_version(version: &str) -> Option<semver::Version> {
    let core = version.trim().trim_start_matches('v');
    let numbers: Vec<u64> = core
        .split(['.', '-', '+'])
        .map_while(|part| part.parse::<u64>().ok())
        .take(3)
        .collect();
    match numbers.as_slice() {
        [] => None,
        [major] => Some(semver::Version::new(*major, 0, 0)),
        [major, minor] => Some(semver::Version::new(*major, *minor, 0)),
        [major, minor, patch, ..] => Some(semver::Version::new(*major, *minor, *patch)),
    }
}

/// Pulls `name (requirement)` pairs out of a resolver message
pub(crate) fn parse_conflicts(message: &str) -> Vec<BlockingRequirement> {
    let mut conflicts: Vec<BlockingRequirement> = Vec::new();
    for caps in CONFLICT_LINE_RE.captures_iter(message) {
        let conflict = BlockingRequirement {
            name: caps["name"].to_string(),
            requirement: caps["requirement"].to_string(),
            required_by: None,
        };
        if !conflicts.contains(&conflict) {
            conflicts.push(conflict);
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_version_passes() {
        let table = PackageManagerTable::default();
        assert!(check_tool_version(&table, PackageManager::Bundler, "2.4.10", true).is_ok());
    }

    #[test]
    fn test_unsupported_version_is_gated_by_flag() {
        let table = PackageManagerTable::default();
        let err = check_tool_version(&table, PackageManager::Bundler, "1.12.5", true).unwrap_err();
        assert!(matches!(err, ResolverError::ToolVersionNotSupported { .. }));

        assert!(check_tool_version(&table, PackageManager::Bundler, "1.12.5", false).is_ok());
    }

    #[test]
    fn test_deprecated_version_only_warns() {
        let table = PackageManagerTable::default();
        assert!(check_tool_version(&table, PackageManager::Bundler, "1.17.3", true).is_ok());
    }

    #[test]
    fn test_unparseable_version_is_ignored() {
        let table = PackageManagerTable::default();
        assert!(check_tool_version(&table, PackageManager::CocoaPods, "unknown", true).is_ok());
    }

    #[test]
    fn test_parse_tool_version() {
        assert_eq!(parse_tool_version("2"), Some(semver::Version::new(2, 0, 0)));
        assert_eq!(parse_tool_version("1.11"), Some(semver::Version::new(1, 11, 0)));
        assert_eq!(parse_tool_version("v2.4.10.pre"), Some(semver::Version::new(2, 4, 10)));
        assert_eq!(parse_tool_version(""), None);
    }

    #[test]
    fn test_parse_conflicts() {
        let message = "Bundler could not find compatible versions for gem \"i18n\":\n  \
                       In Gemfile:\n    rails (~> 5.0) was resolved to 5.0.0, which depends on\n      \
                       i18n (~> 0.7)\n\n    business (~> 1.0) was resolved to 1.4.0, which depends on\n      \
                       i18n (~> 1.0)";
        let conflicts = parse_conflicts(message);
        let names: Vec<&str> = conflicts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["rails", "i18n", "business", "i18n"]);
        assert_eq!(conflicts[1].requirement, "~> 0.7");
    }
}

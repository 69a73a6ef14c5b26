//! Update checking for dependencies
//!
//! This module provides:
//! - Update filter configuration (only/exclude, ignored versions, min age)
//! - Version info from registry with release date
//! - Latest version selection from registry listings
//! - Git ref inspection for git-sourced dependencies
//! - The requirement string updater
//! - `UpdateChecker`, which decides whether and how a dependency can move

mod filter;
mod git_commit_checker;
mod latest_version;
mod requirements_updater;
mod version_info;

pub use filter::UpdateFilter;
pub use git_commit_checker::{
    github_repo_from_url, is_version_tag, scan_version, CommitComparison, ComparisonStatus,
    GitCommitChecker, GithubCommitComparison, LocalTag,
};
pub use latest_version::LatestVersionFinder;
pub use requirements_updater::{
    RequirementUpdate, RequirementsRequest, RequirementsUpdater, UpdateStrategy,
};
pub use version_info::VersionInfo;

use crate::domain::{Dependency, DependencyFile, GemRequirement, GemVersion, RequirementSource};
use crate::error::{AppError, RegistryError};
use crate::registry::RegistryAdapter;
use crate::resolver::{ResolvedVersion, VersionResolver};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// How much of the manifest may change for an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementsToUnlock {
    /// Only the lockfile moves
    None,
    /// The dependency's own requirements may be rewritten
    Own,
}

/// Decides whether a dependency can be updated and what it becomes
pub struct UpdateChecker<'a> {
    dependency: &'a Dependency,
    files: &'a [DependencyFile],
    registry: &'a dyn RegistryAdapter,
    resolver: &'a dyn VersionResolver,
    filter: &'a UpdateFilter,
    strategy: Option<UpdateStrategy>,
    git: Option<GitCommitChecker>,
    comparison: Option<&'a dyn CommitComparison>,
    latest_release: OnceCell<Option<GemVersion>>,
    switch_to_release: OnceCell<bool>,
    resolved_unlocked: OnceCell<Option<ResolvedVersion>>,
    resolved_locked: OnceCell<Option<ResolvedVersion>>,
}

impl<'a> UpdateChecker<'a> {
    pub fn new(
        dependency: &'a Dependency,
        files: &'a [DependencyFile],
        registry: &'a dyn RegistryAdapter,
        resolver: &'a dyn VersionResolver,
        filter: &'a UpdateFilter,
    ) -> Self {
        Self {
            dependency,
            files,
            registry,
            resolver,
            filter,
            strategy: None,
            git: None,
            comparison: None,
            latest_release: OnceCell::new(),
            switch_to_release: OnceCell::new(),
            resolved_unlocked: OnceCell::new(),
            resolved_locked: OnceCell::new(),
        }
    }

    /// Force a strategy instead of deriving it from the dependency
    pub fn with_strategy(mut self, strategy: Option<UpdateStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Ref inspection for git-sourced dependencies
    pub fn with_git_checker(mut self, git: Option<GitCommitChecker>) -> Self {
        self.git = git;
        self
    }

    pub fn with_commit_comparison(mut self, comparison: Option<&'a dyn CommitComparison>) -> Self {
        self.comparison = comparison;
        self
    }

    fn is_path_dependency(&self) -> bool {
        self.dependency
            .requirements
            .iter()
            .filter_map(|r| r.source.as_ref())
            .any(|s| s.source_type == "path")
    }

    /// Libraries widen their requirements, applications bump them
    pub fn requirements_update_strategy(&self) -> UpdateStrategy {
        if let Some(strategy) = self.strategy {
            return strategy;
        }
        if self.dependency.is_library() {
            UpdateStrategy::BumpVersionsIfNecessary
        } else {
            UpdateStrategy::BumpVersions
        }
    }

    /// Dynamic requirements and lockfile-only jobs cannot touch the manifest
    pub fn requirements_unlocked_or_can_be(&self) -> bool {
        self.requirements_update_strategy() != UpdateStrategy::LockfileOnly
            && self
                .dependency
                .requirements
                .iter()
                .all(|r| r.requirement.is_some())
    }

    /// Newest eligible release on the registry
    async fn latest_release(&self) -> Result<Option<GemVersion>, AppError> {
        let release = self
            .latest_release
            .get_or_try_init(|| async {
                let versions = match self.registry.fetch_versions(&self.dependency.name).await {
                    Ok(versions) => versions,
                    // Git-only gems are never published
                    Err(RegistryError::PackageNotFound { .. }) if self.git.is_some() => Vec::new(),
                    Err(e) => return Err(AppError::from(e)),
                };
                Ok(LatestVersionFinder::new(self.filter).latest_version(self.dependency, &versions))
            })
            .await?;
        Ok(release.clone())
    }

    /// A pinned git dependency whose pin is part of the latest release moves
    /// back to the registry
    pub async fn should_switch_source_to_release(&self) -> Result<bool, AppError> {
        let switch = self
            .switch_to_release
            .get_or_try_init(|| async {
                let Some(git) = self.git.as_ref().filter(|g| g.is_pinned()) else {
                    return Ok::<bool, AppError>(false);
                };
                let Some(release) = self.latest_release().await? else {
                    return Ok(false);
                };
                let Some(comparison) = self.comparison else {
                    return Ok(false);
                };
                Ok(git.branch_or_ref_in_release(&release, comparison).await)
            })
            .await?;
        Ok(*switch)
    }

    /// A newer version tag for dependencies pinned to a version-like ref
    fn newer_version_tag(&self) -> Option<LocalTag> {
        let git = self.git.as_ref()?;
        if !git.pinned_ref_looks_like_version() {
            return None;
        }
        let current = git
            .source()
            .reference
            .as_deref()
            .and_then(scan_version)
            .and_then(|v| GemVersion::parse(v).ok())?;
        git.local_tag_for_latest_version()
            .filter(|tag| tag.version > current)
    }

    /// Copy of the dependency as the resolver should see it
    fn resolution_candidate(&self, switching: bool) -> Dependency {
        let mut candidate = self.dependency.clone();
        if switching {
            for requirement in &mut candidate.requirements {
                if requirement.source.as_ref().is_some_and(|s| s.is_git()) {
                    requirement.source = None;
                }
            }
        }
        candidate
    }

    async fn resolved(&self, unlock: bool) -> Result<Option<ResolvedVersion>, AppError> {
        let cell = if unlock {
            &self.resolved_unlocked
        } else {
            &self.resolved_locked
        };
        let resolved = cell
            .get_or_try_init(|| async {
                let switching = self.should_switch_source_to_release().await?;
                let candidate = self.resolution_candidate(switching);
                Ok::<_, AppError>(self.resolver.resolve(&candidate, self.files, unlock).await?)
            })
            .await?;
        Ok(resolved.clone())
    }

    /// A lockfile or an application manifest means the resolver has
    /// something to resolve against
    fn has_resolvable_manifest(&self) -> bool {
        let manifests = self.dependency.package_manager.manifest_filenames();
        let locks = self.dependency.package_manager.lock_filenames();
        self.files
            .iter()
            .any(|f| manifests.contains(&f.name.as_str()) || locks.contains(&f.name.as_str()))
    }

    /// Newest version (or commit) the dependency could move to
    pub async fn latest_version(&self) -> Result<Option<String>, AppError> {
        if self.is_path_dependency() {
            return Ok(None);
        }
        let Some(git) = &self.git else {
            return Ok(self.latest_release().await?.map(|v| v.to_string()));
        };
        if !git.is_pinned() {
            return Ok(git.head_commit_for_current_branch()?);
        }
        if self.should_switch_source_to_release().await? {
            return Ok(self.latest_release().await?.map(|v| v.to_string()));
        }
        if let Some(tag) = self.newer_version_tag() {
            return Ok(Some(tag.commit_sha));
        }
        Ok(self.dependency.version.clone())
    }

    async fn resolvable_version(&self, unlock: bool) -> Result<Option<String>, AppError> {
        if self.is_path_dependency() {
            return Ok(None);
        }
        if !self.has_resolvable_manifest() {
            return self.latest_version().await;
        }
        let Some(git) = &self.git else {
            return Ok(self.resolved(unlock).await?.and_then(|r| r.version));
        };
        if !git.is_pinned() {
            let resolved = self.resolved(unlock).await?.and_then(|r| r.commit_sha);
            return match resolved {
                Some(sha) => Ok(Some(sha)),
                None => Ok(git.head_commit_for_current_branch()?),
            };
        }
        if self.should_switch_source_to_release().await? {
            return Ok(self.resolved(unlock).await?.and_then(|r| r.version));
        }
        if let Some(tag) = self.newer_version_tag() {
            return Ok(Some(tag.commit_sha));
        }
        Ok(self.dependency.version.clone())
    }

    /// Newest version the resolver accepts with requirements unlocked
    pub async fn latest_resolvable_version(&self) -> Result<Option<String>, AppError> {
        self.resolvable_version(true).await
    }

    /// Newest version the resolver accepts without touching requirements
    pub async fn latest_resolvable_version_with_no_unlock(
        &self,
    ) -> Result<Option<String>, AppError> {
        self.resolvable_version(false).await
    }

    /// Source requirements should point at after the update
    pub async fn updated_source(&self) -> Result<Option<RequirementSource>, AppError> {
        let existing = self
            .dependency
            .requirements
            .iter()
            .find_map(|r| r.source.clone());
        if self.git.is_none() {
            return Ok(existing);
        }
        if self.should_switch_source_to_release().await? {
            return Ok(None);
        }
        if let Some(tag) = self.newer_version_tag() {
            return Ok(existing.map(|s| s.with_ref(tag.tag)));
        }
        Ok(existing)
    }

    /// Requirement entries rewritten for the latest versions
    pub async fn updated_requirements(&self) -> Result<Vec<RequirementUpdate>, AppError> {
        let latest = release_version(self.latest_version().await?);
        let resolvable = release_version(self.latest_resolvable_version().await?);

        let updates = RequirementsUpdater::new(
            self.dependency.requirements.clone(),
            self.requirements_update_strategy(),
        )
        .with_updated_source(self.updated_source().await?)
        .with_latest_version(latest)
        .with_latest_resolvable_version(resolvable)
        .updated_requirements()?;
        Ok(updates)
    }

    fn ignores_everything(&self) -> bool {
        let unconstrained = GemRequirement::default_requirement();
        self.filter
            .ignored_for(&self.dependency.name)
            .iter()
            .any(|r| *r == unconstrained)
    }

    /// Whether an update exists under the given unlock level
    pub async fn can_update(&self, unlock: RequirementsToUnlock) -> Result<bool, AppError> {
        if self.ignores_everything() {
            debug!(dependency = %self.dependency.name, "all versions ignored");
            return Ok(false);
        }

        let Some(current) = self.dependency.version.as_deref() else {
            return self.requirements_can_update(unlock).await;
        };

        if self.dependency.version_is_sha() {
            let latest = self.latest_version().await?;
            // Every SHA move needs the requirement unlocked
            let up_to_date = latest.as_deref().is_none_or(|l| l.starts_with(current));
            return Ok(!up_to_date && self.requirements_unlocked_or_can_be());
        }

        let Some(current) = self.dependency.numeric_version() else {
            return Ok(false);
        };
        if self.numeric_version_up_to_date(&current).await? {
            return Ok(false);
        }

        match unlock {
            RequirementsToUnlock::None => {
                let new_version = self
                    .latest_resolvable_version_with_no_unlock()
                    .await?
                    .and_then(|v| GemVersion::parse(&v).ok());
                Ok(new_version.is_some_and(|v| v > current))
            }
            RequirementsToUnlock::Own => {
                let Some(new_version) = self
                    .latest_resolvable_version()
                    .await?
                    .and_then(|v| GemVersion::parse(&v).ok())
                else {
                    return Ok(false);
                };
                if new_version <= current {
                    return Ok(false);
                }
                let updates = self.updated_requirements().await?;
                Ok(!updates.iter().any(RequirementUpdate::is_unfixable))
            }
        }
    }

    async fn numeric_version_up_to_date(&self, current: &GemVersion) -> Result<bool, AppError> {
        let Some(latest) = self.latest_version().await? else {
            return Ok(false);
        };
        // Moving from a release to a commit is not an update
        if is_commit_sha(&latest) {
            return Ok(true);
        }
        Ok(GemVersion::parse(&latest).is_ok_and(|l| l <= *current))
    }

    async fn requirements_can_update(&self, unlock: RequirementsToUnlock) -> Result<bool, AppError> {
        if unlock == RequirementsToUnlock::None {
            return Ok(false);
        }
        let updates = self.updated_requirements().await?;
        let changed = updates.iter().any(|u| u.is_updated() || u.is_unfixable());
        Ok(changed && !updates.iter().any(RequirementUpdate::is_unfixable))
    }

    /// The dependency as it will look after the update, if one exists
    pub async fn updated_dependency(
        &self,
        unlock: RequirementsToUnlock,
    ) -> Result<Option<Dependency>, AppError> {
        if !self.can_update(unlock).await? {
            return Ok(None);
        }
        let (version, requirements) = match unlock {
            RequirementsToUnlock::None => (
                self.latest_resolvable_version_with_no_unlock().await?,
                self.dependency.requirements.clone(),
            ),
            RequirementsToUnlock::Own => (
                self.latest_resolvable_version().await?,
                self.updated_requirements()
                    .await?
                    .into_iter()
                    .map(RequirementUpdate::into_requirement)
                    .collect(),
            ),
        };
        // Libraries have no locked version to move
        let version = if self.dependency.is_library() {
            None
        } else {
            version
        };
        info!(
            dependency = %self.dependency.name,
            from = self.dependency.version.as_deref().unwrap_or("none"),
            to = version.as_deref().unwrap_or("none"),
            "dependency can be updated"
        );
        Ok(Some(self.dependency.updated(version, requirements)))
    }
}

fn is_commit_sha(version: &str) -> bool {
    version.len() == 40 && version.chars().all(|c| c.is_ascii_hexdigit())
}

/// Commit SHAs never feed requirement rewriting
fn release_version(version: Option<String>) -> Option<GemVersion> {
    version
        .filter(|v| !is_commit_sha(v))
        .and_then(|v| GemVersion::parse(&v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageManager, Requirement};
    use crate::error::ResolverError;
    use crate::registry::{upload_pack, GitMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeRegistry {
        versions: Vec<&'static str>,
        missing: bool,
    }

    #[async_trait]
    impl RegistryAdapter for FakeRegistry {
        fn package_manager(&self) -> PackageManager {
            PackageManager::Bundler
        }

        fn registry_name(&self) -> &'static str {
            "rubygems"
        }

        async fn fetch_versions(&self, package: &str) -> Result<Vec<VersionInfo>, RegistryError> {
            if self.missing {
                return Err(RegistryError::package_not_found(package, "rubygems"));
            }
            Ok(self.versions.iter().map(|v| VersionInfo::undated(*v)).collect())
        }
    }

    fn registry(versions: Vec<&'static str>) -> FakeRegistry {
        FakeRegistry {
            versions,
            missing: false,
        }
    }

    struct FakeResolver {
        unlocked: Option<ResolvedVersion>,
        locked: Option<ResolvedVersion>,
        calls: Mutex<Vec<bool>>,
    }

    impl FakeResolver {
        fn new(unlocked: Option<&str>, locked: Option<&str>) -> Self {
            let resolved = |v: Option<&str>| {
                v.map(|v| ResolvedVersion {
                    version: Some(v.to_string()),
                    commit_sha: None,
                })
            };
            Self {
                unlocked: resolved(unlocked),
                locked: resolved(locked),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VersionResolver for FakeResolver {
        fn package_manager(&self) -> PackageManager {
            PackageManager::Bundler
        }

        async fn resolve(
            &self,
            _dependency: &Dependency,
            _files: &[DependencyFile],
            unlock_requirements: bool,
        ) -> Result<Option<ResolvedVersion>, ResolverError> {
            self.calls.lock().unwrap().push(unlock_requirements);
            Ok(if unlock_requirements {
                self.unlocked.clone()
            } else {
                self.locked.clone()
            })
        }

        async fn update_lockfile(
            &self,
            _dependencies: &[Dependency],
            _files: &[DependencyFile],
        ) -> Result<String, ResolverError> {
            Ok(String::new())
        }

        async fn tool_version(&self) -> Result<Option<String>, ResolverError> {
            Ok(None)
        }
    }

    struct AlwaysBehind;

    #[async_trait]
    impl CommitComparison for AlwaysBehind {
        async fn compare(
            &self,
            _repo: &str,
            _tag: &str,
            _commit: &str,
        ) -> Result<ComparisonStatus, crate::error::ProviderError> {
            Ok(ComparisonStatus::Behind)
        }
    }

    struct NeverReleased;

    #[async_trait]
    impl CommitComparison for NeverReleased {
        async fn compare(
            &self,
            _repo: &str,
            _tag: &str,
            _commit: &str,
        ) -> Result<ComparisonStatus, crate::error::ProviderError> {
            Ok(ComparisonStatus::Diverged)
        }
    }

    fn gemfile_files() -> Vec<DependencyFile> {
        vec![
            DependencyFile::new("Gemfile", "gem 'business', '~> 1.4.0'\n"),
            DependencyFile::new("Gemfile.lock", "GEM\n  specs:\n    business (1.4.0)\n"),
        ]
    }

    fn business(version: Option<&str>, requirement: &str) -> Dependency {
        Dependency::new(
            "business",
            version.map(str::to_string),
            vec![Requirement::new("Gemfile", requirement).with_groups(["default"])],
            PackageManager::Bundler,
        )
    }

    const PIN: &str = "a1b78a929dac93a52f08db4f2847d76d6cfe39bd";
    const V140_SHA: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const V150_SHA: &str = "cccccccccccccccccccccccccccccccccccccccc";
    const MASTER_SHA: &str = "dddddddddddddddddddddddddddddddddddddddd";

    fn git_metadata() -> GitMetadata {
        GitMetadata::parse(&upload_pack(&[
            (MASTER_SHA, "HEAD"),
            (MASTER_SHA, "refs/heads/master"),
            (V140_SHA, "refs/tags/v1.4.0"),
            (V150_SHA, "refs/tags/v1.5.0"),
        ]))
        .unwrap()
    }

    fn git_business(source: RequirementSource, version: &str) -> Dependency {
        Dependency::new(
            "business",
            Some(version.to_string()),
            vec![Requirement::new("Gemfile", ">= 0")
                .with_groups(["default"])
                .with_source(source)],
            PackageManager::Bundler,
        )
    }

    fn github_source() -> RequirementSource {
        RequirementSource::git("https://github.com/gocardless/business")
    }

    #[tokio::test]
    async fn test_application_dependency_bumps() {
        let dependency = business(Some("1.4.0"), "~> 1.4.0");
        let files = gemfile_files();
        let registry = registry(vec!["1.4.0", "1.13.0"]);
        let resolver = FakeResolver::new(Some("1.13.0"), Some("1.4.0"));
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert_eq!(checker.requirements_update_strategy(), UpdateStrategy::BumpVersions);
        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some("1.13.0"));
        assert_eq!(
            checker.latest_resolvable_version().await.unwrap().as_deref(),
            Some("1.13.0")
        );
        assert!(checker.can_update(RequirementsToUnlock::Own).await.unwrap());
        assert!(!checker.can_update(RequirementsToUnlock::None).await.unwrap());

        let updated = checker
            .updated_dependency(RequirementsToUnlock::Own)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version.as_deref(), Some("1.13.0"));
        assert_eq!(updated.previous_version.as_deref(), Some("1.4.0"));
        assert_eq!(updated.requirements[0].requirement.as_deref(), Some("~> 1.13.0"));
    }

    #[tokio::test]
    async fn test_up_to_date_dependency() {
        let dependency = business(Some("1.13.0"), "~> 1.13.0");
        let files = gemfile_files();
        let registry = registry(vec!["1.4.0", "1.13.0"]);
        let resolver = FakeResolver::new(Some("1.13.0"), Some("1.13.0"));
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert!(!checker.can_update(RequirementsToUnlock::Own).await.unwrap());
        assert!(resolver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ignoring_everything_blocks_updates() {
        let dependency = business(Some("1.4.0"), "~> 1.4.0");
        let files = gemfile_files();
        let registry = registry(vec!["1.13.0"]);
        let resolver = FakeResolver::new(Some("1.13.0"), None);
        let filter = UpdateFilter::new().with_ignored("business", GemRequirement::parse(">= 0").unwrap());
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert!(!checker.can_update(RequirementsToUnlock::Own).await.unwrap());
    }

    #[tokio::test]
    async fn test_library_requirements_widen() {
        let dependency = Dependency::new(
            "business",
            None,
            vec![Requirement::new("example.gemspec", "~> 1.0").with_groups(["runtime"])],
            PackageManager::Bundler,
        );
        let files = vec![DependencyFile::new("example.gemspec", "")];
        let registry = registry(vec!["1.0.0", "2.0.0"]);
        let resolver = FakeResolver::new(None, None);
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert_eq!(
            checker.requirements_update_strategy(),
            UpdateStrategy::BumpVersionsIfNecessary
        );
        assert!(!checker.can_update(RequirementsToUnlock::None).await.unwrap());
        assert!(checker.can_update(RequirementsToUnlock::Own).await.unwrap());

        let updated = checker
            .updated_dependency(RequirementsToUnlock::Own)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.version, None);
        assert_eq!(
            updated.requirements[0].requirement.as_deref(),
            Some(">= 1, < 3")
        );
    }

    #[tokio::test]
    async fn test_dynamic_requirement_cannot_unlock() {
        let dependency = Dependency::new(
            "business",
            Some("1.4.0".to_string()),
            vec![Requirement::dynamic("Gemfile")],
            PackageManager::Bundler,
        );
        let files = gemfile_files();
        let registry = registry(vec!["1.13.0"]);
        let resolver = FakeResolver::new(Some("1.13.0"), Some("1.4.0"));
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert!(!checker.requirements_unlocked_or_can_be());
        let updates = checker.updated_requirements().await.unwrap();
        assert!(updates[0].is_unlockable());
    }

    #[tokio::test]
    async fn test_path_dependency_has_no_latest_version() {
        let dependency = Dependency::new(
            "business",
            Some("1.4.0".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(RequirementSource::path("vendor/business"))],
            PackageManager::Bundler,
        );
        let files = gemfile_files();
        let registry = registry(vec!["1.13.0"]);
        let resolver = FakeResolver::new(Some("1.13.0"), None);
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter);

        assert_eq!(checker.latest_version().await.unwrap(), None);
        assert!(!checker.can_update(RequirementsToUnlock::Own).await.unwrap());
    }

    #[tokio::test]
    async fn test_pin_not_in_release_is_respected() {
        let dependency = git_business(github_source().with_ref("a1b78a9"), PIN);
        let files = gemfile_files();
        let registry = registry(vec!["1.4.0", "1.5.0"]);
        let resolver = FakeResolver::new(Some("1.5.0"), None);
        let filter = UpdateFilter::new();
        let comparison = NeverReleased;
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter)
            .with_git_checker(GitCommitChecker::new(&dependency, git_metadata()))
            .with_commit_comparison(Some(&comparison));

        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some(PIN));
        assert!(!checker.can_update(RequirementsToUnlock::Own).await.unwrap());

        let updates = checker.updated_requirements().await.unwrap();
        assert!(!updates[0].is_updated());
        assert_eq!(
            updates[0].requirement().source.as_ref().and_then(|s| s.reference.as_deref()),
            Some("a1b78a9")
        );
    }

    #[tokio::test]
    async fn test_released_pin_switches_to_registry() {
        let dependency = git_business(github_source().with_ref("a1b78a9"), PIN);
        let files = gemfile_files();
        let registry = registry(vec!["1.4.0", "1.5.0"]);
        let resolver = FakeResolver::new(Some("1.5.0"), None);
        let filter = UpdateFilter::new();
        let comparison = AlwaysBehind;
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter)
            .with_git_checker(GitCommitChecker::new(&dependency, git_metadata()))
            .with_commit_comparison(Some(&comparison));

        assert!(checker.should_switch_source_to_release().await.unwrap());
        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some("1.5.0"));
        assert_eq!(checker.updated_source().await.unwrap(), None);
        assert!(checker.can_update(RequirementsToUnlock::Own).await.unwrap());
    }

    #[tokio::test]
    async fn test_version_tag_pin_moves_to_newer_tag() {
        let dependency = git_business(github_source().with_ref("v1.4.0"), V140_SHA);
        let files = gemfile_files();
        let registry = FakeRegistry {
            versions: Vec::new(),
            missing: true,
        };
        let resolver = FakeResolver::new(None, None);
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter)
            .with_git_checker(GitCommitChecker::new(&dependency, git_metadata()));

        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some(V150_SHA));
        assert_eq!(
            checker.updated_source().await.unwrap().and_then(|s| s.reference),
            Some("v1.5.0".to_string())
        );
        assert!(checker.can_update(RequirementsToUnlock::Own).await.unwrap());
    }

    #[tokio::test]
    async fn test_branch_dependency_tracks_head() {
        let dependency = git_business(github_source().with_branch("master"), PIN);
        let files = gemfile_files();
        let registry = registry(vec![]);
        let resolver = FakeResolver::new(None, None);
        let filter = UpdateFilter::new();
        let checker = UpdateChecker::new(&dependency, &files, &registry, &resolver, &filter)
            .with_git_checker(GitCommitChecker::new(&dependency, git_metadata()));

        assert_eq!(checker.latest_version().await.unwrap().as_deref(), Some(MASTER_SHA));
        assert_eq!(
            checker.latest_resolvable_version().await.unwrap().as_deref(),
            Some(MASTER_SHA)
        );
        assert!(checker.can_update(RequirementsToUnlock::Own).await.unwrap());
    }
}

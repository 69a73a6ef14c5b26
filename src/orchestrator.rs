//! Update orchestrator for coordinating the entire update workflow
//!
//! This module provides:
//! - Workflow coordination: load → parse → check → update files → write
//! - Per-dependency failure collection (a failed check never aborts the job)
//! - Dry-run mode support
//! - Pull request creation for the changed files

use crate::config::JobConfig;
use crate::domain::{
    credential_for_host, Dependency, DependencyFile, PackageManagerTable, SkipReason, UpdateResult,
    UpdateSummary,
};
use crate::error::AppError;
use crate::manifest::{
    create_parser, load_dependency_files, FileUpdater, ManifestWriter, ParserOptions, WriteResult,
};
use crate::progress::Progress;
use crate::pull_request::{create_creator, PullRequestFactory, PullRequestHandle};
use crate::registry::{create_adapter, GitMetadataFetcher, HttpClient, RegistryAdapter};
use crate::resolver::{
    check_tool_version, create_resolver, HelperSubprocess, ResolverOptions, SystemCommandRunner,
    VersionResolver,
};
use crate::update::{
    CommitComparison, GitCommitChecker, GithubCommitComparison, RequirementsToUnlock, UpdateChecker,
    UpdateFilter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const GITHUB_API: &str = "https://api.github.com";

/// Per-run options from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write changed files to disk; dry run otherwise
    pub write: bool,
    pub only: Vec<String>,
    pub exclude: Vec<String>,
    pub min_age: Option<Duration>,
    pub show_progress: bool,
}

/// Orchestrator for coordinating the update workflow
pub struct Orchestrator {
    config: JobConfig,
    /// Repository checkout the job runs against
    root: PathBuf,
    options: RunOptions,
    table: PackageManagerTable,
    registry: Box<dyn RegistryAdapter>,
    resolver: Box<dyn VersionResolver>,
    git: Option<GitMetadataFetcher>,
    comparison: Option<Box<dyn CommitComparison>>,
}

/// Result of running the orchestrator
pub struct OrchestratorResult {
    pub summary: UpdateSummary,
    /// Files as they were read
    pub original_files: Vec<DependencyFile>,
    /// Files whose content changed
    pub changed_files: Vec<DependencyFile>,
    pub write_result: WriteResult,
}

impl Orchestrator {
    /// Build the production stack for a job: registry, native helper
    /// resolver and git inspection
    pub fn new(config: JobConfig, root: impl Into<PathBuf>, options: RunOptions) -> Result<Self, AppError> {
        let client = HttpClient::new()?;
        let package_manager = config.package_manager;

        let helper = HelperSubprocess::new(
            Arc::new(SystemCommandRunner),
            config.helper_runtime(),
            config.helper_path(),
        )
        .with_timeout(Some(config.helper_timeout()));
        let resolver = create_resolver(
            package_manager,
            helper,
            ResolverOptions {
                credentials: config.credentials.clone(),
            },
        );

        let token = credential_for_host(&config.credentials, "github.com").and_then(|c| c.token.clone());
        let comparison = GithubCommitComparison::new(client.inner().clone(), GITHUB_API).with_token(token);

        Ok(Self {
            registry: create_adapter(package_manager, client.clone()),
            git: Some(GitMetadataFetcher::new(client, config.credentials.clone())),
            comparison: Some(Box::new(comparison)),
            resolver,
            table: PackageManagerTable::default(),
            config,
            root: root.into(),
            options,
        })
    }

    /// Orchestrator over explicit collaborators
    pub fn with_collaborators(
        config: JobConfig,
        root: impl Into<PathBuf>,
        options: RunOptions,
        registry: Box<dyn RegistryAdapter>,
        resolver: Box<dyn VersionResolver>,
    ) -> Self {
        Self {
            config,
            root: root.into(),
            options,
            table: PackageManagerTable::default(),
            registry,
            resolver,
            git: None,
            comparison: None,
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Directory holding the manifests inside the checkout
    pub fn manifest_dir(&self) -> PathBuf {
        let relative = self.config.directory.trim_matches('/');
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn filter(&self) -> UpdateFilter {
        let mut filter = self
            .config
            .update_filter()
            .with_only(self.options.only.clone())
            .with_exclude(self.options.exclude.clone());
        if let Some(age) = self.options.min_age {
            filter = filter.with_min_age(age);
        }
        filter
    }

    /// Run the update workflow
    pub async fn run(&self) -> Result<OrchestratorResult, AppError> {
        let mut progress = Progress::new(self.options.show_progress);
        let package_manager = self.config.package_manager;

        progress.spinner("Reading dependency files...");
        let files = load_dependency_files(&self.manifest_dir(), package_manager, &self.config.directory)?;
        let parser = create_parser(
            package_manager,
            ParserOptions {
                reject_external_code: self.config.reject_external_code,
            },
        );
        let dependencies = parser.parse(&files)?;
        progress.finish_and_clear();
        info!(
            package_manager = %package_manager,
            files = files.len(),
            dependencies = dependencies.len(),
            "parsed dependency files"
        );

        self.check_tool_version().await?;

        let filter = self.filter();
        let mut summary = UpdateSummary::new(package_manager, &self.config.directory, !self.options.write);
        let top_level: Vec<&Dependency> = dependencies.iter().filter(|d| d.is_top_level()).collect();

        progress.start(top_level.len() as u64, "Checking dependencies");
        for dependency in top_level {
            progress.set_message(&format!("Checking {}", dependency.name));
            let result = self.check_dependency(dependency, &files, &filter).await;
            summary.add_result(result);
            progress.inc();
        }
        progress.finish_and_clear();

        let updated = summary.updated_dependencies();
        let changed_files = if updated.is_empty() {
            Vec::new()
        } else {
            progress.spinner("Updating dependency files...");
            let changed = FileUpdater::new(&updated, &files)
                .with_resolver(Some(self.resolver.as_ref()))
                .updated_dependency_files()
                .await;
            progress.finish_and_clear();
            changed?
        };
        summary.changed_files = changed_files.iter().map(DependencyFile::path).collect();

        let writer = ManifestWriter::new(!self.options.write);
        let write_result = writer.write_all(&self.root, &changed_files)?;

        Ok(OrchestratorResult {
            summary,
            original_files: files,
            changed_files,
            write_result,
        })
    }

    async fn check_tool_version(&self) -> Result<(), AppError> {
        match self.resolver.tool_version().await {
            Ok(Some(version)) => Ok(check_tool_version(
                &self.table,
                self.config.package_manager,
                &version,
                self.config.fail_on_unsupported_tool_version,
            )?),
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "could not determine native tool version");
                Ok(())
            }
        }
    }

    async fn check_dependency(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        filter: &UpdateFilter,
    ) -> UpdateResult {
        if !filter.should_process(&dependency.name) {
            let reason = if filter.only.is_empty() {
                SkipReason::Excluded
            } else {
                SkipReason::NotInOnlyList
            };
            return UpdateResult::skip(dependency.clone(), reason);
        }

        match self.updated_dependency(dependency, files, filter).await {
            Ok(Some(updated)) => UpdateResult::update(updated),
            Ok(None) => UpdateResult::skip(dependency.clone(), SkipReason::UpToDate),
            Err(e) => {
                warn!(dependency = %dependency.name, error = %e, "update check failed");
                UpdateResult::skip_failed(dependency.clone(), e.to_string())
            }
        }
    }

    async fn updated_dependency(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        filter: &UpdateFilter,
    ) -> Result<Option<Dependency>, AppError> {
        let git = match (dependency.git_source().and_then(|s| s.url.as_deref()), &self.git) {
            (Some(url), Some(fetcher)) => {
                let metadata = fetcher.fetch(url).await?;
                GitCommitChecker::new(dependency, metadata)
                    .map(|c| c.with_ignored_versions(filter.ignored_for(&dependency.name).to_vec()))
            }
            _ => None,
        };

        let checker = UpdateChecker::new(
            dependency,
            files,
            self.registry.as_ref(),
            self.resolver.as_ref(),
            filter,
        )
        .with_strategy(self.config.update_strategy)
        .with_git_checker(git)
        .with_commit_comparison(self.comparison.as_deref());

        let unlock = if checker.requirements_unlocked_or_can_be() {
            RequirementsToUnlock::Own
        } else {
            RequirementsToUnlock::None
        };
        debug!(dependency = %dependency.name, ?unlock, "checking for update");
        checker.updated_dependency(unlock).await
    }

    /// Open a pull request for the changed files; `Ok(None)` when nothing
    /// changed or the pull request already exists
    pub async fn create_pull_request(
        &self,
        result: &OrchestratorResult,
    ) -> Result<Option<PullRequestHandle>, AppError> {
        if result.changed_files.is_empty() {
            info!("no files changed; not opening a pull request");
            return Ok(None);
        }
        let source = self.config.require_source()?;
        let creator = create_creator(source, &self.config.credentials)?;
        let base_commit = creator.base_commit(source.branch.as_deref()).await?;
        let request = PullRequestFactory::new(source, &self.config.pull_request, &self.table).build(
            result.summary.updated_dependencies(),
            result.changed_files.clone(),
            base_commit,
        );
        info!(branch = %request.branch_name, provider = %creator.provider(), "creating pull request");
        Ok(creator.create(&request).await?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

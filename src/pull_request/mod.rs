//! Pull request creation across git hosting providers
//!
//! This module provides:
//! - The `PullRequestCreator` trait with one implementation per provider
//!   (GitHub, GitLab, Azure DevOps, Bitbucket Server)
//! - Branch naming, message building and labeling shared by every provider
//! - `PullRequestFactory`, which turns updated dependencies and files into a
//!   `PullRequest` ready to submit
//!
//! Creation is idempotent: an existing branch with an existing pull request
//! short-circuits to `Ok(None)`.

mod api;
mod azure;
mod bitbucket_server;
mod branch_namer;
mod github;
mod gitlab;
mod labeler;
mod message_builder;

pub use api::{status_error, ApiClient, ApiResponse, Auth};
pub use azure::AzureCreator;
pub use bitbucket_server::BitbucketServerCreator;
pub use branch_namer::{sanitize_ref, BranchNamer, DEFAULT_PREFIX};
pub use github::GithubCreator;
pub use gitlab::GitlabCreator;
pub use labeler::{
    update_type, LabelStore, Labeler, SyntheticLabels, UpdateType, DEFAULT_DEPENDENCIES_LABEL,
    DEFAULT_SECURITY_LABEL,
};
pub use message_builder::{to_sentence, truncate_description, CommitMessageOptions, MessageBuilder};

use crate::domain::{
    credential_for_host, Credential, Dependency, DependencyFile, LabelDetails, PackageManagerTable,
    Provider, Source,
};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Name and email recorded on commits and sign-offs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// Inputs to the labeler
#[derive(Debug, Clone, Default)]
pub struct LabelOptions {
    /// Explicit labels; when set no default labels are created
    pub custom_labels: Option<Vec<String>>,
    pub security_fix: bool,
    pub automerge_candidate: bool,
    /// Language label for the package manager, when language labels are wanted
    pub language: Option<LabelDetails>,
}

/// Everything a provider needs to open one pull request
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub branch_name: String,
    /// Commit the new branch starts from
    pub base_commit: String,
    /// Branch to merge into; the repository default when `None`
    pub target_branch: Option<String>,
    pub files: Vec<DependencyFile>,
    pub dependencies: Vec<Dependency>,
    pub commit_message: String,
    pub title: String,
    pub description: String,
    pub author: Option<CommitAuthor>,
    pub labels: LabelOptions,
    pub reviewers: Vec<String>,
    pub team_reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
}

/// A created pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestHandle {
    pub number: u64,
    pub url: Option<String>,
    pub branch_name: String,
    /// Labels actually applied
    pub labels: Vec<String>,
    /// Non-fatal annotation failures (labels, reviewers, assignees, milestone)
    pub warnings: Vec<String>,
}

impl PullRequestHandle {
    pub fn new(number: u64, url: Option<String>, branch_name: impl Into<String>) -> Self {
        Self {
            number,
            url,
            branch_name: branch_name.into(),
            labels: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Creates branches, commits and pull requests on one hosting provider
#[async_trait]
pub trait PullRequestCreator: Send + Sync {
    fn provider(&self) -> Provider;

    /// Head commit of `branch`, or of the default branch
    async fn base_commit(&self, branch: Option<&str>) -> Result<String, ProviderError>;

    /// Create the pull request; `Ok(None)` when it already exists or a race was lost
    async fn create(&self, request: &PullRequest) -> Result<Option<PullRequestHandle>, ProviderError>;
}

/// Get a pull request creator for the source's provider
pub fn create_creator(
    source: &Source,
    credentials: &[Credential],
) -> Result<Box<dyn PullRequestCreator>, ProviderError> {
    let credential = source
        .hostname()
        .and_then(|host| credential_for_host(credentials, host));
    let creator: Box<dyn PullRequestCreator> = match source.provider {
        Provider::Github => Box::new(GithubCreator::new(source, credential)?),
        Provider::Gitlab => Box::new(GitlabCreator::new(source, credential)?),
        Provider::Azure => Box::new(AzureCreator::new(source, credential)?),
        Provider::BitbucketServer => Box::new(BitbucketServerCreator::new(source, credential)?),
    };
    Ok(creator)
}

/// API endpoint for a source, or a configuration error
pub(crate) fn api_endpoint(source: &Source) -> Result<String, ProviderError> {
    source.api_endpoint().ok_or_else(|| ProviderError::Misconfigured {
        provider: source.provider.to_string(),
        message: "api_endpoint is required".to_string(),
    })
}

/// Pull request settings from the job configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PullRequestOptions {
    pub custom_labels: Option<Vec<String>>,
    pub reviewers: Vec<String>,
    pub team_reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub milestone: Option<u64>,
    pub branch_name_prefix: Option<String>,
    pub branch_name_separator: Option<String>,
    #[serde(flatten)]
    pub commit_message: CommitMessageOptions,
    /// Add a `Signed-off-by` trailer for the author
    pub signoff: bool,
    pub author: Option<CommitAuthor>,
    pub security_fix: bool,
    pub automerge_candidate: bool,
    /// Apply the package manager's language label
    pub label_language: bool,
}

/// Builds the provider-independent parts of a pull request
pub struct PullRequestFactory<'a> {
    source: &'a Source,
    options: &'a PullRequestOptions,
    table: &'a PackageManagerTable,
}

impl<'a> PullRequestFactory<'a> {
    pub fn new(source: &'a Source, options: &'a PullRequestOptions, table: &'a PackageManagerTable) -> Self {
        Self {
            source,
            options,
            table,
        }
    }

    pub fn build(
        &self,
        dependencies: Vec<Dependency>,
        files: Vec<DependencyFile>,
        base_commit: impl Into<String>,
    ) -> PullRequest {
        let target_branch = self.source.branch.clone();
        let branch_name = BranchNamer::new(&dependencies, &files, target_branch.as_deref())
            .with_prefix(self.options.branch_name_prefix.as_deref())
            .with_separator(self.options.branch_name_separator.as_deref())
            .new_branch_name();

        let signoff = if self.options.signoff {
            self.options.author.as_ref()
        } else {
            None
        };
        let builder = MessageBuilder::new(&dependencies, &files, &self.options.commit_message)
            .with_security_fix(self.options.security_fix)
            .with_signoff(signoff);
        let title = builder.pr_name();
        let description = builder.pr_message();
        let commit_message = builder.commit_message();

        let language = if self.options.label_language {
            dependencies
                .first()
                .and_then(|d| self.table.label_details(d.package_manager))
                .cloned()
        } else {
            None
        };

        PullRequest {
            branch_name,
            base_commit: base_commit.into(),
            target_branch,
            files,
            dependencies,
            commit_message,
            title,
            description,
            author: self.options.author.clone(),
            labels: LabelOptions {
                custom_labels: self.options.custom_labels.clone(),
                security_fix: self.options.security_fix,
                automerge_candidate: self.options.automerge_candidate,
                language,
            },
            reviewers: self.options.reviewers.clone(),
            team_reviewers: self.options.team_reviewers.clone(),
            assignees: self.options.assignees.clone(),
            milestone: self.options.milestone,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::{PackageManager, Requirement};

    pub fn business_update() -> Dependency {
        Dependency::new(
            "business",
            Some("1.4.0".to_string()),
            vec![Requirement::new("Gemfile", "~> 1.4.0").with_groups(["default"])],
            PackageManager::Bundler,
        )
        .updated(
            Some("1.5.0".to_string()),
            vec![Requirement::new("Gemfile", "~> 1.5.0").with_groups(["default"])],
        )
    }

    pub fn request() -> PullRequest {
        let source = Source::new(Provider::Github, "gocardless/bump");
        let options = PullRequestOptions::default();
        let table = PackageManagerTable::empty();
        PullRequestFactory::new(&source, &options, &table).build(
            vec![business_update()],
            vec![DependencyFile::new("Gemfile", "gem \"business\", \"~> 1.5.0\"\n")],
            "basecommitsha",
        )
    }
}

//! Git-sourced dependency inspection
//!
//! Answers questions about a dependency declared with `git:` from the refs
//! its remote advertises: is it pinned to a ref, does that ref look like a
//! version, which version tag is newest, and has the pinned commit made it
//! into a release.

use crate::domain::{Dependency, GemRequirement, GemVersion, RequirementSource};
use crate::error::{ProviderError, ResolverError};
use crate::registry::{git_host, normalize_git_url, GitMetadata, GitRef};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

/// `v12`, `v2-beta`, or anything ending in a dotted version such as
/// `release-1.2.3`
static VERSION_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^v([0-9]+(?:-[a-z0-9]+)?)$|([0-9]+\.[0-9]+(?:\.[a-z0-9\-]+)*)$").unwrap()
});

static TRAILING_V_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)v$").unwrap());

/// Relationship of a commit to a tag, from the tag's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    /// The commit is contained in the tag
    Behind,
    Identical,
    Ahead,
    Diverged,
}

/// Compares a commit against a tag on the hosting provider
#[async_trait]
pub trait CommitComparison: Send + Sync {
    async fn compare(
        &self,
        repo: &str,
        tag: &str,
        commit: &str,
    ) -> Result<ComparisonStatus, ProviderError>;
}

/// GitHub's `compare/{base}...{head}` endpoint
pub struct GithubCommitComparison {
    client: reqwest::Client,
    api_endpoint: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct CompareResponse {
    status: ComparisonStatus,
}

impl GithubCommitComparison {
    pub fn new(client: reqwest::Client, api_endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

#[async_trait]
impl CommitComparison for GithubCommitComparison {
    async fn compare(
        &self,
        repo: &str,
        tag: &str,
        commit: &str,
    ) -> Result<ComparisonStatus, ProviderError> {
        let url = format!(
            "{}/repos/{}/compare/{}...{}",
            self.api_endpoint,
            repo,
            urlencoding::encode(tag),
            urlencoding::encode(commit)
        );
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProviderError::Transient {
            provider: "github".to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api("github", status.as_u16(), body));
        }
        let body: CompareResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response("github", e.to_string()))?;
        Ok(body.status)
    }
}

/// The newest allowed version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTag {
    pub tag: String,
    pub version: GemVersion,
    pub commit_sha: String,
    pub tag_sha: String,
}

/// Returns true for tags and refs that name a version
pub fn is_version_tag(name: &str) -> bool {
    VERSION_TAG_RE.is_match(name)
}

/// The version part of a version tag (`v1.2.3` gives `1.2.3`)
pub fn scan_version(name: &str) -> Option<&str> {
    let caps = VERSION_TAG_RE.captures(name)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

fn version_from_tag(name: &str) -> Option<GemVersion> {
    scan_version(name).and_then(|v| GemVersion::parse(v).ok())
}

/// `owner/repo` when the URL points at github.com
pub fn github_repo_from_url(url: &str) -> Option<String> {
    if git_host(url).as_deref() != Some("github.com") {
        return None;
    }
    let normalized = normalize_git_url(url);
    let path = normalized.split("github.com/").nth(1)?;
    Some(path.trim_end_matches(".git").to_string())
}

pub struct GitCommitChecker {
    dependency: Dependency,
    source: RequirementSource,
    metadata: GitMetadata,
    ignored_versions: Vec<GemRequirement>,
    listing_repo: Option<String>,
}

impl GitCommitChecker {
    /// `None` unless the dependency is declared with a git source
    pub fn new(dependency: &Dependency, metadata: GitMetadata) -> Option<Self> {
        let source = dependency.git_source()?.clone();
        let listing_repo = source.url.as_deref().and_then(github_repo_from_url);
        Some(Self {
            dependency: dependency.clone(),
            source,
            metadata,
            ignored_versions: Vec::new(),
            listing_repo,
        })
    }

    pub fn with_ignored_versions(mut self, ignored: Vec<GemRequirement>) -> Self {
        self.ignored_versions = ignored;
        self
    }

    /// Repository whose releases are compared against the pin
    pub fn with_listing_repo(mut self, repo: Option<String>) -> Self {
        self.listing_repo = repo;
        self
    }

    pub fn source(&self) -> &RequirementSource {
        &self.source
    }

    fn reference(&self) -> Option<&str> {
        self.source.reference.as_deref()
    }

    fn ref_or_branch(&self) -> Option<&str> {
        self.reference().or(self.source.branch.as_deref())
    }

    /// Pinned dependencies follow a fixed tag or commit rather than a branch
    pub fn is_pinned(&self) -> bool {
        let Some(reference) = self.reference() else {
            return false;
        };
        if self.source.branch.as_deref() == Some(reference) {
            return false;
        }
        if self.source.branch.is_some() {
            return true;
        }
        if self
            .dependency
            .version
            .as_deref()
            .is_some_and(|v| v.starts_with(reference))
        {
            return true;
        }
        if self.metadata.find_tag(reference).is_some() {
            return true;
        }
        // Anything that is not a branch is assumed to be a commit
        self.metadata.find_head(reference).is_none()
    }

    pub fn pinned_ref_looks_like_version(&self) -> bool {
        self.is_pinned() && self.reference().is_some_and(is_version_tag)
    }

    fn matches_existing_prefix(&self, tag: &str) -> bool {
        let Some(current) = self.ref_or_branch().filter(|r| is_version_tag(r)) else {
            return true;
        };
        strip_version(current) == strip_version(tag)
    }

    fn wants_prerelease(&self) -> bool {
        self.pinned_ref_looks_like_version()
            && self
                .reference()
                .and_then(version_from_tag)
                .is_some_and(|v| v.is_prerelease())
    }

    fn is_ignored(&self, version: &GemVersion) -> bool {
        self.ignored_versions.iter().any(|r| r.satisfied_by(version))
    }

    fn allowed_version_tags(&self) -> Vec<(&GitRef, GemVersion)> {
        let wants_prerelease = self.wants_prerelease();
        self.metadata
            .tags()
            .filter(|t| is_version_tag(&t.name) && self.matches_existing_prefix(&t.name))
            .filter_map(|t| version_from_tag(&t.name).map(|v| (t, v)))
            .filter(|(_, v)| !self.is_ignored(v))
            .filter(|(_, v)| wants_prerelease || !v.is_prerelease())
            .collect()
    }

    /// Highest version tag that is not ignored and keeps the current prefix
    pub fn local_tag_for_latest_version(&self) -> Option<LocalTag> {
        self.allowed_version_tags()
            .into_iter()
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(tag, version)| LocalTag {
                tag: tag.name.clone(),
                version,
                commit_sha: tag.commit_sha.clone(),
                tag_sha: tag.tag_sha.clone(),
            })
    }

    /// Commit at the tip of the tracked branch (or `HEAD`)
    pub fn head_commit_for_current_branch(&self) -> Result<Option<String>, ResolverError> {
        let reference = self.ref_or_branch().unwrap_or("HEAD");
        let sha = self.metadata.head_commit_for_ref(reference).map(str::to_string);
        if sha.is_some() || self.is_pinned() {
            return Ok(sha);
        }
        Err(ResolverError::GitReferenceNotFound {
            dependency: self.dependency.name.clone(),
        })
    }

    fn listing_tag_for_version(&self, version: &str) -> Option<&str> {
        self.metadata
            .tags()
            .map(|t| t.name.as_str())
            .find(|name| tag_names_version(name, version))
    }

    /// True when the pinned ref, or the tracked branch, is already part of
    /// the release tagged for `version`
    pub async fn branch_or_ref_in_release(
        &self,
        version: &GemVersion,
        comparison: &dyn CommitComparison,
    ) -> bool {
        if self.is_pinned() {
            if let Some(reference) = self.reference() {
                if self
                    .included_in_release(version, reference, true, comparison)
                    .await
                {
                    return true;
                }
            }
        }
        match self.ref_or_branch() {
            Some(reference) => {
                self.included_in_release(version, reference, false, comparison)
                    .await
            }
            None => false,
        }
    }

    async fn included_in_release(
        &self,
        version: &GemVersion,
        commit: &str,
        allow_identical: bool,
        comparison: &dyn CommitComparison,
    ) -> bool {
        let Some(repo) = self.listing_repo.as_deref() else {
            return false;
        };
        let Some(tag) = self.listing_tag_for_version(version.as_str()) else {
            return false;
        };
        match comparison.compare(repo, tag, commit).await {
            Ok(ComparisonStatus::Behind) => true,
            Ok(ComparisonStatus::Identical) => allow_identical,
            Ok(_) => false,
            Err(e) => {
                debug!(repo, tag, commit, error = %e, "could not compare commit with release");
                false
            }
        }
    }
}

fn strip_version(name: &str) -> String {
    let without_version = VERSION_TAG_RE.replace_all(name, "");
    TRAILING_V_RE.replace(&without_version, "").into_owned()
}

/// `v1.2.3`, `release-1.2.3` and `1.2.3` all name version `1.2.3`
fn tag_names_version(name: &str, version: &str) -> bool {
    let Some(prefix) = name.strip_suffix(version) else {
        return false;
    };
    match prefix.chars().last() {
        None => true,
        Some(c) => !c.is_ascii_digit() && c != '.',
    }
}

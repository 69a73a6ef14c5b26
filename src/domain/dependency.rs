//! Dependency information structures
//!
//! The JSON shape of these types is a stable contract:
//! `{name, version, previous_version, requirements: [{file, requirement,
//! groups, source}], previous_requirements, package_manager}`.

use super::{GemVersion, PackageManager};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{6,}$").unwrap());
static FULL_SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// Where a requirement's code comes from when it is not a registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementSource {
    /// `git` or `path`
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl RequirementSource {
    pub fn git(url: impl Into<String>) -> Self {
        Self {
            source_type: "git".to_string(),
            url: Some(url.into()),
            branch: None,
            reference: None,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            source_type: "path".to_string(),
            url: Some(path.into()),
            branch: None,
            reference: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn is_git(&self) -> bool {
        self.source_type == "git"
    }
}

/// A single declaration of a dependency in one file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub file: String,
    /// `None` when the declaration does not use a literal requirement
    pub requirement: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub source: Option<RequirementSource>,
}

impl Requirement {
    pub fn new(file: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            requirement: Some(requirement.into()),
            groups: Vec::new(),
            source: None,
        }
    }

    /// A declaration whose requirement cannot be read statically
    pub fn dynamic(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            requirement: None,
            groups: Vec::new(),
            source: None,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: RequirementSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirement = Some(requirement.into());
        self
    }

    pub fn is_gemspec(&self) -> bool {
        self.file.ends_with(".gemspec") || self.file.contains(".gemspec")
    }

    pub fn is_development(&self) -> bool {
        self.groups.len() == 1 && self.groups[0] == "development"
    }
}

/// Represents a package dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Resolved version; a commit SHA for git sources, `None` for libraries
    pub version: Option<String>,
    #[serde(default)]
    pub previous_version: Option<String>,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub previous_requirements: Option<Vec<Requirement>>,
    pub package_manager: PackageManager,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subdependency: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub removed: bool,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        requirements: Vec<Requirement>,
        package_manager: PackageManager,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            previous_version: None,
            requirements,
            previous_requirements: None,
            package_manager,
            subdependency: false,
            removed: false,
        }
    }

    /// Marks this as a transitive-only dependency
    pub fn as_subdependency(mut self) -> Self {
        self.subdependency = true;
        self
    }

    /// Build the updated value object, moving current state to `previous_*`
    pub fn updated(&self, version: Option<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            name: self.name.clone(),
            version,
            previous_version: self.version.clone(),
            requirements,
            previous_requirements: Some(self.requirements.clone()),
            package_manager: self.package_manager,
            subdependency: self.subdependency,
            removed: false,
        }
    }

    /// Top-level dependencies have at least one manifest declaration
    pub fn is_top_level(&self) -> bool {
        !self.requirements.is_empty()
    }

    /// A library is depended on without a lockfile pinning its version
    pub fn is_library(&self) -> bool {
        self.version.is_none()
    }

    pub fn numeric_version(&self) -> Option<GemVersion> {
        self.version
            .as_deref()
            .and_then(|v| GemVersion::parse(v).ok())
    }

    pub fn previous_numeric_version(&self) -> Option<GemVersion> {
        self.previous_version
            .as_deref()
            .and_then(|v| GemVersion::parse(v).ok())
    }

    /// True when the version is a commit SHA rather than a release
    pub fn version_is_sha(&self) -> bool {
        match self.version.as_deref() {
            Some(v) => !GemVersion::is_correct(v) && SHA_RE.is_match(v),
            None => false,
        }
    }

    /// The first git source among the requirements
    pub fn git_source(&self) -> Option<&RequirementSource> {
        self.requirements
            .iter()
            .filter_map(|r| r.source.as_ref())
            .find(|s| s.is_git())
    }

    /// Version strings as they should appear in messages and branch names
    pub fn display_version(&self) -> Option<String> {
        display_version(self.version.as_deref(), &self.requirements)
    }

    pub fn display_previous_version(&self) -> Option<String> {
        let previous = self.previous_requirements.as_deref().unwrap_or(&[]);
        display_version(self.previous_version.as_deref(), previous)
    }
}

/// Formats SHA versions as short hashes, or as the ref if one is pinned
fn display_version(version: Option<&str>, requirements: &[Requirement]) -> Option<String> {
    let version = version?;
    if !FULL_SHA_RE.is_match(version) {
        return Some(version.to_string());
    }
    let reference = requirements
        .iter()
        .filter_map(|r| r.source.as_ref())
        .find_map(|s| s.reference.clone());
    match reference {
        Some(r) if !version.starts_with(&r) => Some(r),
        _ => Some(format!("`{}`", &version[..7])),
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

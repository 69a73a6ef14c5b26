//! Pull request labels
//!
//! This module provides:
//! - The label set for a pull request (dependencies, language, security,
//!   semver bump class and automerge labels)
//! - Lazy creation of missing well-known labels
//! - A synthetic label store for providers without repository labels

use super::LabelOptions;
use crate::domain::{Dependency, GemVersion, LabelDetails};
use crate::error::ProviderError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_DEPENDENCIES_LABEL: &str = "dependencies";
pub const DEFAULT_SECURITY_LABEL: &str = "security";

static DEPENDENCIES_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[^/]*dependenc[^/]+$").unwrap());

static SECURITY_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)security").unwrap());

/// Repository label storage on a hosting provider
#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn fetch_labels(&self) -> Result<Vec<String>, ProviderError>;

    /// Create a label; a label that already exists is not an error
    async fn create_label(&self, label: &LabelDetails) -> Result<(), ProviderError>;
}

/// Labels for providers that have no central label list (Azure DevOps)
pub struct SyntheticLabels {
    labels: Vec<String>,
}

impl SyntheticLabels {
    pub fn new(language: Option<&LabelDetails>) -> Self {
        let mut labels = vec![
            DEFAULT_DEPENDENCIES_LABEL.to_string(),
            DEFAULT_SECURITY_LABEL.to_string(),
        ];
        if let Some(language) = language {
            labels.push(language.name.clone());
        }
        Self { labels }
    }
}

#[async_trait]
impl LabelStore for SyntheticLabels {
    async fn fetch_labels(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.labels.clone())
    }

    async fn create_label(&self, _label: &LabelDetails) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// How far apart the previous and new versions are
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpdateType {
    NonSemver,
    Major,
    Minor,
    Patch,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::NonSemver => "non-semver",
            UpdateType::Major => "major",
            UpdateType::Minor => "minor",
            UpdateType::Patch => "patch",
        }
    }
}

/// The most significant bump across all dependencies
pub fn update_type(dependencies: &[Dependency]) -> Option<UpdateType> {
    if !dependencies.iter().any(|d| d.previous_version.is_some()) {
        return None;
    }
    dependencies.iter().map(precision).min()
}

fn precision(dependency: &Dependency) -> UpdateType {
    let new_version = version_for_comparison(
        dependency.version.as_deref(),
        dependency.git_source().and_then(|s| s.reference.as_deref()),
    );
    let previous_git_ref = dependency
        .previous_requirements
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|r| r.source.as_ref())
        .find(|s| s.is_git())
        .and_then(|s| s.reference.as_deref());
    let previous_version =
        version_for_comparison(dependency.previous_version.as_deref(), previous_git_ref);

    let new_version = new_version.unwrap_or_default();
    let new_parts: Vec<&str> = new_version.split(['.', '+']).collect();
    let old_parts: Vec<&str> = previous_version
        .as_deref()
        .map(|v| v.split(['.', '+']).collect())
        .unwrap_or_default();

    let all_numeric = new_parts
        .iter()
        .take(3)
        .chain(old_parts.iter().take(3))
        .all(|part| part.parse::<u64>().map(|n| n.to_string() == *part).unwrap_or(false));
    if !all_numeric {
        return UpdateType::NonSemver;
    }
    if new_parts.first() != old_parts.first() {
        UpdateType::Major
    } else if new_parts.get(1) != old_parts.get(1) {
        UpdateType::Minor
    } else {
        UpdateType::Patch
    }
}

/// Releases compare as-is; git SHAs compare by their version-like ref
fn version_for_comparison(version: Option<&str>, git_ref: Option<&str>) -> Option<String> {
    let version = version?;
    if GemVersion::is_correct(version) {
        return Some(version.to_string());
    }
    match git_ref.map(|r| r.trim_start_matches('v')) {
        Some(from_ref) if GemVersion::is_correct(from_ref) => Some(from_ref.to_string()),
        _ => Some(version.to_string()),
    }
}

/// Computes and creates the labels for one pull request
pub struct Labeler<'a> {
    store: &'a dyn LabelStore,
    dependencies: &'a [Dependency],
    options: &'a LabelOptions,
    labels: Mutex<Option<Vec<String>>>,
}

impl<'a> Labeler<'a> {
    pub fn new(store: &'a dyn LabelStore, dependencies: &'a [Dependency], options: &'a LabelOptions) -> Self {
        Self {
            store,
            dependencies,
            options,
            labels: Mutex::new(None),
        }
    }

    /// Repository labels, fetched once
    async fn labels(&self) -> Result<Vec<String>, ProviderError> {
        let mut cached = self.labels.lock().await;
        if let Some(labels) = cached.as_ref() {
            return Ok(labels.clone());
        }
        let labels = self.store.fetch_labels().await?;
        *cached = Some(labels.clone());
        Ok(labels)
    }

    async fn remember(&self, name: &str) {
        let mut cached = self.labels.lock().await;
        let labels = cached.get_or_insert_with(Vec::new);
        if !labels.iter().any(|l| l == name) {
            labels.push(name.to_string());
        }
    }

    /// Create `dependencies`, `security` and the language label when missing;
    /// nothing is created when custom labels were requested
    pub async fn create_default_labels_if_required(&self) -> Result<(), ProviderError> {
        if self.options.custom_labels.is_some() {
            return Ok(());
        }
        let labels = self.labels().await?;

        if !labels.iter().any(|l| DEPENDENCIES_LABEL_RE.is_match(l)) {
            let label = LabelDetails::new(DEFAULT_DEPENDENCIES_LABEL, "0366d6")
                .with_description("Pull requests that update a dependency file");
            self.create(&label).await?;
        }

        if self.options.security_fix && security_label(&labels).is_none() {
            let label = LabelDetails::new(DEFAULT_SECURITY_LABEL, "ee0701")
                .with_description("Pull requests that address a security vulnerability");
            self.create(&label).await?;
        }

        if let Some(language) = &self.options.language {
            if find_ignore_case(&labels, &language.name).is_none() {
                let label = LabelDetails {
                    description: Some(language.description_or_default()),
                    ..language.clone()
                };
                self.create(&label).await?;
            }
        }
        Ok(())
    }

    async fn create(&self, label: &LabelDetails) -> Result<(), ProviderError> {
        debug!(label = %label.name, "creating label");
        self.store.create_label(label).await?;
        self.remember(&label.name).await;
        Ok(())
    }

    /// Labels to apply, limited to labels that exist in the repository
    pub async fn labels_for_pr(&self) -> Result<Vec<String>, ProviderError> {
        let labels = self.labels().await?;
        let mut selected: Vec<String> = Vec::new();

        match &self.options.custom_labels {
            Some(custom) => {
                selected.extend(custom.iter().filter(|c| labels.contains(c)).cloned());
            }
            None => {
                if let Some(label) = dependencies_label(&labels) {
                    selected.push(label);
                }
                if let Some(language) = &self.options.language {
                    selected.extend(find_ignore_case(&labels, &language.name));
                }
            }
        }

        if self.options.security_fix {
            selected.extend(security_label(&labels));
        }

        if semver_labels_exist(&labels) {
            if let Some(update_type) = update_type(self.dependencies) {
                selected.extend(find_ignore_case(&labels, update_type.as_str()));
            }
        }

        if self.options.automerge_candidate {
            selected.extend(find_ignore_case(&labels, "automerge"));
        }

        let mut unique = Vec::new();
        for label in selected {
            if !unique.contains(&label) {
                unique.push(label);
            }
        }
        Ok(unique)
    }
}

/// Exact `dependencies` first, then anything matching `*dependenc*`
fn dependencies_label(labels: &[String]) -> Option<String> {
    labels
        .iter()
        .find(|l| *l == DEFAULT_DEPENDENCIES_LABEL)
        .or_else(|| labels.iter().find(|l| DEPENDENCIES_LABEL_RE.is_match(l)))
        .cloned()
}

fn security_label(labels: &[String]) -> Option<String> {
    labels
        .iter()
        .find(|l| *l == DEFAULT_SECURITY_LABEL)
        .or_else(|| labels.iter().find(|l| SECURITY_LABEL_RE.is_match(l)))
        .cloned()
}

fn find_ignore_case(labels: &[String], name: &str) -> Option<String> {
    labels.iter().find(|l| l.eq_ignore_ascii_case(name)).cloned()
}

/// Semver labels are only used when all three exist and no release tool owns them
fn semver_labels_exist(labels: &[String]) -> bool {
    let lower: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
    if lower.iter().any(|l| l == "skip-release") {
        return false;
    }
    ["major", "minor", "patch"]
        .iter()
        .all(|required| lower.iter().any(|l| l == required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageManager, Requirement};
    use std::sync::Mutex as StdMutex;

    struct FakeStore {
        labels: Vec<String>,
        created: StdMutex<Vec<String>>,
    }

    impl FakeStore {
        fn new(labels: &[&str]) -> Self {
            Self {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                created: StdMutex::new(Vec::new()),
            }
        }

        fn created(&self) -> Vec<String> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LabelStore for FakeStore {
        async fn fetch_labels(&self) -> Result<Vec<String>, ProviderError> {
            Ok(self.labels.clone())
        }

        async fn create_label(&self, label: &LabelDetails) -> Result<(), ProviderError> {
            self.created.lock().unwrap().push(label.name.clone());
            Ok(())
        }
    }

    fn bump(previous: &str, new: &str) -> Vec<Dependency> {
        let dependency = Dependency::new(
            "business",
            Some(previous.to_string()),
            vec![Requirement::new("Gemfile", "~> 1.4.0")],
            PackageManager::Bundler,
        );
        vec![dependency.updated(Some(new.to_string()), vec![Requirement::new("Gemfile", "~> 1.5.0")])]
    }

    fn ruby() -> LabelDetails {
        LabelDetails::new("ruby", "ce2d2d")
    }

    #[test]
    fn test_update_type() {
        assert_eq!(update_type(&bump("1.4.0", "2.0.0")), Some(UpdateType::Major));
        assert_eq!(update_type(&bump("1.4.0", "1.5.0")), Some(UpdateType::Minor));
        assert_eq!(update_type(&bump("1.4.0", "1.4.1")), Some(UpdateType::Patch));
        assert_eq!(update_type(&bump("1.4.0", "1.4.1+build.2")), Some(UpdateType::Patch));
        assert_eq!(update_type(&bump("1.4.0", "1.5.0.beta1")), Some(UpdateType::Minor));
        assert_eq!(update_type(&bump("1.4.a", "1.5.0")), Some(UpdateType::NonSemver));

        let mut no_previous = bump("1.4.0", "1.5.0");
        no_previous[0].previous_version = None;
        assert_eq!(update_type(&no_previous), None);
    }

    #[tokio::test]
    async fn test_creates_missing_default_labels() {
        let store = FakeStore::new(&["bug"]);
        let dependencies = bump("1.4.0", "1.5.0");
        let options = LabelOptions {
            security_fix: true,
            language: Some(ruby()),
            ..LabelOptions::default()
        };
        let labeler = Labeler::new(&store, &dependencies, &options);
        labeler.create_default_labels_if_required().await.unwrap();
        assert_eq!(store.created(), vec!["dependencies", "security", "ruby"]);

        let labels = labeler.labels_for_pr().await.unwrap();
        assert_eq!(labels, vec!["dependencies", "ruby", "security"]);
    }

    #[tokio::test]
    async fn test_existing_dependency_label_variant_is_used() {
        let store = FakeStore::new(&["Dependency: Ruby", "major", "minor", "patch"]);
        let dependencies = bump("1.4.0", "1.5.0");
        let options = LabelOptions::default();
        let labeler = Labeler::new(&store, &dependencies, &options);
        labeler.create_default_labels_if_required().await.unwrap();
        assert!(store.created().is_empty());

        let labels = labeler.labels_for_pr().await.unwrap();
        assert_eq!(labels, vec!["Dependency: Ruby", "minor"]);
    }

    #[tokio::test]
    async fn test_semver_label_needs_all_three() {
        let store = FakeStore::new(&["dependencies", "minor", "patch"]);
        let dependencies = bump("1.4.0", "1.5.0");
        let options = LabelOptions::default();
        let labeler = Labeler::new(&store, &dependencies, &options);
        assert_eq!(labeler.labels_for_pr().await.unwrap(), vec!["dependencies"]);
    }

    #[tokio::test]
    async fn test_custom_labels_are_never_created() {
        let store = FakeStore::new(&["deps", "automerge"]);
        let dependencies = bump("1.4.0", "1.5.0");
        let options = LabelOptions {
            custom_labels: Some(vec!["deps".to_string(), "missing".to_string()]),
            automerge_candidate: true,
            security_fix: true,
            language: Some(ruby()),
            ..LabelOptions::default()
        };
        let labeler = Labeler::new(&store, &dependencies, &options);
        labeler.create_default_labels_if_required().await.unwrap();
        assert!(store.created().is_empty());
        assert_eq!(labeler.labels_for_pr().await.unwrap(), vec!["deps", "automerge"]);
    }

    #[tokio::test]
    async fn test_synthetic_labels() {
        let store = SyntheticLabels::new(Some(&ruby()));
        let dependencies = bump("1.4.0", "1.5.0");
        let options = LabelOptions {
            security_fix: true,
            language: Some(ruby()),
            ..LabelOptions::default()
        };
        let labeler = Labeler::new(&store, &dependencies, &options);
        labeler.create_default_labels_if_required().await.unwrap();
        assert_eq!(
            labeler.labels_for_pr().await.unwrap(),
            vec!["dependencies", "ruby", "security"]
        );
    }
}

//! Branch names for dependency update pull requests

use crate::domain::{Dependency, DependencyFile, Requirement};
use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_PREFIX: &str = "dependabot";

static FORBIDDEN_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9/\-_.(){}]").unwrap());
static REPEATED_SLASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/+").unwrap());
static TRAILING_DOTS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+$").unwrap());
static FULL_SHA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").unwrap());

/// Builds `<prefix>/<package manager>/<directory>/<target>/<name>-<version>`
pub struct BranchNamer<'a> {
    dependencies: &'a [Dependency],
    files: &'a [DependencyFile],
    target_branch: Option<&'a str>,
    prefix: &'a str,
    separator: &'a str,
}

impl<'a> BranchNamer<'a> {
    pub fn new(
        dependencies: &'a [Dependency],
        files: &'a [DependencyFile],
        target_branch: Option<&'a str>,
    ) -> Self {
        Self {
            dependencies,
            files,
            target_branch,
            prefix: DEFAULT_PREFIX,
            separator: "/",
        }
    }

    pub fn with_prefix(mut self, prefix: Option<&'a str>) -> Self {
        if let Some(prefix) = prefix {
            self.prefix = prefix;
        }
        self
    }

    pub fn with_separator(mut self, separator: Option<&'a str>) -> Self {
        if let Some(separator) = separator {
            self.separator = separator;
        }
        self
    }

    pub fn new_branch_name(&self) -> String {
        let mut parts: Vec<String> = vec![self.prefix.to_string()];
        if let Some(dependency) = self.dependencies.first() {
            parts.push(dependency.package_manager.as_str().to_string());
        }
        let directory = self
            .files
            .first()
            .map(|f| f.directory.replace(' ', "-"))
            .unwrap_or_default();
        let directory = directory.trim_matches('/');
        if !directory.is_empty() {
            parts.push(directory.to_string());
        }
        if let Some(target) = self.target_branch {
            parts.push(target.to_string());
        }
        parts.push(self.dependency_part());

        let name = sanitize_ref(&parts.join("/"));
        if self.separator == "/" {
            name
        } else {
            name.replace('/', self.separator)
        }
    }

    fn dependency_part(&self) -> String {
        let name = match self.dependencies {
            [dependency] => {
                if dependency.removed {
                    format!("{}--removed", dependency.name)
                } else {
                    format!("{}-{}", dependency.name, new_version(dependency))
                }
            }
            dependencies => dependencies
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join("-and-"),
        };
        name.replace([':', '[', ']'], "-").replace('@', "")
    }
}

fn new_version(dependency: &Dependency) -> String {
    let Some(version) = dependency.version.as_deref() else {
        return new_library_requirement(dependency).unwrap_or_default();
    };
    if !FULL_SHA_RE.is_match(version) {
        return version.to_string();
    }
    match changed_ref(dependency) {
        Some(reference) => reference,
        None => version[..7].to_string(),
    }
}

/// The new git ref when it moved
fn changed_ref(dependency: &Dependency) -> Option<String> {
    let new_ref = dependency.git_source()?.reference.clone()?;
    let previous_ref = dependency
        .previous_requirements
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|r| r.source.as_ref())
        .find_map(|s| s.reference.clone());
    if previous_ref.as_deref() == Some(new_ref.as_str()) {
        None
    } else {
        Some(new_ref)
    }
}

/// The updated requirement, preferring a gemspec's
fn new_library_requirement(dependency: &Dependency) -> Option<String> {
    let previous = dependency.previous_requirements.as_deref().unwrap_or(&[]);
    let updated: Vec<&Requirement> = dependency
        .requirements
        .iter()
        .filter(|r| !previous.contains(r))
        .collect();
    let chosen = updated
        .iter()
        .find(|r| r.is_gemspec() && !r.file.contains('/'))
        .or_else(|| updated.first())?;
    chosen.requirement.clone()
}

/// Strip characters git refuses (and a few it merely tolerates)
pub fn sanitize_ref(reference: &str) -> String {
    let cleaned = FORBIDDEN_CHARS_RE.replace_all(reference, "");
    let cleaned = REPEATED_SLASH_RE.replace_all(&cleaned, "/");
    let cleaned = TRAILING_DOTS_RE.replace(&cleaned, "");
    let cleaned = cleaned.replace("/.", "/dot-");
    match cleaned.strip_prefix('.') {
        Some(rest) => format!("dot-{}", rest),
        None => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PackageManager, RequirementSource};

    fn gemfile() -> Vec<DependencyFile> {
        vec![DependencyFile::new("Gemfile", "")]
    }

    fn business(previous: &str, new: &str) -> Dependency {
        Dependency::new(
            "business",
            Some(previous.to_string()),
            vec![Requirement::new("Gemfile", "~> 1.4.0")],
            PackageManager::Bundler,
        )
        .updated(Some(new.to_string()), vec![Requirement::new("Gemfile", "~> 1.5.0")])
    }

    #[test]
    fn test_single_dependency() {
        let dependencies = vec![business("1.4.0", "1.5.0")];
        let files = gemfile();
        let namer = BranchNamer::new(&dependencies, &files, None);
        assert_eq!(namer.new_branch_name(), "dependabot/bundler/business-1.5.0");
    }

    #[test]
    fn test_directory_target_and_custom_prefix() {
        let dependencies = vec![business("1.4.0", "1.5.0")];
        let files = vec![DependencyFile::new("Gemfile", "").with_directory("/apps/my app")];
        let namer = BranchNamer::new(&dependencies, &files, Some("develop"))
            .with_prefix(Some("bot"))
            .with_separator(Some("-"));
        assert_eq!(
            namer.new_branch_name(),
            "bot-bundler-apps-my-app-develop-business-1.5.0"
        );
    }

    #[test]
    fn test_library_requirement() {
        let original = Dependency::new(
            "tw",
            None,
            vec![Requirement::new("Gemfile", "~> 1.4.0")],
            PackageManager::Bundler,
        );
        let dependencies = vec![original.updated(None, vec![Requirement::new("Gemfile", "~> 1.5.0")])];
        let files = gemfile();
        let namer = BranchNamer::new(&dependencies, &files, None);
        assert_eq!(namer.new_branch_name(), "dependabot/bundler/tw-1.5.0");
    }

    #[test]
    fn test_sha_version_is_truncated() {
        let source = RequirementSource::git("https://github.com/gocardless/business");
        let original = Dependency::new(
            "business",
            Some("a1b78a929dac93a52f08db4f2847d76d6cfe39bd".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(source.clone())],
            PackageManager::Bundler,
        );
        let dependencies = vec![original.updated(
            Some("cff701b3bfb182afc99a85657d7c9f3d6c1ccce2".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(source.clone())],
        )];
        let files = gemfile();
        assert_eq!(
            BranchNamer::new(&dependencies, &files, None).new_branch_name(),
            "dependabot/bundler/business-cff701b"
        );

        let moved = vec![original.updated(
            Some("cff701b3bfb182afc99a85657d7c9f3d6c1ccce2".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(source.with_ref("v1.5.0"))],
        )];
        assert_eq!(
            BranchNamer::new(&moved, &files, None).new_branch_name(),
            "dependabot/bundler/business-v1.5.0"
        );
    }

    #[test]
    fn test_multiple_and_removed() {
        let mut statesman = business("1.2.0", "1.3.0");
        statesman.name = "statesman".to_string();
        let dependencies = vec![business("1.4.0", "1.5.0"), statesman];
        let files = gemfile();
        assert_eq!(
            BranchNamer::new(&dependencies, &files, None).new_branch_name(),
            "dependabot/bundler/business-and-statesman"
        );

        let mut removed = business("1.4.0", "1.5.0");
        removed.removed = true;
        let dependencies = vec![removed];
        assert_eq!(
            BranchNamer::new(&dependencies, &files, None).new_branch_name(),
            "dependabot/bundler/business--removed"
        );
    }

    #[test]
    fn test_sanitize_ref() {
        assert_eq!(sanitize_ref("dependabot/cocoapods/Firebase/Core-5.4.0"), "dependabot/cocoapods/Firebase/Core-5.4.0");
        assert_eq!(sanitize_ref("a//b/.hidden-1.0.."), "a/b/dot-hidden-1.0");
        assert_eq!(sanitize_ref(".github/x"), "dot-github/x");
        assert_eq!(sanitize_ref("name-~> 1.0, < 2"), "name-1.02");
    }
}

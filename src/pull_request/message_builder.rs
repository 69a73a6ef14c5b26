//! Pull request titles, descriptions and commit messages
//!
//! This module provides:
//! - PR titles (`Bump x from a to b`, `Update x requirement from a to b`)
//! - Commit prefixes with optional scope and the `[Security]` marker
//! - A plain description intro and a commit message with optional sign-off

use super::CommitAuthor;
use crate::domain::{Dependency, DependencyFile, Requirement};

/// Options controlling the commit message style
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CommitMessageOptions {
    /// Prefix such as `chore` or `build`
    #[serde(default)]
    pub prefix: Option<String>,
    /// Prefix used when only development dependencies change
    #[serde(default)]
    pub prefix_development: Option<String>,
    /// Append `(deps)` / `(deps-dev)` to the prefix
    #[serde(default)]
    pub include_scope: bool,
}

pub struct MessageBuilder<'a> {
    dependencies: &'a [Dependency],
    files: &'a [DependencyFile],
    options: &'a CommitMessageOptions,
    security_fix: bool,
    signoff: Option<&'a CommitAuthor>,
}

impl<'a> MessageBuilder<'a> {
    pub fn new(
        dependencies: &'a [Dependency],
        files: &'a [DependencyFile],
        options: &'a CommitMessageOptions,
    ) -> Self {
        Self {
            dependencies,
            files,
            options,
            security_fix: false,
            signoff: None,
        }
    }

    pub fn with_security_fix(mut self, security_fix: bool) -> Self {
        self.security_fix = security_fix;
        self
    }

    pub fn with_signoff(mut self, author: Option<&'a CommitAuthor>) -> Self {
        self.signoff = author;
        self
    }

    pub fn pr_name(&self) -> String {
        let mut name = if self.is_library() {
            self.library_pr_name()
        } else {
            self.application_pr_name()
        };
        if let Some(directory) = self.directory() {
            name.push_str(&format!(" in {}", directory));
        }

        let prefix = self.commit_prefix();
        let capitalize = !prefix.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        let security = match (self.security_fix, capitalize) {
            (false, _) => "",
            (true, true) => "[Security] ",
            (true, false) => "[security] ",
        };
        let name = if capitalize { name } else { lowercase_first(&name) };
        format!("{}{}{}", prefix, security, name)
    }

    pub fn pr_message(&self) -> String {
        match self.dependencies {
            [dependency] if dependency.removed => format!("Removes {}.", self.linked_name(dependency)),
            [dependency] if self.is_library() => format!(
                "Updates the requirements on {} to permit the latest version.",
                self.linked_name(dependency)
            ),
            [dependency] => format!(
                "Bumps {} from {} to {}.",
                self.linked_name(dependency),
                display_or_unknown(dependency.display_previous_version()),
                display_or_unknown(dependency.display_version())
            ),
            dependencies => {
                let names: Vec<String> = dependencies.iter().map(|d| self.linked_name(d)).collect();
                let mut message = format!(
                    "Bumps {}. These dependencies needed to be updated together.",
                    to_sentence(&names)
                );
                for dependency in dependencies {
                    message.push_str(&format!(
                        "\nUpdates `{}` from {} to {}",
                        dependency.name,
                        display_or_unknown(dependency.display_previous_version()),
                        display_or_unknown(dependency.display_version())
                    ));
                }
                message
            }
        }
    }

    pub fn commit_message(&self) -> String {
        let mut message = format!("{}\n\n{}", self.pr_name(), self.pr_message());
        if let Some(author) = self.signoff {
            message.push_str(&format!("\n\nSigned-off-by: {} <{}>", author.name, author.email));
        }
        message
    }

    fn is_library(&self) -> bool {
        self.dependencies.iter().any(|d| d.version.is_none())
            || self.files.iter().any(|f| f.name.ends_with(".gemspec") && !f.support_file)
                && self.dependencies.iter().all(|d| d.previous_version.is_none())
    }

    fn library_pr_name(&self) -> String {
        match self.dependencies {
            [dependency] => format!(
                "Update {} requirement from {} to {}",
                dependency.name,
                old_library_requirement(dependency).unwrap_or_else(|| "unknown".to_string()),
                new_library_requirement(dependency).unwrap_or_else(|| "unknown".to_string())
            ),
            dependencies => format!("Update requirements for {}", self.names(dependencies)),
        }
    }

    fn application_pr_name(&self) -> String {
        match self.dependencies {
            [dependency] if dependency.removed => format!("Remove {}", dependency.name),
            [dependency] => format!(
                "Bump {} from {} to {}",
                dependency.name,
                display_or_unknown(dependency.display_previous_version()),
                display_or_unknown(dependency.display_version())
            ),
            dependencies => format!("Bump {}", self.names(dependencies)),
        }
    }

    fn names(&self, dependencies: &[Dependency]) -> String {
        let names: Vec<String> = dependencies.iter().map(|d| d.name.clone()).collect();
        to_sentence(&names)
    }

    fn directory(&self) -> Option<String> {
        let directory = self.files.first()?.directory.trim_end_matches('/');
        if directory.is_empty() {
            None
        } else {
            Some(directory.to_string())
        }
    }

    fn linked_name(&self, dependency: &Dependency) -> String {
        match dependency.git_source().and_then(|s| s.url.as_deref()) {
            Some(url) if url.starts_with("http") => {
                format!("[{}]({})", dependency.name, url.trim_end_matches(".git"))
            }
            _ => dependency.name.clone(),
        }
    }

    fn commit_prefix(&self) -> String {
        let production = self.dependencies.iter().any(is_production);
        let prefix = match (&self.options.prefix, &self.options.prefix_development) {
            (_, Some(development)) if !production => development.clone(),
            (Some(prefix), _) => prefix.clone(),
            _ => return String::new(),
        };
        if prefix.is_empty() {
            return prefix;
        }

        let mut prefix = prefix;
        if self.options.include_scope {
            let scope = if production { "deps" } else { "deps-dev" };
            prefix.push_str(&format!("({})", scope));
        }
        if prefix.ends_with(|c: char| c.is_ascii_alphanumeric() || c == ')' || c == ']') {
            prefix.push(':');
        }
        if !prefix.ends_with(' ') {
            prefix.push(' ');
        }
        prefix
    }
}

/// Production unless every declaration is development-only
fn is_production(dependency: &Dependency) -> bool {
    dependency.requirements.is_empty() || !dependency.requirements.iter().all(Requirement::is_development)
}

fn changed_requirement<'r>(from: &'r [Requirement], excluding: &[Requirement]) -> Option<&'r Requirement> {
    let changed: Vec<&Requirement> = from.iter().filter(|r| !excluding.contains(r)).collect();
    changed
        .iter()
        .find(|r| r.is_gemspec())
        .or_else(|| changed.first())
        .copied()
}

fn old_library_requirement(dependency: &Dependency) -> Option<String> {
    let previous = dependency.previous_requirements.as_deref().unwrap_or(&[]);
    changed_requirement(previous, &dependency.requirements)?.requirement.clone()
}

fn new_library_requirement(dependency: &Dependency) -> Option<String> {
    let previous = dependency.previous_requirements.as_deref().unwrap_or(&[]);
    changed_requirement(&dependency.requirements, previous)?.requirement.clone()
}

fn display_or_unknown(version: Option<String>) -> String {
    version.unwrap_or_else(|| "unknown".to_string())
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `a`, `a and b`, `a, b and c`
pub fn to_sentence(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Cut a description to a provider's limit, noting the truncation
pub fn truncate_description(description: &str, max_chars: usize) -> String {
    const NOTICE: &str = "\n\n...\n\n_Description has been truncated_";
    if description.chars().count() <= max_chars {
        return description.to_string();
    }
    let keep = max_chars.saturating_sub(NOTICE.chars().count());
    let truncated: String = description.chars().take(keep).collect();
    format!("{}{}", truncated, NOTICE)
}

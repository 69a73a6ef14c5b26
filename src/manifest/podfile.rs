//! Podfile and Podfile.lock parsing

use super::ruby_call::find_declarations;
use crate::domain::{Requirement, RequirementSource};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static POD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^  - (?P<name>[^\s(]+) \((?P<version>[^)]+)\):?\s*$").unwrap());

static CHECKOUT_POD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^  (?P<name>\S+):\s*$").unwrap());

static CHECKOUT_OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^    :(?P<key>\w+): (?P<value>.+?)\s*$").unwrap());

const PODFILE_METHODS: &[&str] = &["pod"];

/// A pod declared in a Podfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodfileEntry {
    pub name: String,
    pub requirement: Requirement,
}

pub struct PodfileParser;

impl PodfileParser {
    pub fn parse(&self, file_name: &str, content: &str) -> Vec<PodfileEntry> {
        find_declarations(content, PODFILE_METHODS)
            .into_iter()
            .filter_map(|declaration| {
                let name = declaration.name()?.to_string();
                let requirement = match declaration.requirement_strings() {
                    // Pods without a requirement take the latest version
                    Some(strings) if strings.is_empty() => Requirement::new(file_name, ">= 0"),
                    Some(strings) => Requirement::new(file_name, strings.join(", ")),
                    None => Requirement::dynamic(file_name),
                };

                let requirement = match declaration.string_option("git") {
                    Some(url) => {
                        let mut source = RequirementSource::git(url);
                        if let Some(branch) = declaration.string_option("branch") {
                            source = source.with_branch(branch);
                        }
                        if let Some(reference) = declaration
                            .string_option("tag")
                            .or_else(|| declaration.string_option("commit"))
                        {
                            source = source.with_ref(reference);
                        }
                        requirement.with_source(source)
                    }
                    None => match declaration.string_option("path") {
                        Some(path) => requirement.with_source(RequirementSource::path(path)),
                        None => requirement,
                    },
                };

                Some(PodfileEntry {
                    name,
                    requirement: requirement.with_groups(["default"]),
                })
            })
            .collect()
    }
}

/// Root pod of a subspec name (`Firebase/Core` -> `Firebase`)
pub fn root_pod(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

/// A parsed Podfile.lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodfileLock {
    /// Root pod name to locked version, in file order
    pub pods: Vec<(String, String)>,
    /// Commit each git-sourced pod was checked out at
    pub checkout_commits: HashMap<String, String>,
    pub cocoapods_version: Option<String>,
}

impl PodfileLock {
    pub fn parse(content: &str) -> Self {
        let mut lock = PodfileLock::default();
        let mut section = "";
        let mut checkout_pod: Option<String> = None;

        for line in content.lines() {
            if !line.starts_with(' ') && !line.trim().is_empty() {
                section = line.trim_end();
                if let Some(version) = section.strip_prefix("COCOAPODS: ") {
                    lock.cocoapods_version = Some(version.trim().to_string());
                }
                continue;
            }
            match section {
                "PODS:" => {
                    if let Some(caps) = POD_RE.captures(line) {
                        let name = root_pod(&caps["name"]).to_string();
                        if !lock.pods.iter().any(|(n, _)| *n == name) {
                            lock.pods.push((name, caps["version"].to_string()));
                        }
                    }
                }
                "CHECKOUT OPTIONS:" => {
                    if let Some(caps) = CHECKOUT_POD_RE.captures(line) {
                        checkout_pod = Some(caps["name"].to_string());
                    } else if let (Some(caps), Some(pod)) =
                        (CHECKOUT_OPTION_RE.captures(line), checkout_pod.as_ref())
                    {
                        if &caps["key"] == "commit" {
                            lock.checkout_commits
                                .insert(pod.clone(), caps["value"].to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        lock
    }

    /// Locked version; the checked out commit for git pods
    pub fn locked_version(&self, name: &str) -> Option<String> {
        let root = root_pod(name);
        if let Some(commit) = self.checkout_commits.get(root) {
            return Some(commit.clone());
        }
        self.pods
            .iter()
            .find(|(n, _)| n == root)
            .map(|(_, v)| v.clone())
    }
}

//! Package manager tags and their static configuration tables

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Supported package managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// Ruby gems (Gemfile, *.gemspec, Gemfile.lock)
    Bundler,
    /// CocoaPods (Podfile, Podfile.lock)
    #[serde(rename = "cocoapods")]
    CocoaPods,
}

impl PackageManager {
    /// Identifier used in branch names and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Bundler => "bundler",
            PackageManager::CocoaPods => "cocoapods",
        }
    }

    /// Manifest filenames, in order of preference
    pub fn manifest_filenames(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Bundler => &["Gemfile", "gems.rb"],
            PackageManager::CocoaPods => &["Podfile"],
        }
    }

    pub fn lock_filenames(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Bundler => &["Gemfile.lock", "gems.locked"],
            PackageManager::CocoaPods => &["Podfile.lock"],
        }
    }

    pub fn registry_name(&self) -> &'static str {
        match self {
            PackageManager::Bundler => "RubyGems",
            PackageManager::CocoaPods => "CocoaPods Trunk",
        }
    }

    pub fn all() -> &'static [PackageManager] {
        &[PackageManager::Bundler, PackageManager::CocoaPods]
    }

    /// Parse a configuration value such as `bundler`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|pm| pm.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language label applied to pull requests for a package manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDetails {
    pub name: String,
    /// Hex colour without the leading `#`
    pub colour: String,
    pub description: Option<String>,
}

impl LabelDetails {
    pub fn new(name: impl Into<String>, colour: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colour: colour.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description, defaulting to one derived from the language name
    pub fn description_or_default(&self) -> String {
        match &self.description {
            Some(d) => d.clone(),
            None => {
                let mut chars = self.name.chars();
                let capitalized = match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                };
                format!("Pull requests that update {} code", capitalized)
            }
        }
    }
}

/// Native tool version policy for one package manager
#[derive(Debug, Clone)]
pub struct ToolVersionPolicy {
    pub supported: semver::VersionReq,
    pub deprecated: Option<semver::VersionReq>,
}

/// Per-package-manager configuration, built once and passed by reference
#[derive(Debug, Clone)]
pub struct PackageManagerTable {
    labels: HashMap<PackageManager, LabelDetails>,
    tool_versions: HashMap<PackageManager, ToolVersionPolicy>,
}

impl PackageManagerTable {
    pub fn empty() -> Self {
        Self {
            labels: HashMap::new(),
            tool_versions: HashMap::new(),
        }
    }

    pub fn with_label(mut self, package_manager: PackageManager, label: LabelDetails) -> Self {
        self.labels.insert(package_manager, label);
        self
    }

    pub fn with_tool_versions(
        mut self,
        package_manager: PackageManager,
        policy: ToolVersionPolicy,
    ) -> Self {
        self.tool_versions.insert(package_manager, policy);
        self
    }

    pub fn label_details(&self, package_manager: PackageManager) -> Option<&LabelDetails> {
        self.labels.get(&package_manager)
    }

    pub fn tool_versions(&self, package_manager: PackageManager) -> Option<&ToolVersionPolicy> {
        self.tool_versions.get(&package_manager)
    }
}

impl Default for PackageManagerTable {
    fn default() -> Self {
        let parse = |req: &str| semver::VersionReq::parse(req).ok();
        let mut table = Self::empty()
            .with_label(PackageManager::Bundler, LabelDetails::new("ruby", "ce2d2d"))
            .with_label(PackageManager::CocoaPods, LabelDetails::new("swift", "ffac45"));

        if let Some(supported) = parse(">=1.17.0, <3.0.0") {
            table = table.with_tool_versions(
                PackageManager::Bundler,
                ToolVersionPolicy {
                    supported,
                    deprecated: parse("<2.0.0"),
                },
            );
        }
        if let Some(supported) = parse(">=1.10.0, <2.0.0") {
            table = table.with_tool_versions(
                PackageManager::CocoaPods,
                ToolVersionPolicy {
                    supported,
                    deprecated: None,
                },
            );
        }
        table
    }
}

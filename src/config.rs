//! Job configuration
//!
//! A job is described by a `depbot.toml` file in the project directory:
//!
//! ```toml
//! package_manager = "bundler"
//! update_strategy = "bump_versions"
//!
//! [[ignore]]
//! dependency_name = "rails"
//! versions = [">= 7"]
//!
//! [source]
//! provider = "github"
//! repo = "acme/app"
//!
//! [[credentials]]
//! type = "git_source"
//! host = "github.com"
//! token = "..."
//!
//! [pull_request]
//! reviewers = ["octocat"]
//!
//! [helper]
//! runtime = "ruby"
//! timeout_seconds = 900
//! ```
//!
//! `DEPBOT_HELPERS_PATH` and `DEPBOT_NATIVE_HELPERS_TIMEOUT` override the
//! helper settings.

use crate::domain::{Credential, GemRequirement, PackageManager, Source};
use crate::error::ConfigError;
use crate::pull_request::PullRequestOptions;
use crate::resolver::{resolve_helper_path, resolve_timeout, HELPERS_PATH_ENV, HELPERS_TIMEOUT_ENV};
use crate::update::{UpdateFilter, UpdateStrategy};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "depbot.toml";

/// Versions of one dependency that must never be proposed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IgnoreCondition {
    pub dependency_name: String,
    /// Requirement strings such as `>= 7` or `~> 6.1.0`; empty ignores everything
    #[serde(default)]
    pub versions: Vec<String>,
}

/// How the native helper is run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    pub runtime: Option<String>,
    pub path: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub package_manager: PackageManager,
    /// Repository directory of the manifests, e.g. `/` or `/apps/web`
    pub directory: String,
    /// Derived per dependency when unset
    pub update_strategy: Option<UpdateStrategy>,
    pub ignore: Vec<IgnoreCondition>,
    pub reject_external_code: bool,
    pub fail_on_unsupported_tool_version: bool,
    pub source: Option<Source>,
    pub credentials: Vec<Credential>,
    pub pull_request: PullRequestOptions,
    pub helper: HelperConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            package_manager: PackageManager::Bundler,
            directory: "/".to_string(),
            update_strategy: None,
            ignore: Vec::new(),
            reject_external_code: false,
            fail_on_unsupported_tool_version: false,
            source: None,
            credentials: Vec::new(),
            pull_request: PullRequestOptions::default(),
            helper: HelperConfig::default(),
        }
    }
}

impl JobConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: JobConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `depbot.toml` in `dir` when present, defaults otherwise
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(source) = &self.source {
            if source.repo.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "source.repo".to_string(),
                    value: source.repo.clone(),
                    message: "repository must not be empty".to_string(),
                });
            }
        }
        for condition in &self.ignore {
            for version in &condition.versions {
                GemRequirement::parse(version).map_err(|e| ConfigError::InvalidValue {
                    key: format!("ignore.{}", condition.dependency_name),
                    value: version.clone(),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Source for pull requests, required by `pr`
    pub fn require_source(&self) -> Result<&Source, ConfigError> {
        self.source.as_ref().ok_or_else(|| ConfigError::Missing {
            key: "source".to_string(),
        })
    }

    /// Ignore conditions as an update filter
    pub fn update_filter(&self) -> UpdateFilter {
        let mut filter = UpdateFilter::new();
        for condition in &self.ignore {
            if condition.versions.is_empty() {
                filter = filter.with_ignored(&condition.dependency_name, GemRequirement::default_requirement());
            }
            // validate() already rejected unparseable requirements
            for requirement in condition.versions.iter().filter_map(|v| GemRequirement::parse(v).ok()) {
                filter = filter.with_ignored(&condition.dependency_name, requirement);
            }
        }
        filter
    }

    pub fn helper_runtime(&self) -> String {
        self.helper.runtime.clone().unwrap_or_else(|| "ruby".to_string())
    }

    pub fn helper_path(&self) -> PathBuf {
        self.helper_path_with_env(std::env::var(HELPERS_PATH_ENV).ok().as_deref())
    }

    fn helper_path_with_env(&self, env_value: Option<&str>) -> PathBuf {
        let default = PathBuf::from(format!("helpers/{}/run.rb", self.package_manager.as_str()));
        resolve_helper_path(env_value, self.helper.path.as_deref(), &default)
    }

    pub fn helper_timeout(&self) -> Duration {
        resolve_timeout(
            std::env::var(HELPERS_TIMEOUT_ENV).ok().as_deref(),
            self.helper.timeout_seconds,
        )
    }
}

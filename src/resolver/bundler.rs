//! Bundler resolution through the Ruby helper
//!
//! Native error classes raised by Bundler are mapped onto typed errors so
//! callers can tell a conflict from an unevaluatable Gemfile.

use super::{parse_conflicts, HelperSubprocess, ResolvedVersion, VersionResolver};
use crate::domain::{Credential, Dependency, DependencyFile, PackageManager};
use crate::error::{ManifestError, ResolverError};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use tracing::{debug, info};

static GIT_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"git reset --hard [^\s]*` in directory (?P<path>[^\s]*)").unwrap()
});

static PRIVATE_SOURCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bundle config (?P<repo>.*) username:password").unwrap());

pub struct BundlerResolver {
    helper: HelperSubprocess,
    credentials: Vec<Credential>,
}

#[derive(Deserialize)]
struct ToolVersion {
    #[serde(default)]
    version: Option<String>,
}

impl BundlerResolver {
    pub fn new(helper: HelperSubprocess, credentials: Vec<Credential>) -> Self {
        Self {
            helper,
            credentials,
        }
    }

    fn manifest_name(files: &[DependencyFile]) -> String {
        files
            .iter()
            .find(|f| matches!(f.name.as_str(), "Gemfile" | "gems.rb"))
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "Gemfile".to_string())
    }

    fn lockfile_name(files: &[DependencyFile]) -> Option<String> {
        files
            .iter()
            .find(|f| matches!(f.name.as_str(), "Gemfile.lock" | "gems.locked"))
            .map(|f| f.name.clone())
    }

    fn base_args(&self, files: &[DependencyFile]) -> Value {
        json!({
            "gemfile_name": Self::manifest_name(files),
            "lockfile_name": Self::lockfile_name(files),
            "dependency_files": files,
            "credentials": self.credentials,
        })
    }

    /// Translate a native failure into the error callers branch on
    fn handle_error(
        &self,
        dependency: Option<&Dependency>,
        files: &[DependencyFile],
        error: ResolverError,
    ) -> ResolverError {
        let (error_class, message) = match &error {
            ResolverError::HelperFailed {
                error_class,
                message,
                ..
            } => (error_class.clone(), message.clone()),
            _ => return error,
        };
        let message = message.as_str();
        let dependency_name = dependency.map(|d| d.name.clone()).unwrap_or_default();
        let detail = format!("{} with message: {}", error_class, message);

        match error_class.as_str() {
            "Bundler::Dsl::DSLError" => {
                ManifestError::not_evaluatable(Self::manifest_name(files), detail).into()
            }
            "Bundler::Source::Git::MissingGitRevisionError" => {
                ResolverError::GitReferenceNotFound {
                    dependency: dependency_name,
                }
            }
            "Bundler::Source::Git::GitCommandError" => match GIT_REF_RE.captures(message) {
                Some(caps) => ResolverError::GitReferenceNotFound {
                    dependency: gem_name_from_checkout_path(&caps["path"]),
                },
                None => ResolverError::SourceNotReachable {
                    source_url: dependency
                        .and_then(|d| d.git_source())
                        .and_then(|s| s.url.clone())
                        .unwrap_or_default(),
                },
            },
            "Bundler::Fetcher::AuthenticationRequiredError" => {
                let source_url = PRIVATE_SOURCE_RE
                    .captures(message)
                    .map(|caps| caps["repo"].trim().to_string())
                    .unwrap_or_default();
                ResolverError::SourceNotReachable { source_url }
            }
            "Bundler::VersionConflict" => ResolverError::Conflict {
                dependency: dependency_name,
                conflicts: parse_conflicts(message),
            },
            "Bundler::GemNotFound" | "Gem::InvalidSpecificationException" => {
                ManifestError::NotResolvable {
                    path: Self::manifest_name(files).into(),
                    message: detail,
                }
                .into()
            }
            "RuntimeError" if message.contains("Unable to find a spec") => {
                ManifestError::NotResolvable {
                    path: Self::manifest_name(files).into(),
                    message: detail,
                }
                .into()
            }
            _ => error,
        }
    }
}

/// `/tmp/bundler/gems/business-a1b78a929dac` names gem `business`
fn gem_name_from_checkout_path(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    let parts: Vec<&str> = last.split('-').collect();
    match parts.split_last() {
        Some((_, name_parts)) if !name_parts.is_empty() => name_parts.join(""),
        _ => last.to_string(),
    }
}

#[async_trait]
impl VersionResolver for BundlerResolver {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Bundler
    }

    async fn resolve(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        unlock_requirements: bool,
    ) -> Result<Option<ResolvedVersion>, ResolverError> {
        let mut args = self.base_args(files);
        args["dependency_name"] = json!(dependency.name);
        args["dependency_requirements"] = json!(dependency.requirements);
        args["unlock_requirements"] = json!(unlock_requirements);

        let result = match self.helper.call("resolve_version", args, None).await {
            Ok(result) => result,
            Err(e) => {
                let mapped = self.handle_error(Some(dependency), files, e);
                // A conflict while unlocking a git dependency is most likely
                // caused by the update itself, so the update is skipped
                if mapped.is_conflict() && dependency.git_source().is_some() {
                    debug!(dependency = %dependency.name, "git dependency conflicts after unlocking");
                    return Ok(Some(ResolvedVersion::default()));
                }
                return Err(mapped);
            }
        };

        if result.is_null() {
            return Ok(None);
        }
        let resolved: ResolvedVersion = serde_json::from_value(result).map_err(|e| {
            ResolverError::HelperFailed {
                function: "resolve_version".to_string(),
                error_class: "JSON::ParserError".to_string(),
                message: e.to_string(),
                context: Box::default(),
            }
        })?;
        info!(
            dependency = %dependency.name,
            version = resolved.version.as_deref().unwrap_or("none"),
            "bundler resolved version"
        );
        Ok(Some(resolved))
    }

    async fn update_lockfile(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<String, ResolverError> {
        let mut args = self.base_args(files);
        args["updated_dependencies"] = json!(dependencies);

        let result = self
            .helper
            .call("update_lockfile", args, None)
            .await
            .map_err(|e| self.handle_error(dependencies.first(), files, e))?;

        match result {
            Value::String(content) => Ok(content),
            other => Err(ResolverError::HelperFailed {
                function: "update_lockfile".to_string(),
                error_class: "JSON::ParserError".to_string(),
                message: format!("expected lockfile content, got {}", other),
                context: Box::default(),
            }),
        }
    }

    async fn tool_version(&self) -> Result<Option<String>, ResolverError> {
        let result = self.helper.call("bundler_version", json!({}), None).await?;
        let parsed: ToolVersion = serde_json::from_value(result).unwrap_or(ToolVersion { version: None });
        Ok(parsed.version)
    }
}

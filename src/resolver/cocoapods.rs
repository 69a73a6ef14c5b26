//! CocoaPods resolution through the Ruby helper

use super::{parse_conflicts, HelperSubprocess, ResolvedVersion, VersionResolver};
use crate::domain::{Dependency, DependencyFile, PackageManager};
use crate::error::{ManifestError, ResolverError};
use async_trait::async_trait;
use serde_json::{json, Value};

const PODFILE: &str = "Podfile";

pub struct CocoaPodsResolver {
    helper: HelperSubprocess,
}

impl CocoaPodsResolver {
    pub fn new(helper: HelperSubprocess) -> Self {
        Self { helper }
    }

    fn handle_error(&self, dependency_name: &str, error: ResolverError) -> ResolverError {
        let (error_class, message) = match &error {
            ResolverError::HelperFailed {
                error_class,
                message,
                ..
            } => (error_class.clone(), message.clone()),
            _ => return error,
        };

        match error_class.as_str() {
            "Pod::DSLError" => ManifestError::not_evaluatable(PODFILE, message).into(),
            "Pod::Informative" if message.contains("could not find compatible versions") => {
                ResolverError::Conflict {
                    dependency: dependency_name.to_string(),
                    conflicts: parse_conflicts(&message),
                }
            }
            "Pod::Informative" | "Pod::NoSpecFoundError" => ManifestError::NotResolvable {
                path: PODFILE.into(),
                message,
            }
            .into(),
            _ => error,
        }
    }
}

#[async_trait]
impl VersionResolver for CocoaPodsResolver {
    fn package_manager(&self) -> PackageManager {
        PackageManager::CocoaPods
    }

    async fn resolve(
        &self,
        dependency: &Dependency,
        files: &[DependencyFile],
        unlock_requirements: bool,
    ) -> Result<Option<ResolvedVersion>, ResolverError> {
        let args = json!({
            "dependency_name": dependency.name,
            "dependency_requirements": dependency.requirements,
            "dependency_files": files,
            "unlock_requirements": unlock_requirements,
        });
        let result = self
            .helper
            .call("resolve_version", args, None)
            .await
            .map_err(|e| self.handle_error(&dependency.name, e))?;

        match result {
            Value::Null => Ok(None),
            Value::String(version) => Ok(Some(ResolvedVersion {
                version: Some(version),
                commit_sha: None,
            })),
            other => serde_json::from_value(other).map(Some).map_err(|e| {
                ResolverError::HelperFailed {
                    function: "resolve_version".to_string(),
                    error_class: "JSON::ParserError".to_string(),
                    message: e.to_string(),
                    context: Box::default(),
                }
            }),
        }
    }

    async fn update_lockfile(
        &self,
        dependencies: &[Dependency],
        files: &[DependencyFile],
    ) -> Result<String, ResolverError> {
        let name = dependencies.first().map(|d| d.name.as_str()).unwrap_or_default();
        let args = json!({
            "updated_dependencies": dependencies,
            "dependency_files": files,
        });
        let result = self
            .helper
            .call("update_lockfile", args, None)
            .await
            .map_err(|e| self.handle_error(name, e))?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ResolverError::HelperFailed {
                function: "update_lockfile".to_string(),
                error_class: "JSON::ParserError".to_string(),
                message: "expected lockfile content".to_string(),
                context: Box::default(),
            })
    }

    async fn tool_version(&self) -> Result<Option<String>, ResolverError> {
        let result = self.helper.call("cocoapods_version", json!({}), None).await?;
        Ok(result
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

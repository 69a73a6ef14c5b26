//! Dependency file updating and writing
//!
//! This module provides:
//! - FileUpdater, which splices updated requirements and git pins into
//!   manifests and regenerates lockfiles through the resolver
//! - ManifestWriter for writing updated files back to disk
//! - Dry-run mode support (no actual file modifications)

use super::lockfile::{reorder_git_sections, replace_lockfile_ending};
use super::{FileType, GitPinReplacer, GitSourceRemover, RequirementReplacer};
use crate::domain::{Dependency, DependencyFile, FileOperation, PackageManager, Requirement};
use crate::error::{AppError, ManifestError};
use crate::resolver::VersionResolver;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of updating a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileUpdate {
    Changed(DependencyFile),
    Unchanged,
}

impl FileUpdate {
    pub fn is_changed(&self) -> bool {
        matches!(self, FileUpdate::Changed(_))
    }
}

/// Applies updated dependencies to their dependency files
pub struct FileUpdater<'a> {
    dependencies: &'a [Dependency],
    files: &'a [DependencyFile],
    resolver: Option<&'a dyn VersionResolver>,
}

impl<'a> FileUpdater<'a> {
    pub fn new(dependencies: &'a [Dependency], files: &'a [DependencyFile]) -> Self {
        Self {
            dependencies,
            files,
            resolver: None,
        }
    }

    /// Resolver used to regenerate lockfiles
    pub fn with_resolver(mut self, resolver: Option<&'a dyn VersionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Only the files whose content changed
    pub async fn updated_dependency_files(&self) -> Result<Vec<DependencyFile>, AppError> {
        let mut updated = Vec::new();
        for file in self.files.iter().filter(|f| !f.support_file) {
            if let FileUpdate::Changed(file) = self.update_manifest(file)? {
                updated.push(file);
            }
        }

        if let FileUpdate::Changed(lockfile) = self.update_lockfile(&updated).await? {
            updated.push(lockfile);
        }

        info!(files = updated.len(), "updated dependency files");
        Ok(updated)
    }

    /// Rewrite one manifest; lockfiles and unknown files are unchanged
    pub fn update_manifest(&self, file: &DependencyFile) -> Result<FileUpdate, ManifestError> {
        let Some(file_type) = FileType::for_file(&file.name) else {
            return Ok(FileUpdate::Unchanged);
        };

        let mut content = file.content().to_string();
        for dependency in self.dependencies {
            let Some((new, previous)) = requirement_pair(dependency, &file.name) else {
                continue;
            };
            let before = content.clone();
            content = self.apply_requirement(dependency, file_type, new, previous, &content);
            content = apply_source(dependency, file_type, new, previous, &content);

            let requirement_changed = new.requirement.is_some()
                && previous.requirement.is_some()
                && new.requirement != previous.requirement;
            if requirement_changed && content == before {
                return Err(ManifestError::ContentUnchanged {
                    path: PathBuf::from(file.path()),
                    dependency: dependency.name.clone(),
                });
            }
        }

        if content == file.content() {
            debug!(file = %file.name, "no change");
            return Ok(FileUpdate::Unchanged);
        }
        Ok(FileUpdate::Changed(file.with_content(content)))
    }

    fn apply_requirement(
        &self,
        dependency: &Dependency,
        file_type: FileType,
        new: &Requirement,
        previous: &Requirement,
        content: &str,
    ) -> String {
        let (Some(new_text), Some(previous_text)) =
            (new.requirement.as_deref(), previous.requirement.as_deref())
        else {
            return content.to_string();
        };
        if new_text == previous_text {
            return content.to_string();
        }
        RequirementReplacer::new(&dependency.name, file_type, new_text)
            .with_previous_requirement(Some(previous_text))
            .rewrite(content)
    }

    async fn update_lockfile(&self, updated_manifests: &[DependencyFile]) -> Result<FileUpdate, AppError> {
        let Some(resolver) = self.resolver else {
            return Ok(FileUpdate::Unchanged);
        };
        let package_manager = resolver.package_manager();
        let Some(lockfile) = self
            .files
            .iter()
            .find(|f| package_manager.lock_filenames().contains(&f.name.as_str()))
        else {
            return Ok(FileUpdate::Unchanged);
        };

        // The resolver sees the manifests as they will be committed
        let files: Vec<DependencyFile> = self
            .files
            .iter()
            .map(|f| {
                updated_manifests
                    .iter()
                    .find(|u| u.name == f.name)
                    .cloned()
                    .unwrap_or_else(|| f.clone())
            })
            .collect();

        let regenerated = resolver.update_lockfile(self.dependencies, &files).await?;
        let regenerated = match package_manager {
            PackageManager::Bundler => {
                let reordered = reorder_git_sections(&regenerated, lockfile.content());
                replace_lockfile_ending(&reordered, lockfile.content())
            }
            PackageManager::CocoaPods => regenerated,
        };

        if regenerated == lockfile.content() {
            return Ok(FileUpdate::Unchanged);
        }
        Ok(FileUpdate::Changed(lockfile.with_content(regenerated)))
    }
}

fn requirement_pair<'d>(
    dependency: &'d Dependency,
    file: &str,
) -> Option<(&'d Requirement, &'d Requirement)> {
    let new = dependency.requirements.iter().find(|r| r.file == file)?;
    let previous = dependency
        .previous_requirements
        .as_ref()?
        .iter()
        .find(|r| r.file == file)?;
    Some((new, previous))
}

fn apply_source(
    dependency: &Dependency,
    file_type: FileType,
    new: &Requirement,
    previous: &Requirement,
    content: &str,
) -> String {
    let Some(previous_source) = previous.source.as_ref().filter(|s| s.is_git()) else {
        return content.to_string();
    };
    match &new.source {
        None => GitSourceRemover::new(&dependency.name, file_type).rewrite(content),
        Some(source) if source.reference != previous_source.reference => {
            match source.reference.as_deref() {
                Some(pin) => GitPinReplacer::new(&dependency.name, file_type, pin).rewrite(content),
                None => content.to_string(),
            }
        }
        Some(_) => content.to_string(),
    }
}

/// Result of writing updated files to disk
#[derive(Debug, Default)]
pub struct WriteResult {
    /// Repository paths written (or that would be written in dry-run mode)
    pub written: Vec<String>,
    /// Repository paths deleted
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

impl WriteResult {
    pub fn has_changes(&self) -> bool {
        !self.written.is_empty() || !self.deleted.is_empty()
    }
}

/// Writer for dependency files rooted at a checkout
pub struct ManifestWriter {
    /// Whether to run in dry-run mode (no file modifications)
    dry_run: bool,
}

impl ManifestWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Write each file under `root` at its repository path
    pub fn write_all(&self, root: &Path, files: &[DependencyFile]) -> Result<WriteResult, ManifestError> {
        let mut result = WriteResult {
            dry_run: self.dry_run,
            ..WriteResult::default()
        };

        for file in files {
            let relative = file.write_path();
            let path = root.join(&relative);
            match file.operation {
                FileOperation::Delete => {
                    if !self.dry_run && path.exists() {
                        fs::remove_file(&path).map_err(|e| ManifestError::write_error(&path, e))?;
                    }
                    result.deleted.push(relative);
                }
                FileOperation::Update | FileOperation::Create => {
                    if !self.dry_run {
                        if let Some(parent) = path.parent() {
                            fs::create_dir_all(parent)
                                .map_err(|e| ManifestError::write_error(parent, e))?;
                        }
                        fs::write(&path, file.content())
                            .map_err(|e| ManifestError::write_error(&path, e))?;
                    }
                    result.written.push(relative);
                }
            }
        }
        Ok(result)
    }
}

/// Read a dependency file as text
pub fn read_file(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequirementSource;
    use crate::error::ResolverError;
    use crate::resolver::ResolvedVersion;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn business_update(previous: &str, new: &str) -> Dependency {
        let original = Dependency::new(
            "business",
            Some("1.4.0".to_string()),
            vec![Requirement::new("Gemfile", previous).with_groups(["default"])],
            PackageManager::Bundler,
        );
        original.updated(
            Some("1.13.0".to_string()),
            vec![Requirement::new("Gemfile", new).with_groups(["default"])],
        )
    }

    struct FakeLockResolver {
        lockfile: String,
    }

    #[async_trait]
    impl VersionResolver for FakeLockResolver {
        fn package_manager(&self) -> PackageManager {
            PackageManager::Bundler
        }

        async fn resolve(
            &self,
            _dependency: &Dependency,
            _files: &[DependencyFile],
            _unlock_requirements: bool,
        ) -> Result<Option<ResolvedVersion>, ResolverError> {
            Ok(None)
        }

        async fn update_lockfile(
            &self,
            _dependencies: &[Dependency],
            files: &[DependencyFile],
        ) -> Result<String, ResolverError> {
            assert!(files
                .iter()
                .any(|f| f.name == "Gemfile" && f.content().contains("~> 1.13.0")));
            Ok(self.lockfile.clone())
        }

        async fn tool_version(&self) -> Result<Option<String>, ResolverError> {
            Ok(None)
        }
    }

    #[test]
    fn test_manifest_rewritten() {
        let dependencies = vec![business_update("~> 1.4.0", "~> 1.13.0")];
        let files = vec![DependencyFile::new(
            "Gemfile",
            "gem \"business\", \"~> 1.4.0\"\ngem \"statesman\", \"~> 1.2.0\"\n",
        )];
        let updater = FileUpdater::new(&dependencies, &files);
        let FileUpdate::Changed(file) = updater.update_manifest(&files[0]).unwrap() else {
            panic!("expected Gemfile to change");
        };
        assert_eq!(
            file.content(),
            "gem \"business\", \"~> 1.13.0\"\ngem \"statesman\", \"~> 1.2.0\"\n"
        );
    }

    #[test]
    fn test_unchanged_requirement_reports_unchanged() {
        let dependencies = vec![business_update("~> 1.4", "~> 1.4")];
        let files = vec![DependencyFile::new("Gemfile", "gem \"business\", \"~> 1.4\"\n")];
        let updater = FileUpdater::new(&dependencies, &files);
        assert_eq!(updater.update_manifest(&files[0]).unwrap(), FileUpdate::Unchanged);
    }

    #[test]
    fn test_missing_declaration_is_an_error() {
        let dependencies = vec![business_update("~> 1.4.0", "~> 1.13.0")];
        let files = vec![DependencyFile::new("Gemfile", "gem \"statesman\"\n")];
        let err = FileUpdater::new(&dependencies, &files)
            .update_manifest(&files[0])
            .unwrap_err();
        assert!(matches!(err, ManifestError::ContentUnchanged { .. }));
    }

    #[test]
    fn test_git_pin_moved_and_removed() {
        let source = RequirementSource::git("https://github.com/gocardless/business");
        let original = Dependency::new(
            "business",
            Some("a1b78a929dac93a52f08db4f2847d76d6cfe39bd".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(source.clone().with_ref("v1.4.0"))],
            PackageManager::Bundler,
        );
        let files = vec![DependencyFile::new(
            "Gemfile",
            "gem \"business\", git: \"https://github.com/gocardless/business\", tag: \"v1.4.0\"\n",
        )];

        let moved = vec![original.updated(
            Some("cccccccccccccccccccccccccccccccccccccccc".to_string()),
            vec![Requirement::new("Gemfile", ">= 0").with_source(source.with_ref("v1.5.0"))],
        )];
        let FileUpdate::Changed(file) = FileUpdater::new(&moved, &files).update_manifest(&files[0]).unwrap()
        else {
            panic!("expected the pin to move");
        };
        assert!(file.content().contains("tag: \"v1.5.0\""));

        let released = vec![original.updated(
            Some("1.5.0".to_string()),
            vec![Requirement::new("Gemfile", ">= 0")],
        )];
        let FileUpdate::Changed(file) = FileUpdater::new(&released, &files).update_manifest(&files[0]).unwrap()
        else {
            panic!("expected the git source to be removed");
        };
        assert_eq!(file.content(), "gem \"business\"\n");
    }

    #[tokio::test]
    async fn test_lockfile_regenerated_with_original_ending() {
        let dependencies = vec![business_update("~> 1.4.0", "~> 1.13.0")];
        let files = vec![
            DependencyFile::new("Gemfile", "gem \"business\", \"~> 1.4.0\"\n"),
            DependencyFile::new(
                "Gemfile.lock",
                "GEM\n  specs:\n    business (1.4.0)\n\nBUNDLED WITH\n   1.17.3\n",
            ),
            DependencyFile::new(".ruby-version", "2.6.3\n").as_support_file(),
        ];
        let resolver = FakeLockResolver {
            lockfile: "GEM\n  specs:\n    business (1.13.0)\n\nBUNDLED WITH\n   2.4.10\n".to_string(),
        };
        let updated = FileUpdater::new(&dependencies, &files)
            .with_resolver(Some(&resolver))
            .updated_dependency_files()
            .await
            .unwrap();

        let names: Vec<&str> = updated.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Gemfile", "Gemfile.lock"]);
        assert_eq!(
            updated[1].content(),
            "GEM\n  specs:\n    business (1.13.0)\n\nBUNDLED WITH\n   1.17.3\n"
        );
    }

    #[test]
    fn test_writer_dry_run_and_write() {
        let dir = TempDir::new().unwrap();
        let files = vec![DependencyFile::new("Gemfile", "gem \"business\"\n").with_directory("/app")];

        let result = ManifestWriter::new(true).write_all(dir.path(), &files).unwrap();
        assert!(result.dry_run);
        assert_eq!(result.written, vec!["app/Gemfile"]);
        assert!(!dir.path().join("app/Gemfile").exists());

        let result = ManifestWriter::new(false).write_all(dir.path(), &files).unwrap();
        assert!(result.has_changes());
        assert_eq!(
            read_file(&dir.path().join("app/Gemfile")).unwrap(),
            "gem \"business\"\n"
        );
    }
}

//! Dependency file loading, parsing and updating
//!
//! This module provides functionality to:
//! - Load a package manager's dependency files from a directory
//! - Parse dependencies from Gemfiles, gemspecs, Podfiles and their lockfiles
//! - Rewrite requirements and git pins in place
//! - Produce the updated dependency files for a set of updated dependencies

mod bundler;
mod cocoapods;
mod gemfile;
mod gemspec;
mod git_pin_replacer;
mod lockfile;
mod podfile;
mod requirement_replacer;
mod ruby_call;
mod updater;

pub use bundler::BundlerFileParser;
pub use cocoapods::CocoaPodsFileParser;
pub use gemfile::{GemfileEntry, GemfileParser, DEFAULT_REQUIREMENT};
pub use gemspec::{GemspecEntry, GemspecParser};
pub use git_pin_replacer::{GitPinReplacer, GitSourceRemover};
pub use lockfile::{
    reorder_git_sections, replace_lockfile_ending, LockSection, LockedSpec, Lockfile, SectionKind,
};
pub use podfile::{root_pod, PodfileEntry, PodfileLock, PodfileParser};
pub use requirement_replacer::{FileType, RequirementReplacer};
pub use updater::{read_file, FileUpdate, FileUpdater, ManifestWriter, WriteResult};

use crate::domain::{Dependency, DependencyFile, PackageManager, Requirement};
use crate::error::ManifestError;
use std::fs;
use std::path::Path;

/// Parses a package manager's dependency files into dependencies
pub trait FileParser: Send + Sync {
    fn package_manager(&self) -> PackageManager;

    /// Top-level dependencies and lockfile-only subdependencies
    fn parse(&self, files: &[DependencyFile]) -> Result<Vec<Dependency>, ManifestError>;
}

/// Options shared by every parser
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Fail when git sources are declared
    pub reject_external_code: bool,
}

/// Get a file parser for the given package manager
pub fn create_parser(package_manager: PackageManager, options: ParserOptions) -> Box<dyn FileParser> {
    match package_manager {
        PackageManager::Bundler => Box::new(BundlerFileParser::new(options)),
        PackageManager::CocoaPods => Box::new(CocoaPodsFileParser::new(options)),
    }
}

/// Rejects git-sourced dependencies when external code is not allowed
pub(crate) fn check_external_code(
    dependencies: &[Dependency],
    options: ParserOptions,
) -> Result<(), ManifestError> {
    if !options.reject_external_code {
        return Ok(());
    }
    for dependency in dependencies {
        for requirement in &dependency.requirements {
            if let Some(source) = requirement.source.as_ref().filter(|s| s.is_git()) {
                return Err(ManifestError::unexpected_external_code(
                    &requirement.file,
                    source.url.clone().unwrap_or_default(),
                ));
            }
        }
    }
    Ok(())
}

/// Dependencies keyed by name, merging declarations from several files
#[derive(Debug, Default)]
pub struct DependencySet {
    dependencies: Vec<Dependency>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a declaration into the set; requirements accumulate and the
    /// first known version wins
    pub fn add(
        &mut self,
        name: &str,
        version: Option<String>,
        requirement: Option<Requirement>,
        package_manager: PackageManager,
    ) {
        if let Some(existing) = self.dependencies.iter_mut().find(|d| d.name == name) {
            if existing.version.is_none() {
                existing.version = version;
            }
            if let Some(requirement) = requirement {
                if !existing.requirements.contains(&requirement) {
                    existing.requirements.push(requirement);
                }
                existing.subdependency = false;
            }
            return;
        }

        let requirements: Vec<Requirement> = requirement.into_iter().collect();
        let dependency = Dependency::new(name, version, requirements, package_manager);
        let dependency = if dependency.requirements.is_empty() {
            dependency.as_subdependency()
        } else {
            dependency
        };
        self.dependencies.push(dependency);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.name.as_str())
    }

    pub fn into_dependencies(self) -> Vec<Dependency> {
        self.dependencies
    }
}

/// Read a package manager's manifests and lockfiles from `dir`
///
/// Gemspecs in the top-level directory are included for Bundler. Returns
/// `ManifestError::NotFound` when no manifest exists.
pub fn load_dependency_files(
    dir: &Path,
    package_manager: PackageManager,
    directory: &str,
) -> Result<Vec<DependencyFile>, ManifestError> {
    let mut names: Vec<String> = package_manager
        .manifest_filenames()
        .iter()
        .chain(package_manager.lock_filenames())
        .map(|n| n.to_string())
        .collect();

    if package_manager == PackageManager::Bundler {
        let entries = fs::read_dir(dir).map_err(|e| ManifestError::read_error(dir, e))?;
        let mut gemspecs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|n| n.ends_with(".gemspec"))
            .collect();
        gemspecs.sort();
        names.extend(gemspecs);
        names.push(".ruby-version".to_string());
    }

    let mut files = Vec::new();
    for name in names {
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        let content = read_file(&path)?;
        let file = DependencyFile::new(name.clone(), content).with_directory(directory);
        let file = if name == ".ruby-version" {
            file.as_support_file()
        } else {
            file
        };
        files.push(file);
    }

    let has_manifest = files.iter().any(|f| {
        package_manager.manifest_filenames().contains(&f.name.as_str()) || f.name.ends_with(".gemspec")
    });
    if !has_manifest {
        return Err(ManifestError::not_found(
            dir.join(package_manager.manifest_filenames()[0]),
        ));
    }
    Ok(files)
}

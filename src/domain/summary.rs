//! Update result summary types
//!
//! Tracks the outcome of one job: one result per top-level dependency plus
//! the files that changed.

use super::{Dependency, PackageManager, UpdateResult};
use serde::{Deserialize, Serialize};

/// Overall summary of one update job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub package_manager: PackageManager,
    /// Repository directory of the manifests
    pub directory: String,
    pub results: Vec<UpdateResult>,
    /// Repository paths of the files that changed
    pub changed_files: Vec<String>,
    /// Whether files were left untouched on disk
    pub dry_run: bool,
}

impl UpdateSummary {
    pub fn new(package_manager: PackageManager, directory: impl Into<String>, dry_run: bool) -> Self {
        Self {
            package_manager,
            directory: directory.into(),
            results: Vec::new(),
            changed_files: Vec::new(),
            dry_run,
        }
    }

    pub fn add_result(&mut self, result: UpdateResult) {
        self.results.push(result);
    }

    pub fn updates(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| r.is_update())
    }

    pub fn skips(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| r.is_skip())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UpdateResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn total_updates(&self) -> usize {
        self.updates().count()
    }

    pub fn total_skips(&self) -> usize {
        self.skips().count()
    }

    pub fn has_updates(&self) -> bool {
        self.total_updates() > 0
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Updated dependencies, ready for file updating
    pub fn updated_dependencies(&self) -> Vec<Dependency> {
        self.updates().map(|r| r.dependency().clone()).collect()
    }
}

//! Update filter configuration
//!
//! This module provides the UpdateFilter struct that encapsulates
//! which dependencies a job looks at and which releases it may move to.

use crate::domain::{GemRequirement, GemVersion};
use std::collections::HashMap;
use std::time::Duration;

/// Filter configuration for update checking
#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    /// Dependencies to leave alone
    pub exclude: Vec<String>,
    /// If non-empty, only update these dependencies
    pub only: Vec<String>,
    /// Per-dependency version ranges that must never be proposed
    pub ignored_versions: HashMap<String, Vec<GemRequirement>>,
    /// Minimum age for releases to be considered
    pub min_age: Option<Duration>,
}

impl UpdateFilter {
    /// Create a new UpdateFilter with default settings (process all)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set dependencies to exclude
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Set dependencies to include (only list)
    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.only = only;
        self
    }

    /// Ignore every version of `name` matched by `requirement`
    pub fn with_ignored(mut self, name: impl Into<String>, requirement: GemRequirement) -> Self {
        self.ignored_versions
            .entry(name.into())
            .or_default()
            .push(requirement);
        self
    }

    /// Set minimum age for releases
    pub fn with_min_age(mut self, age: Duration) -> Self {
        self.min_age = Some(age);
        self
    }

    /// Check if a dependency should be processed based on filters
    pub fn should_process(&self, name: &str) -> bool {
        // --only wins over --exclude
        if !self.only.is_empty() {
            return self.only.iter().any(|p| p == name);
        }
        !self.exclude.iter().any(|p| p == name)
    }

    /// Ignore requirements that apply to a dependency
    pub fn ignored_for(&self, name: &str) -> &[GemRequirement] {
        self.ignored_versions
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_ignored(&self, name: &str, version: &GemVersion) -> bool {
        self.ignored_for(name).iter().any(|r| r.satisfied_by(version))
    }
}

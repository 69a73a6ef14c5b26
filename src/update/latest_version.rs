//! Picks the newest release a dependency may move to

use super::{UpdateFilter, VersionInfo};
use crate::domain::{Dependency, GemRequirement, GemVersion};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Selects the latest eligible release from a registry listing
pub struct LatestVersionFinder<'a> {
    filter: &'a UpdateFilter,
    now: DateTime<Utc>,
}

impl<'a> LatestVersionFinder<'a> {
    pub fn new(filter: &'a UpdateFilter) -> Self {
        Self {
            filter,
            now: Utc::now(),
        }
    }

    /// Fix the clock (for testing)
    pub fn with_time(filter: &'a UpdateFilter, now: DateTime<Utc>) -> Self {
        Self { filter, now }
    }

    /// Prereleases are only proposed to dependencies already using one
    pub fn wants_prerelease(dependency: &Dependency) -> bool {
        if dependency
            .numeric_version()
            .is_some_and(|v| v.is_prerelease())
        {
            return true;
        }
        dependency
            .requirements
            .iter()
            .filter_map(|r| r.requirement.as_deref())
            .filter_map(|r| GemRequirement::parse(r).ok())
            .any(|r| r.mentions_prerelease())
    }

    pub fn latest_version(
        &self,
        dependency: &Dependency,
        available: &[VersionInfo],
    ) -> Option<GemVersion> {
        let wants_prerelease = Self::wants_prerelease(dependency);
        let min_release_time = self
            .filter
            .min_age
            .and_then(|age| chrono::Duration::from_std(age).ok())
            .map(|age| self.now - age);

        let latest = available
            .iter()
            .filter(|info| !info.yanked)
            .filter(|info| match (min_release_time, info.released_at) {
                (Some(cutoff), Some(released_at)) => released_at <= cutoff,
                _ => true,
            })
            .filter_map(VersionInfo::gem_version)
            .filter(|v| wants_prerelease || !v.is_prerelease())
            .filter(|v| !self.filter.is_ignored(&dependency.name, v))
            .max();

        debug!(
            dependency = %dependency.name,
            latest = latest.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            candidates = available.len(),
            "selected latest version"
        );
        latest
    }
}

//! Version information from registry
//!
//! This module provides the VersionInfo struct that represents
//! a published release with its release date and yank state.

use crate::domain::GemVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about a package version from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The version string (e.g., "1.2.3")
    pub version: String,
    /// When this version was released, if the registry says
    pub released_at: Option<DateTime<Utc>>,
    /// Yanked releases are listed by some registries but never installed
    #[serde(default)]
    pub yanked: bool,
}

impl VersionInfo {
    /// Create a new VersionInfo
    pub fn new(version: impl Into<String>, released_at: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            released_at: Some(released_at),
            yanked: false,
        }
    }

    /// Create a VersionInfo without a release date
    pub fn undated(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            released_at: None,
            yanked: false,
        }
    }

    pub fn yanked(mut self) -> Self {
        self.yanked = true;
        self
    }

    /// The parsed version; `None` for strings RubyGems would reject
    pub fn gem_version(&self) -> Option<GemVersion> {
        GemVersion::parse(&self.version).ok()
    }
}

//! Update decision result types

use super::{Dependency, Requirement};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason why a dependency update was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Package was excluded via --exclude
    Excluded,
    /// Package not in --only list
    NotInOnlyList,
    /// No newer version the resolver accepts
    UpToDate,
    /// Checking or updating failed
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Excluded => write!(f, "excluded by --exclude"),
            SkipReason::NotInOnlyList => write!(f, "not in --only list"),
            SkipReason::UpToDate => write!(f, "up to date"),
            SkipReason::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Result of an update decision for a single dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateResult {
    /// The updated dependency, carrying its previous version and requirements
    Update { dependency: Dependency },
    Skip {
        dependency: Dependency,
        reason: SkipReason,
    },
}

impl UpdateResult {
    pub fn update(dependency: Dependency) -> Self {
        UpdateResult::Update { dependency }
    }

    pub fn skip(dependency: Dependency, reason: SkipReason) -> Self {
        UpdateResult::Skip { dependency, reason }
    }

    pub fn skip_failed(dependency: Dependency, message: impl Into<String>) -> Self {
        Self::skip(dependency, SkipReason::Failed(message.into()))
    }

    pub fn is_update(&self) -> bool {
        matches!(self, UpdateResult::Update { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, UpdateResult::Skip { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpdateResult::Skip {
                reason: SkipReason::Failed(_),
                ..
            }
        )
    }

    pub fn dependency(&self) -> &Dependency {
        match self {
            UpdateResult::Update { dependency } => dependency,
            UpdateResult::Skip { dependency, .. } => dependency,
        }
    }

    pub fn name(&self) -> &str {
        &self.dependency().name
    }

    /// Requirement entries whose text or source changed, as (old, new) pairs
    pub fn changed_requirements(&self) -> Vec<(&Requirement, &Requirement)> {
        let UpdateResult::Update { dependency } = self else {
            return Vec::new();
        };
        let previous = dependency.previous_requirements.as_deref().unwrap_or(&[]);
        dependency
            .requirements
            .iter()
            .filter_map(|new| {
                let old = previous.iter().find(|p| p.file == new.file && p.groups == new.groups)?;
                (old != new).then_some((old, new))
            })
            .collect()
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateResult::Update { dependency } => write!(
                f,
                "{}: {} -> {}",
                dependency.name,
                dependency.display_previous_version().unwrap_or_else(|| "-".to_string()),
                dependency.display_version().unwrap_or_else(|| "-".to_string())
            ),
            UpdateResult::Skip { dependency, reason } => {
                write!(f, "{}: skipped ({})", dependency.name, reason)
            }
        }
    }
}

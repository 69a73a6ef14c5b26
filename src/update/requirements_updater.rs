//! Rewrites requirement strings so they admit a new version
//!
//! Gemfile declarations keep their operator family: `~> 1.4.0` becomes
//! `~> 1.13.0`, exact pins move to the new version and ranges have their
//! ceilings raised. Gemspec declarations of libraries are widened instead,
//! so `~> 1.4.0` becomes `>= 1.4, < 1.14` and existing users keep working.

use crate::domain::{Clause, GemRequirement, GemVersion, Operator, Requirement, RequirementSource};
use crate::error::RequirementError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How aggressively requirements are rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Only the lockfile changes; requirements stay as they are
    #[serde(alias = "lock_file_only")]
    LockfileOnly,
    /// Every requirement is moved to the new version
    BumpVersions,
    /// Requirements are touched only when they exclude the new version
    BumpVersionsIfNecessary,
}

impl UpdateStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lockfile_only" | "lock_file_only" => Some(UpdateStrategy::LockfileOnly),
            "bump_versions" => Some(UpdateStrategy::BumpVersions),
            "bump_versions_if_necessary" => Some(UpdateStrategy::BumpVersionsIfNecessary),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateStrategy::LockfileOnly => "lockfile_only",
            UpdateStrategy::BumpVersions => "bump_versions",
            UpdateStrategy::BumpVersionsIfNecessary => "bump_versions_if_necessary",
        };
        f.write_str(name)
    }
}

/// Outcome for one requirement entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "requirement", rename_all = "snake_case")]
pub enum RequirementUpdate {
    /// Nothing needed to change
    Unchanged(Requirement),
    /// The requirement string or source was rewritten
    Updated(Requirement),
    /// The declaration can never admit the new version (e.g. a `>=` floor
    /// above it in a gemspec)
    Unfixable(Requirement),
    /// The declaration is not a literal, so it cannot be rewritten safely
    Unlockable(Requirement),
}

impl RequirementUpdate {
    pub fn requirement(&self) -> &Requirement {
        match self {
            RequirementUpdate::Unchanged(r)
            | RequirementUpdate::Updated(r)
            | RequirementUpdate::Unfixable(r)
            | RequirementUpdate::Unlockable(r) => r,
        }
    }

    pub fn into_requirement(self) -> Requirement {
        match self {
            RequirementUpdate::Unchanged(r)
            | RequirementUpdate::Updated(r)
            | RequirementUpdate::Unfixable(r)
            | RequirementUpdate::Unlockable(r) => r,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, RequirementUpdate::Updated(_))
    }

    pub fn is_unfixable(&self) -> bool {
        matches!(self, RequirementUpdate::Unfixable(_))
    }

    pub fn is_unlockable(&self) -> bool {
        matches!(self, RequirementUpdate::Unlockable(_))
    }

    /// Short status tag used in reports
    pub fn status(&self) -> &'static str {
        match self {
            RequirementUpdate::Unchanged(_) => "unchanged",
            RequirementUpdate::Updated(_) => "updated",
            RequirementUpdate::Unfixable(_) => "unfixable",
            RequirementUpdate::Unlockable(_) => "unlockable",
        }
    }
}

struct Unfixable;

enum Rewrite {
    Keep,
    Replace(String),
    Unfixable,
}

/// A standalone requirements update, as read by `depbot requirements`
#[derive(Debug, Clone, Deserialize)]
pub struct RequirementsRequest {
    pub requirements: Vec<Requirement>,
    /// Derived from the entries when unset: gemspecs widen, Gemfiles bump
    #[serde(default)]
    pub update_strategy: Option<UpdateStrategy>,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub latest_resolvable_version: Option<String>,
    #[serde(default)]
    pub updated_source: Option<RequirementSource>,
}

impl RequirementsRequest {
    pub fn strategy(&self) -> UpdateStrategy {
        if let Some(strategy) = self.update_strategy {
            return strategy;
        }
        if self.requirements.iter().any(Requirement::is_gemspec) {
            UpdateStrategy::BumpVersionsIfNecessary
        } else {
            UpdateStrategy::BumpVersions
        }
    }

    pub fn updater(&self) -> Result<RequirementsUpdater, RequirementError> {
        let parse = |version: &Option<String>| {
            version
                .as_deref()
                .map(|v| {
                    GemVersion::parse(v).map_err(|_| RequirementError::MalformedVersion {
                        version: v.to_string(),
                    })
                })
                .transpose()
        };
        Ok(RequirementsUpdater::new(self.requirements.clone(), self.strategy())
            .with_updated_source(self.updated_source.clone())
            .with_latest_version(parse(&self.latest_version)?)
            .with_latest_resolvable_version(parse(&self.latest_resolvable_version)?))
    }
}

/// Computes new requirement entries for one dependency
#[derive(Debug, Clone)]
pub struct RequirementsUpdater {
    requirements: Vec<Requirement>,
    strategy: UpdateStrategy,
    updated_source: Option<RequirementSource>,
    latest_version: Option<GemVersion>,
    latest_resolvable_version: Option<GemVersion>,
}

impl RequirementsUpdater {
    pub fn new(requirements: Vec<Requirement>, strategy: UpdateStrategy) -> Self {
        Self {
            requirements,
            strategy,
            updated_source: None,
            latest_version: None,
            latest_resolvable_version: None,
        }
    }

    /// Source that Gemfile entries (and sourced gemspec entries) move to
    pub fn with_updated_source(mut self, source: Option<RequirementSource>) -> Self {
        self.updated_source = source;
        self
    }

    pub fn with_latest_version(mut self, version: Option<GemVersion>) -> Self {
        self.latest_version = version;
        self
    }

    pub fn with_latest_resolvable_version(mut self, version: Option<GemVersion>) -> Self {
        self.latest_resolvable_version = version;
        self
    }

    /// One outcome per input entry, in input order
    pub fn updated_requirements(&self) -> Result<Vec<RequirementUpdate>, RequirementError> {
        self.requirements.iter().map(|r| self.update_entry(r)).collect()
    }

    fn update_entry(&self, original: &Requirement) -> Result<RequirementUpdate, RequirementError> {
        if self.strategy == UpdateStrategy::LockfileOnly {
            return Ok(RequirementUpdate::Unchanged(original.clone()));
        }

        let mut updated = original.clone();
        if !original.is_gemspec() || original.source.is_some() {
            updated.source = self.updated_source.clone();
        }

        let Some(text) = original.requirement.as_deref() else {
            debug!(file = %original.file, "requirement is not a literal; leaving it alone");
            return Ok(RequirementUpdate::Unlockable(updated));
        };

        let clauses = parse_clauses(&original.file, text)?;

        let outcome = if original.is_gemspec() && self.strategy != UpdateStrategy::BumpVersions {
            self.update_gemspec_requirement(&clauses, original)
        } else if original.is_gemspec() {
            match self.update_gemfile_requirement(&clauses, original) {
                Err(RequirementError::UnexpectedOperation { .. }) => Ok(Rewrite::Unfixable),
                other => other,
            }
        } else {
            self.update_gemfile_requirement(&clauses, original)
        };
        let rewrite = outcome?;

        match rewrite {
            Rewrite::Unfixable => {
                debug!(file = %original.file, requirement = text, "requirement is unfixable");
                return Ok(RequirementUpdate::Unfixable(updated));
            }
            Rewrite::Replace(new_text) => updated.requirement = Some(new_text),
            Rewrite::Keep => {}
        }

        if updated == *original {
            Ok(RequirementUpdate::Unchanged(updated))
        } else {
            debug!(
                file = %original.file,
                from = text,
                to = updated.requirement.as_deref().unwrap_or_default(),
                "rewrote requirement"
            );
            Ok(RequirementUpdate::Updated(updated))
        }
    }

    fn update_gemfile_requirement(
        &self,
        clauses: &[Clause],
        original: &Requirement,
    ) -> Result<Rewrite, RequirementError> {
        let Some(target) = &self.latest_resolvable_version else {
            return Ok(Rewrite::Keep);
        };

        if self.strategy == UpdateStrategy::BumpVersionsIfNecessary
            && clauses.iter().all(|c| c.satisfied_by(target))
        {
            return Ok(Rewrite::Keep);
        }

        if clauses.iter().any(|c| c.op == Operator::Eq) {
            return Ok(Rewrite::Replace(target.to_string()));
        }

        if let Some(twiddle) = clauses.iter().find(|c| c.op == Operator::Pessimistic) {
            return Ok(Rewrite::Replace(update_twiddle_version(twiddle, target).to_string()));
        }

        let mut updated = Vec::new();
        for clause in clauses {
            if clause.satisfied_by(target) {
                updated.push(clause.clone());
                continue;
            }
            match clause.op {
                Operator::Lt | Operator::Lte => updated.push(update_greatest_version(clause, target)),
                Operator::NotEq => {}
                op => {
                    return Err(RequirementError::UnexpectedOperation {
                        file: original.file.clone(),
                        requirement: original.requirement.clone().unwrap_or_default(),
                        operator: op.to_string(),
                    })
                }
            }
        }

        Ok(Rewrite::Replace(join(&binding_requirements(updated))))
    }

    fn update_gemspec_requirement(
        &self,
        clauses: &[Clause],
        original: &Requirement,
    ) -> Result<Rewrite, RequirementError> {
        let (Some(latest), Some(resolvable)) =
            (&self.latest_version, &self.latest_resolvable_version)
        else {
            return Ok(Rewrite::Keep);
        };

        let development = original.is_development();
        let satisfied = |clause: &Clause| {
            if development {
                clause.satisfied_by(resolvable)
            } else {
                clause.satisfied_by(latest)
            }
        };

        if clauses.iter().all(|c| satisfied(c)) {
            return Ok(Rewrite::Keep);
        }

        let mut updated = Vec::new();
        for clause in clauses {
            if satisfied(clause) {
                updated.push(clause.clone());
                continue;
            }
            let replacement = if development {
                bumped_requirements(clause, latest, resolvable)
            } else {
                widened_requirements(clause, latest, resolvable)
            };
            match replacement {
                Ok(mut clauses) => updated.append(&mut clauses),
                Err(Unfixable) => return Ok(Rewrite::Unfixable),
            }
        }

        Ok(Rewrite::Replace(join(&binding_requirements(updated))))
    }
}

fn parse_clauses(file: &str, text: &str) -> Result<Vec<Clause>, RequirementError> {
    let requirement =
        GemRequirement::parse(text).map_err(|_| RequirementError::malformed(file, text))?;
    Ok(requirement.clauses().to_vec())
}

fn join(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn widened_requirements(
    clause: &Clause,
    latest: &GemVersion,
    resolvable: &GemVersion,
) -> Result<Vec<Clause>, Unfixable> {
    match clause.op {
        Operator::Eq => Ok(vec![move_exact_pin(clause, resolvable)]),
        Operator::Lt | Operator::Lte => Ok(vec![update_greatest_version(clause, latest)]),
        Operator::Pessimistic => Ok(convert_twiddle_to_range(clause, latest)),
        Operator::NotEq => Ok(Vec::new()),
        Operator::Gt | Operator::Gte => Err(Unfixable),
    }
}

fn bumped_requirements(
    clause: &Clause,
    latest: &GemVersion,
    resolvable: &GemVersion,
) -> Result<Vec<Clause>, Unfixable> {
    match clause.op {
        Operator::Eq => Ok(vec![move_exact_pin(clause, resolvable)]),
        Operator::Pessimistic => Ok(vec![update_twiddle_version(clause, resolvable)]),
        Operator::Lt | Operator::Lte => Ok(vec![update_greatest_version(clause, latest)]),
        Operator::NotEq => Ok(Vec::new()),
        Operator::Gt | Operator::Gte => Err(Unfixable),
    }
}

fn move_exact_pin(clause: &Clause, resolvable: &GemVersion) -> Clause {
    if clause.version < *resolvable {
        Clause::new(Operator::Eq, resolvable.clone())
    } else {
        clause.clone()
    }
}

/// Keeps the tightest ceiling and floor; other operators are kept as-is
fn binding_requirements(clauses: Vec<Clause>) -> Vec<Clause> {
    let mut operators: Vec<Operator> = Vec::new();
    for clause in &clauses {
        if !operators.contains(&clause.op) {
            operators.push(clause.op);
        }
    }

    let mut binding: Vec<Clause> = Vec::new();
    for op in operators {
        let group = clauses.iter().filter(|c| c.op == op);
        if op.is_ceiling() {
            binding.extend(group.min_by(|a, b| a.version.cmp(&b.version)).cloned());
        } else if op.is_floor() {
            binding.extend(group.max_by(|a, b| a.version.cmp(&b.version)).cloned());
        } else {
            binding.extend(clauses.iter().cloned());
        }
    }

    let mut unique: Vec<Clause> = Vec::new();
    for clause in binding {
        if !unique.contains(&clause) {
            unique.push(clause);
        }
    }

    if unique.is_empty() {
        return GemRequirement::default_requirement().clauses().to_vec();
    }
    unique.sort_by(|a, b| a.version.cmp(&b.version));
    unique
}

/// `~> 1.4.0` permitting 1.13.0 becomes `~> 1.13.0`
fn update_twiddle_version(clause: &Clause, permitted: &GemVersion) -> Clause {
    let updated = at_same_precision(permitted, &clause.version);
    let version = GemVersion::parse(&updated).unwrap_or_else(|_| permitted.clone());
    Clause::new(Operator::Pessimistic, version)
}

/// Dotted parts of a version, plus a hyphenated prerelease suffix kept whole
/// (`2.0.0-rc1` -> `["2", "0", "0"]`, `rc1`)
fn version_parts(version: &GemVersion) -> (Vec<&str>, Option<&str>) {
    let (dotted, suffix) = match version.as_str().split_once('-') {
        Some((dotted, suffix)) => (dotted, Some(suffix)),
        None => (version.as_str(), None),
    };
    (dotted.split('.').collect(), suffix)
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Cuts `new_version` down to the number of release and prerelease parts
/// that `old_version` has
fn at_same_precision(new_version: &GemVersion, old_version: &GemVersion) -> String {
    let (old_parts, old_suffix) = version_parts(old_version);
    let release_precision = old_parts.iter().take_while(|p| is_numeric(p)).count();
    let prerelease_precision =
        old_parts.len() - release_precision + usize::from(old_suffix.is_some());

    let (new_parts, new_suffix) = version_parts(new_version);
    let mut updated = new_parts
        .iter()
        .copied()
        .take(release_precision)
        .collect::<Vec<_>>()
        .join(".");

    let mut remaining = prerelease_precision.max(1);
    for part in new_parts.iter().copied().skip_while(|p| is_numeric(p)).take(remaining) {
        updated.push('.');
        updated.push_str(part);
        remaining -= 1;
    }
    if let Some(suffix) = new_suffix.filter(|_| remaining > 0) {
        updated.push('-');
        updated.push_str(suffix);
    }
    updated
}

/// Raises a `<`/`<=` ceiling past `permitted`, keeping its precision
fn update_greatest_version(clause: &Clause, permitted: &GemVersion) -> Clause {
    let current = clause.version.release_numbers();
    let permitted = permitted.release_numbers();
    if permitted.is_empty() {
        return clause.clone();
    }

    let highest_nonzero = current
        .iter()
        .enumerate()
        .map(|(i, seg)| if *seg == 0 { 0 } else { i })
        .max()
        .unwrap_or(0);
    let index_to_update = highest_nonzero.min(permitted.len() - 1);

    let new_segments: Vec<u64> = (0..current.len())
        .filter_map(|index| {
            if index < index_to_update {
                Some(permitted[index])
            } else if index == index_to_update {
                Some(permitted[index].saturating_add(1))
            } else if index > permitted.len() - 1 {
                None
            } else {
                Some(0)
            }
        })
        .collect();

    Clause::new(clause.op, GemVersion::from_numbers(&new_segments))
}

/// `~> 1.4.0` permitting 1.8.0 becomes `>= 1.4, < 1.9`
fn convert_twiddle_to_range(clause: &Clause, permitted: &GemVersion) -> Vec<Clause> {
    let lower = clause.version.release_numbers();
    let index_to_update = lower.len().saturating_sub(2);

    let mut upper = permitted.release_numbers();
    while upper.len() <= index_to_update {
        upper.push(0);
    }
    upper.truncate(index_to_update + 1);
    upper[index_to_update] = upper[index_to_update].saturating_add(1);

    let mut lower = lower;
    while lower.last() == Some(&0) {
        lower.pop();
    }

    if lower.is_empty() {
        return vec![Clause::new(Operator::Lt, GemVersion::from_numbers(&upper))];
    }

    let length = lower.len().max(upper.len());
    lower.resize(length, 0);
    upper.resize(length, 0);

    vec![
        Clause::new(Operator::Gte, GemVersion::from_numbers(&lower)),
        Clause::new(Operator::Lt, GemVersion::from_numbers(&upper)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> GemVersion {
        GemVersion::parse(s).unwrap()
    }

    fn gemfile(requirement: &str) -> Requirement {
        Requirement::new("Gemfile", requirement).with_groups(["default"])
    }

    fn gemspec(requirement: &str) -> Requirement {
        Requirement::new("example.gemspec", requirement).with_groups(["runtime"])
    }

    fn dev_gemspec(requirement: &str) -> Requirement {
        Requirement::new("example.gemspec", requirement).with_groups(["development"])
    }

    fn update_one(
        requirement: Requirement,
        strategy: UpdateStrategy,
        latest: &str,
        resolvable: &str,
    ) -> RequirementUpdate {
        RequirementsUpdater::new(vec![requirement], strategy)
            .with_latest_version(Some(v(latest)))
            .with_latest_resolvable_version(Some(v(resolvable)))
            .updated_requirements()
            .unwrap()
            .remove(0)
    }

    fn gemfile_bump(requirement: &str) -> String {
        let update = update_one(gemfile(requirement), UpdateStrategy::BumpVersions, "1.8.0", "1.5.0");
        update.requirement().requirement.clone().unwrap()
    }

    fn gemspec_widen(requirement: &str, latest: &str) -> RequirementUpdate {
        update_one(
            gemspec(requirement),
            UpdateStrategy::BumpVersionsIfNecessary,
            latest,
            "1.5.0",
        )
    }

    fn text(update: &RequirementUpdate) -> &str {
        update.requirement().requirement.as_deref().unwrap()
    }

    #[test]
    fn test_pessimistic_keeps_three_components() {
        let update = update_one(
            gemfile("~> 1.4.0"),
            UpdateStrategy::BumpVersions,
            "1.13.0",
            "1.13.0",
        );
        assert!(update.is_updated());
        assert_eq!(text(&update), "~> 1.13.0");
        assert!(update.requirement().source.is_none());
    }

    #[test]
    fn test_pessimistic_keeps_two_components() {
        assert_eq!(gemfile_bump("~> 1.4"), "~> 1.5");
    }

    #[test]
    fn test_pessimistic_prerelease_target() {
        let update = update_one(
            gemfile("~> 1.4.0"),
            UpdateStrategy::BumpVersions,
            "1.8.0",
            "1.5.0.beta",
        );
        assert_eq!(text(&update), "~> 1.5.0.beta");
    }

    #[test]
    fn test_pessimistic_prerelease_precision() {
        let update = update_one(
            gemfile("~> 1.5.beta"),
            UpdateStrategy::BumpVersions,
            "1.8.0",
            "1.5.0.beta2",
        );
        assert_eq!(text(&update), "~> 1.5.beta2");
    }

    #[test]
    fn test_gemfile_floor_left_alone() {
        assert_eq!(gemfile_bump(">= 1.4.0"), ">= 1.4.0");
    }

    #[test]
    fn test_gemfile_ceiling_raised() {
        assert_eq!(gemfile_bump("< 1.4.0"), "< 1.6.0");
    }

    #[test]
    fn test_gemfile_ceiling_uses_next_boundary() {
        let update = update_one(
            gemfile("> 1.0, < 1.5.0"),
            UpdateStrategy::BumpVersions,
            "1.13.0",
            "1.13.0",
        );
        assert_eq!(text(&update), "> 1.0, < 1.14.0");
    }

    #[test]
    fn test_gemfile_exact_pin_becomes_bare_version() {
        assert_eq!(gemfile_bump("= 1.0.0, <= 1.4.0"), "1.5.0");
    }

    #[test]
    fn test_gemfile_twiddle_wins_over_floor() {
        assert_eq!(gemfile_bump("~> 1.0, >= 1.0.1"), "~> 1.5");
        assert_eq!(gemfile_bump("~> 0.9, >= 0.9.1"), "~> 1.5");
    }

    #[test]
    fn test_gemfile_ranges() {
        assert_eq!(gemfile_bump(">= 1.0, < 1.4"), ">= 1.0, < 1.6");
        assert_eq!(gemfile_bump(">= 1.0, < 1.4.2.2"), ">= 1.0, < 1.5.1");
        assert_eq!(gemfile_bump(">= 1.0, != 1.5.0"), ">= 1.0");
        assert_eq!(
            gemfile_bump(">= 1.0, != 1.4.0, < 1.3"),
            ">= 1.0, != 1.4.0, < 1.6"
        );
    }

    #[test]
    fn test_gemfile_unsatisfiable_floor_is_an_error() {
        let err = RequirementsUpdater::new(vec![gemfile(">= 2.0, < 2.4")], UpdateStrategy::BumpVersions)
            .with_latest_version(Some(v("1.8.0")))
            .with_latest_resolvable_version(Some(v("1.5.0")))
            .updated_requirements()
            .unwrap_err();
        match err {
            RequirementError::UnexpectedOperation { file, operator, .. } => {
                assert_eq!(file, "Gemfile");
                assert_eq!(operator, ">=");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_if_necessary_leaves_satisfied_requirement_identical() {
        let update = update_one(
            gemfile("~> 1.0, >= 1.0.1"),
            UpdateStrategy::BumpVersionsIfNecessary,
            "1.8.0",
            "1.5.0",
        );
        assert_eq!(update, RequirementUpdate::Unchanged(gemfile("~> 1.0, >= 1.0.1")));
    }

    #[test]
    fn test_if_necessary_rewrites_excluding_requirement() {
        let update = update_one(
            gemfile("~> 1.4.0"),
            UpdateStrategy::BumpVersionsIfNecessary,
            "1.8.0",
            "1.5.0",
        );
        assert_eq!(text(&update), "~> 1.5.0");
    }

    #[test]
    fn test_unconstrained_requirement_survives() {
        for strategy in [UpdateStrategy::BumpVersions, UpdateStrategy::BumpVersionsIfNecessary] {
            let update = update_one(gemfile(">= 0"), strategy, "1.8.0", "1.5.0");
            assert_eq!(text(&update), ">= 0");
            assert!(!update.is_updated());
        }
    }

    #[test]
    fn test_lockfile_only_changes_nothing() {
        let update = update_one(gemfile("~> 1.4.0"), UpdateStrategy::LockfileOnly, "1.8.0", "1.5.0");
        assert_eq!(update, RequirementUpdate::Unchanged(gemfile("~> 1.4.0")));
    }

    #[test]
    fn test_no_resolvable_version_returns_input() {
        let updates = RequirementsUpdater::new(vec![gemfile("~> 1.4.0")], UpdateStrategy::BumpVersions)
            .with_latest_version(Some(v("1.8.0")))
            .updated_requirements()
            .unwrap();
        assert_eq!(updates, vec![RequirementUpdate::Unchanged(gemfile("~> 1.4.0"))]);
    }

    #[test]
    fn test_dynamic_requirement_is_unlockable() {
        let update = update_one(
            Requirement::dynamic("Gemfile"),
            UpdateStrategy::BumpVersions,
            "1.8.0",
            "1.5.0",
        );
        assert!(update.is_unlockable());
        assert!(update.requirement().requirement.is_none());
    }

    #[test]
    fn test_malformed_requirement_names_file() {
        let err = RequirementsUpdater::new(vec![gemfile("~> whatever")], UpdateStrategy::BumpVersions)
            .with_latest_resolvable_version(Some(v("1.5.0")))
            .updated_requirements()
            .unwrap_err();
        assert_eq!(err, RequirementError::malformed("Gemfile", "~> whatever"));
    }

    #[test]
    fn test_gemspec_exact_requirements() {
        assert_eq!(text(&gemspec_widen("= 1.4.0", "1.8.0")), "= 1.5.0");
        assert_eq!(text(&gemspec_widen("1.4.0", "1.8.0")), "= 1.5.0");
        assert_eq!(text(&gemspec_widen("1.7.0", "1.8.0")), "= 1.7.0");
    }

    #[test]
    fn test_gemspec_ceilings() {
        assert_eq!(text(&gemspec_widen("< 1.4.0", "1.8.0")), "< 1.9.0");
        assert_eq!(text(&gemspec_widen("<= 1.4.0", "1.8.0")), "<= 1.9.0");
        assert_eq!(text(&gemspec_widen("< 1.4.0.beta", "1.8.0")), "< 1.9.0");
        assert_eq!(
            text(&gemspec_widen("> 1.0.0, <= 1.4.0", "1.8.0")),
            "> 1.0.0, <= 1.9.0"
        );
    }

    #[test]
    fn test_gemspec_twiddle_widened_to_range() {
        assert_eq!(text(&gemspec_widen("~> 1.4.0", "1.8.0")), ">= 1.4, < 1.9");
        assert_eq!(text(&gemspec_widen("~> 1.0.0", "1.8.0")), ">= 1.0, < 1.9");
        assert_eq!(text(&gemspec_widen("~> 1.0.1", "1.8.0")), ">= 1.0.1, < 1.9.0");
        assert_eq!(text(&gemspec_widen("~> 0.1", "1.8.0")), ">= 0.1, < 2.0");
        assert_eq!(text(&gemspec_widen("~> 1", "2.8.0")), ">= 1, < 3");
        assert_eq!(text(&gemspec_widen("~> 0", "2.8.0")), "< 3");
    }

    #[test]
    fn test_gemspec_compound_requirements() {
        assert_eq!(
            text(&gemspec_widen("~> 0.5, >= 0.5.2", "1.8.0")),
            ">= 0.5.2, < 2.0"
        );
        assert_eq!(text(&gemspec_widen("~> 1.4, != 1.8.0", "1.8.0")), "~> 1.4");
        assert_eq!(
            text(&gemspec_widen("~> 1.4.0, != 1.5.0", "1.8.0")),
            ">= 1.4, != 1.5.0, < 1.9"
        );
        assert_eq!(text(&gemspec_widen("!= 1.8.0", "1.8.0")), ">= 0");
    }

    #[test]
    fn test_gemspec_floor_above_latest_is_unfixable() {
        let update = gemspec_widen(">= 1.9.0", "1.8.0");
        assert!(update.is_unfixable());
        assert_eq!(text(&update), ">= 1.9.0");
        assert!(gemspec_widen("> 1.8.0", "1.8.0").is_unfixable());
    }

    #[test]
    fn test_gemspec_development_group_is_bumped() {
        let bump = |req: &str| {
            update_one(
                dev_gemspec(req),
                UpdateStrategy::BumpVersionsIfNecessary,
                "1.8.0",
                "1.5.0",
            )
        };
        assert_eq!(text(&bump("~> 1.4.0")), "~> 1.5.0");
        assert_eq!(text(&bump("~> 0.1")), "~> 1.5");
        assert_eq!(text(&bump("!= 1.5.0")), ">= 0");
        assert!(bump(">= 1.6.0").is_unfixable());
    }

    #[test]
    fn test_gemfile_and_gemspec_updated_independently() {
        let requirements = vec![gemfile("~> 1.4.0"), gemspec("~> 1.0")];
        let run = |strategy| {
            RequirementsUpdater::new(requirements.clone(), strategy)
                .with_latest_version(Some(v("1.13.0")))
                .with_latest_resolvable_version(Some(v("1.13.0")))
                .updated_requirements()
                .unwrap()
        };

        let if_necessary = run(UpdateStrategy::BumpVersionsIfNecessary);
        assert_eq!(if_necessary.len(), 2);
        assert_eq!(text(&if_necessary[0]), "~> 1.13.0");
        assert_eq!(text(&if_necessary[1]), "~> 1.0");
        assert_eq!(if_necessary[1].requirement().file, "example.gemspec");

        let bumped = run(UpdateStrategy::BumpVersions);
        assert_eq!(text(&bumped[0]), "~> 1.13.0");
        assert_eq!(text(&bumped[1]), "~> 1.13");
    }

    #[test]
    fn test_gemfile_and_gemspec_range_together() {
        let updates = RequirementsUpdater::new(
            vec![gemfile("~>1.4.0"), gemspec(">= 1.0, < 1.5")],
            UpdateStrategy::BumpVersionsIfNecessary,
        )
        .with_latest_version(Some(v("1.8.0")))
        .with_latest_resolvable_version(Some(v("1.5.0")))
        .updated_requirements()
        .unwrap();
        assert_eq!(text(&updates[0]), "~> 1.5.0");
        assert_eq!(text(&updates[1]), ">= 1.0, < 1.9");
    }

    #[test]
    fn test_updated_source_applies_to_gemfile_only() {
        let git = RequirementSource::git("https://github.com/gocardless/business").with_ref("v1.5.0");
        let updates = RequirementsUpdater::new(
            vec![gemfile("~> 1.4.0"), gemspec("~> 1.0")],
            UpdateStrategy::BumpVersionsIfNecessary,
        )
        .with_updated_source(Some(git.clone()))
        .with_latest_version(Some(v("1.5.0")))
        .with_latest_resolvable_version(Some(v("1.5.0")))
        .updated_requirements()
        .unwrap();
        assert_eq!(updates[0].requirement().source.as_ref(), Some(&git));
        assert!(updates[1].requirement().source.is_none());
    }

    #[test]
    fn test_updater_is_idempotent() {
        for (req, strategy) in [
            ("~> 1.4.0", UpdateStrategy::BumpVersions),
            ("> 1.0, < 1.5.0", UpdateStrategy::BumpVersions),
            ("~> 1.4.0", UpdateStrategy::BumpVersionsIfNecessary),
        ] {
            let first = update_one(gemfile(req), strategy, "1.13.0", "1.13.0").into_requirement();
            let second = update_one(first.clone(), strategy, "1.13.0", "1.13.0");
            assert_eq!(second.into_requirement(), first);
        }
    }

    #[test]
    fn test_range_still_admits_target_and_keeps_floor() {
        let update = update_one(
            gemfile("> 1.2, < 1.4"),
            UpdateStrategy::BumpVersions,
            "1.13.0",
            "1.13.0",
        );
        let new = GemRequirement::parse(text(&update)).unwrap();
        assert!(new.satisfied_by(&v("1.13.0")));
        assert!(!new.satisfied_by(&v("1.2")));
    }

    #[test]
    fn test_at_same_precision() {
        assert_eq!(at_same_precision(&v("1.13.0"), &v("1.4")), "1.13");
        assert_eq!(at_same_precision(&v("1.13.0"), &v("1.4.0")), "1.13.0");
        assert_eq!(at_same_precision(&v("2.0.0.rc1"), &v("1.4.0")), "2.0.0.rc1");
        assert_eq!(at_same_precision(&v("1.13.0"), &v("1.0.0-rc1")), "1.13.0");
        assert_eq!(at_same_precision(&v("2.0.0-rc1"), &v("1.4.0")), "2.0.0-rc1");
        assert_eq!(at_same_precision(&v("2.0.0-rc2"), &v("1.4.0-rc1")), "2.0.0-rc2");
    }

    #[test]
    fn test_pessimistic_hyphenated_prerelease_keeps_precision() {
        let update = update_one(
            gemfile("~> 1.0.0-rc1"),
            UpdateStrategy::BumpVersions,
            "1.13.0",
            "1.13.0",
        );
        assert_eq!(text(&update), "~> 1.13.0");

        let update = update_one(
            gemfile("~> 1.4.0"),
            UpdateStrategy::BumpVersions,
            "2.0.0-rc1",
            "2.0.0-rc1",
        );
        assert_eq!(text(&update), "~> 2.0.0-rc1");
    }

    #[test]
    fn test_ceiling_at_segment_limit_does_not_overflow() {
        let clause = Clause::new(Operator::Lt, v("2.0"));
        let permitted = GemVersion::from_numbers(&[u64::MAX, 0]);
        let updated = update_greatest_version(&clause, &permitted);
        assert_eq!(updated.version.release_numbers(), vec![u64::MAX, 0]);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(
            UpdateStrategy::from_name("lock_file_only"),
            Some(UpdateStrategy::LockfileOnly)
        );
        assert_eq!(UpdateStrategy::BumpVersionsIfNecessary.to_string(), "bump_versions_if_necessary");
        let parsed: UpdateStrategy = serde_json::from_str("\"bump_versions\"").unwrap();
        assert_eq!(parsed, UpdateStrategy::BumpVersions);
    }
    #[test]
    fn test_requirements_request_from_json() {
        let request: RequirementsRequest = serde_json::from_str(
            r#"{
                "requirements": [
                    {"file": "Gemfile", "requirement": "~> 1.4.0", "groups": ["default"]},
                    {"file": "business.gemspec", "requirement": "~> 1.0"}
                ],
                "latest_resolvable_version": "1.5.0"
            }"#,
        )
        .unwrap();
        assert_eq!(request.strategy(), UpdateStrategy::BumpVersionsIfNecessary);

        let updates = request.updater().unwrap().updated_requirements().unwrap();
        let json = serde_json::to_value(&updates).unwrap();
        assert_eq!(json[0]["status"], "updated");
        assert_eq!(json[0]["requirement"]["requirement"], "~> 1.5.0");
        assert_eq!(json[0]["requirement"]["groups"][0], "default");
        assert_eq!(json[1]["status"], "unchanged");
        assert_eq!(json[1]["requirement"]["requirement"], "~> 1.0");
    }

    #[test]
    fn test_requirements_request_rejects_bad_version() {
        let request = RequirementsRequest {
            requirements: vec![gemfile("~> 1.4.0")],
            update_strategy: Some(UpdateStrategy::BumpVersions),
            latest_version: None,
            latest_resolvable_version: Some("not a version".to_string()),
            updated_source: None,
        };
        assert!(matches!(
            request.updater(),
            Err(RequirementError::MalformedVersion { .. })
        ));
    }
}

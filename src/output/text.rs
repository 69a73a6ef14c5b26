//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Update lines with the kind of version change (major/minor/patch)
//! - Failed checks, always shown
//! - Skipped dependencies and requirement rewrites in verbose mode
//! - A closing summary line

use crate::domain::{GemVersion, SkipReason, UpdateResult, UpdateSummary};
use crate::orchestrator::OrchestratorResult;
use crate::output::{OutputFormatter, Verbosity};
use crate::pull_request::PullRequestHandle;
use colored::Colorize;
use std::io::Write;

/// Kind of version change between two releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChangeType {
    Major,
    Minor,
    Patch,
    /// A move between git commits
    Commit,
    Unknown,
}

impl VersionChangeType {
    pub fn from_versions(old: Option<&str>, new: Option<&str>) -> Self {
        let (Some(old), Some(new)) = (old, new) else {
            return VersionChangeType::Unknown;
        };
        let (Ok(old), Ok(new)) = (GemVersion::parse(old), GemVersion::parse(new)) else {
            let is_sha = |v: &str| v.len() >= 7 && v.chars().all(|c| c.is_ascii_hexdigit());
            return if is_sha(old) || is_sha(new) {
                VersionChangeType::Commit
            } else {
                VersionChangeType::Unknown
            };
        };

        let old = old.release_numbers();
        let new = new.release_numbers();
        let at = |numbers: &[u64], i: usize| numbers.get(i).copied().unwrap_or(0);
        if at(&old, 0) != at(&new, 0) {
            VersionChangeType::Major
        } else if at(&old, 1) != at(&new, 1) {
            VersionChangeType::Minor
        } else {
            VersionChangeType::Patch
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VersionChangeType::Major => "major",
            VersionChangeType::Minor => "minor",
            VersionChangeType::Patch => "patch",
            VersionChangeType::Commit => "git",
            VersionChangeType::Unknown => "?",
        }
    }

    pub fn colored_label(&self) -> String {
        match self {
            VersionChangeType::Major => self.label().red().bold().to_string(),
            VersionChangeType::Minor => self.label().yellow().to_string(),
            VersionChangeType::Patch => self.label().green().to_string(),
            VersionChangeType::Commit => self.label().cyan().to_string(),
            VersionChangeType::Unknown => self.label().dimmed().to_string(),
        }
    }
}

pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            color: true,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> colored::ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn skip_reason(reason: &SkipReason) -> String {
        match reason {
            SkipReason::Excluded => "excluded".to_string(),
            SkipReason::NotInOnlyList => "not in --only".to_string(),
            SkipReason::UpToDate => "up to date".to_string(),
            SkipReason::Failed(message) => message.clone(),
        }
    }

    fn name_width(results: &[&UpdateResult]) -> usize {
        results.iter().map(|r| r.name().len()).max().unwrap_or(0).max(20)
    }

    fn write_update(&self, result: &UpdateResult, width: usize, writer: &mut dyn Write) -> std::io::Result<()> {
        let dependency = result.dependency();
        let old = dependency.display_previous_version();
        let new = dependency.display_version();
        let change = VersionChangeType::from_versions(
            dependency.previous_version.as_deref(),
            dependency.version.as_deref(),
        );
        let old = old.as_deref().unwrap_or("-");
        let new = new.as_deref().unwrap_or("-");

        if self.color {
            writeln!(
                writer,
                "  {:width$} {} {} {} [{}]",
                dependency.name,
                old.dimmed(),
                "→".dimmed(),
                new.bright_white().bold(),
                change.colored_label(),
                width = width
            )?;
        } else {
            writeln!(
                writer,
                "  {:width$} {} -> {} [{}]",
                dependency.name,
                old,
                new,
                change.label(),
                width = width
            )?;
        }

        if self.verbosity == Verbosity::Verbose {
            for (previous, updated) in result.changed_requirements() {
                writeln!(
                    writer,
                    "    {}: {} -> {}",
                    updated.file,
                    previous.requirement.as_deref().unwrap_or("(none)"),
                    updated.requirement.as_deref().unwrap_or("(none)")
                )?;
            }
        }
        Ok(())
    }

    fn write_skip(&self, result: &UpdateResult, width: usize, writer: &mut dyn Write) -> std::io::Result<()> {
        let UpdateResult::Skip { dependency, reason } = result else {
            return Ok(());
        };
        let name = format!("{:width$}", dependency.name, width = width);
        let reason = format!("({})", Self::skip_reason(reason));
        if result.is_failure() {
            writeln!(writer, "  {} {}", self.paint(&name, |s| s.red()), self.paint(&reason, |s| s.red()))
        } else {
            writeln!(writer, "  {} {}", self.paint(&name, |s| s.dimmed()), self.paint(&reason, |s| s.dimmed()))
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &OrchestratorResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let summary = &result.summary;
        let updates: Vec<&UpdateResult> = summary.updates().collect();
        let failures: Vec<&UpdateResult> = summary.failures().collect();
        let skips: Vec<&UpdateResult> = summary.skips().filter(|r| !r.is_failure()).collect();

        if self.verbosity != Verbosity::Quiet {
            let prefix = if summary.dry_run {
                format!("{} ", self.paint("(dry-run)", |s| s.cyan()))
            } else {
                String::new()
            };
            let location = format!("{} ({})", summary.directory, summary.package_manager);
            writeln!(writer, "{}{}", prefix, self.paint(&location, |s| s.bold()))?;

            let all: Vec<&UpdateResult> = summary.results.iter().collect();
            let width = Self::name_width(&all);
            for result in &updates {
                self.write_update(result, width, writer)?;
            }
            if !failures.is_empty() {
                writeln!(writer)?;
                writeln!(writer, "  {}", self.paint("Failed:", |s| s.red()))?;
                for result in &failures {
                    self.write_skip(result, width, writer)?;
                }
            }
            if self.verbosity == Verbosity::Verbose && !skips.is_empty() {
                writeln!(writer)?;
                writeln!(writer, "  {}", self.paint("Skipped:", |s| s.dimmed()))?;
                for result in &skips {
                    self.write_skip(result, width, writer)?;
                }
            }
            if !result.changed_files.is_empty() {
                writeln!(writer)?;
                let verb = if summary.dry_run { "Would change" } else { "Changed" };
                writeln!(writer, "  {}: {}", verb, summary.changed_files.join(", "))?;
            }
            writeln!(writer)?;
        }

        self.format_summary(summary, writer)
    }

    fn format_summary(&self, summary: &UpdateSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        let updates = summary.total_updates();
        let failures = summary.failures().count();
        let noun = if updates == 1 { "dependency" } else { "dependencies" };

        if updates == 0 && failures == 0 {
            let line = "All dependencies are up to date.";
            return writeln!(writer, "{}", self.paint(line, |s| s.green()));
        }

        let action = if summary.dry_run { "can be updated" } else { "updated" };
        let mut line = format!("{} {} {}", updates, noun, action);
        if failures > 0 {
            line.push_str(&format!(", {} failed", failures));
        }
        let line = if failures > 0 {
            self.paint(&line, |s| s.yellow())
        } else {
            self.paint(&line, |s| s.green())
        };
        writeln!(writer, "{}", line)
    }

    fn format_pull_request(
        &self,
        handle: Option<&PullRequestHandle>,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let Some(handle) = handle else {
            return writeln!(writer, "No pull request opened.");
        };
        let location = handle.url.clone().unwrap_or_else(|| format!("#{}", handle.number));
        writeln!(
            writer,
            "Opened pull request {} from {}",
            self.paint(&location, |s| s.bold()),
            handle.branch_name
        )?;
        if !handle.labels.is_empty() {
            writeln!(writer, "  labels: {}", handle.labels.join(", "))?;
        }
        for warning in &handle.warnings {
            writeln!(writer, "  {} {}", self.paint("warning:", |s| s.yellow()), warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support;

    fn render(formatter: &TextFormatter, result: &OrchestratorResult) -> String {
        let mut buffer = Vec::new();
        formatter.format(result, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_version_change_type() {
        let change = |a, b| VersionChangeType::from_versions(Some(a), Some(b));
        assert_eq!(change("1.4.0", "2.0.0"), VersionChangeType::Major);
        assert_eq!(change("1.4.0", "1.5.0"), VersionChangeType::Minor);
        assert_eq!(change("1.4", "1.4.1"), VersionChangeType::Patch);
        assert_eq!(
            change("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            VersionChangeType::Commit
        );
        assert_eq!(VersionChangeType::from_versions(None, Some("1.0")), VersionChangeType::Unknown);
    }

    #[test]
    fn test_normal_output() {
        let formatter = TextFormatter::new(Verbosity::Normal).with_color(false);
        let output = render(&formatter, &test_support::result(true));

        assert!(output.starts_with("(dry-run) / (bundler)\n"));
        assert!(output.contains("business             1.4.0 -> 1.5.0 [minor]"));
        assert!(output.contains("Failed:"));
        assert!(output.contains("(helper timed out)"));
        assert!(!output.contains("statesman"));
        assert!(output.contains("Would change: Gemfile"));
        assert!(output.ends_with("1 dependency can be updated, 1 failed\n"));
    }

    #[test]
    fn test_verbose_output_lists_skips_and_requirements() {
        let formatter = TextFormatter::new(Verbosity::Verbose).with_color(false);
        let output = render(&formatter, &test_support::result(false));

        assert!(output.contains("    Gemfile: ~> 1.4.0 -> ~> 1.5.0"));
        assert!(output.contains("Skipped:"));
        assert!(output.contains("(up to date)"));
        assert!(output.contains("Changed: Gemfile"));
    }

    #[test]
    fn test_quiet_output_is_summary_only() {
        let formatter = TextFormatter::new(Verbosity::Quiet).with_color(false);
        let output = render(&formatter, &test_support::result(false));
        assert_eq!(output, "1 dependency updated, 1 failed\n");
    }

    #[test]
    fn test_up_to_date_summary() {
        let formatter = TextFormatter::new(Verbosity::Normal).with_color(false);
        let summary = UpdateSummary::new(crate::domain::PackageManager::Bundler, "/", false);
        let mut buffer = Vec::new();
        formatter.format_summary(&summary, &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "All dependencies are up to date.\n");
    }

    #[test]
    fn test_pull_request_report() {
        let formatter = TextFormatter::new(Verbosity::Normal).with_color(false);
        let mut handle = PullRequestHandle::new(
            7,
            Some("https://github.com/acme/app/pull/7".to_string()),
            "dependabot/bundler/business-1.5.0",
        );
        handle.warnings.push("reviewers: not a collaborator".to_string());

        let mut buffer = Vec::new();
        formatter.format_pull_request(Some(&handle), &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.starts_with(
            "Opened pull request https://github.com/acme/app/pull/7 from dependabot/bundler/business-1.5.0\n"
        ));
        assert!(output.contains("warning: reviewers: not a collaborator"));
    }
}

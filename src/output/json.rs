//! JSON output formatter for machine processing

use crate::domain::{SkipReason, UpdateResult, UpdateSummary};
use crate::orchestrator::OrchestratorResult;
use crate::output::{OutputFormatter, Verbosity};
use crate::pull_request::PullRequestHandle;
use serde::Serialize;
use std::io::Write;

pub struct JsonFormatter {
    verbosity: Verbosity,
}

impl JsonFormatter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    package_manager: &'a str,
    directory: &'a str,
    dry_run: bool,
    summary: JsonSummary,
    updates: Vec<JsonUpdate<'a>>,
    /// Failures always; other skips only in verbose mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skips: Vec<JsonSkip<'a>>,
    changed_files: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    deleted_files: &'a [String],
}

#[derive(Serialize)]
struct JsonSummary {
    updates: usize,
    skips: usize,
    failures: usize,
}

#[derive(Serialize)]
struct JsonUpdate<'a> {
    name: &'a str,
    from: Option<String>,
    to: Option<String>,
    requirements: Vec<JsonRequirementChange<'a>>,
}

#[derive(Serialize)]
struct JsonRequirementChange<'a> {
    file: &'a str,
    from: Option<&'a str>,
    to: Option<&'a str>,
}

#[derive(Serialize)]
struct JsonSkip<'a> {
    name: &'a str,
    version: Option<&'a str>,
    reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

fn is_empty(files: &&[String]) -> bool {
    files.is_empty()
}

fn summary(summary: &UpdateSummary) -> JsonSummary {
    JsonSummary {
        updates: summary.total_updates(),
        skips: summary.total_skips(),
        failures: summary.failures().count(),
    }
}

fn update(result: &UpdateResult) -> JsonUpdate<'_> {
    let dependency = result.dependency();
    JsonUpdate {
        name: &dependency.name,
        from: dependency.display_previous_version(),
        to: dependency.display_version(),
        requirements: result
            .changed_requirements()
            .into_iter()
            .map(|(previous, updated)| JsonRequirementChange {
                file: &updated.file,
                from: previous.requirement.as_deref(),
                to: updated.requirement.as_deref(),
            })
            .collect(),
    }
}

fn skip(result: &UpdateResult) -> Option<JsonSkip<'_>> {
    let UpdateResult::Skip { dependency, reason } = result else {
        return None;
    };
    let (reason, error) = match reason {
        SkipReason::Excluded => ("excluded", None),
        SkipReason::NotInOnlyList => ("not_in_only_list", None),
        SkipReason::UpToDate => ("up_to_date", None),
        SkipReason::Failed(message) => ("failed", Some(message.as_str())),
    };
    Some(JsonSkip {
        name: &dependency.name,
        version: dependency.version.as_deref(),
        reason,
        error,
    })
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &OrchestratorResult, writer: &mut dyn Write) -> std::io::Result<()> {
        let s = &result.summary;
        let verbose = self.verbosity == Verbosity::Verbose;
        let output = JsonOutput {
            package_manager: s.package_manager.as_str(),
            directory: &s.directory,
            dry_run: s.dry_run,
            summary: summary(s),
            updates: s.updates().map(update).collect(),
            skips: s
                .skips()
                .filter(|r| verbose || r.is_failure())
                .filter_map(skip)
                .collect(),
            changed_files: &s.changed_files,
            deleted_files: &result.write_result.deleted,
        };
        serde_json::to_writer_pretty(&mut *writer, &output)?;
        writeln!(writer)
    }

    fn format_summary(&self, s: &UpdateSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        serde_json::to_writer(&mut *writer, &summary(s))?;
        writeln!(writer)
    }

    fn format_pull_request(
        &self,
        handle: Option<&PullRequestHandle>,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, &serde_json::json!({ "pull_request": handle }))?;
        writeln!(writer)
    }
}

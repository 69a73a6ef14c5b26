//! Diff output formatter for showing changes
//!
//! This module provides:
//! - Unified diffs of every changed dependency file, three lines of context
//! - Creation and deletion against `/dev/null`

use crate::domain::{DependencyFile, FileOperation, UpdateSummary};
use crate::orchestrator::OrchestratorResult;
use crate::output::OutputFormatter;
use crate::pull_request::PullRequestHandle;
use std::io::Write;

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal,
    Delete,
    Insert,
}

/// Line edits turning `old` into `new`, longest common subsequence based
fn line_edits<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<(Edit, &'a str)> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    // lcs[i][j]: common subsequence length of old_mid[i..] and new_mid[j..]
    let mut lcs = vec![vec![0u32; new_mid.len() + 1]; old_mid.len() + 1];
    for i in (0..old_mid.len()).rev() {
        for j in (0..new_mid.len()).rev() {
            lcs[i][j] = if old_mid[i] == new_mid[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut edits: Vec<(Edit, &str)> = old[..prefix].iter().map(|l| (Edit::Equal, *l)).collect();
    let (mut i, mut j) = (0, 0);
    while i < old_mid.len() || j < new_mid.len() {
        if i < old_mid.len() && j < new_mid.len() && old_mid[i] == new_mid[j] {
            edits.push((Edit::Equal, old_mid[i]));
            i += 1;
            j += 1;
        } else if i < old_mid.len() && (j == new_mid.len() || lcs[i + 1][j] >= lcs[i][j + 1]) {
            edits.push((Edit::Delete, old_mid[i]));
            i += 1;
        } else {
            edits.push((Edit::Insert, new_mid[j]));
            j += 1;
        }
    }
    edits.extend(old[old.len() - suffix..].iter().map(|l| (Edit::Equal, *l)));
    edits
}

/// Unified diff hunks for two file contents; empty when they are equal
pub(crate) fn unified_hunks(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let edits = line_edits(&old_lines, &new_lines);

    let changes: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, (edit, _))| *edit != Edit::Equal)
        .map(|(i, _)| i)
        .collect();
    let Some(&first) = changes.first() else {
        return String::new();
    };

    // Group changes whose context would overlap
    let mut groups = vec![(first, first)];
    for &change in &changes[1..] {
        let last = groups.len() - 1;
        if change - groups[last].1 <= 2 * CONTEXT {
            groups[last].1 = change;
        } else {
            groups.push((change, change));
        }
    }

    // Line positions before each edit
    let mut positions = Vec::with_capacity(edits.len());
    let (mut old_pos, mut new_pos) = (0usize, 0usize);
    for (edit, _) in &edits {
        positions.push((old_pos, new_pos));
        match edit {
            Edit::Equal => {
                old_pos += 1;
                new_pos += 1;
            }
            Edit::Delete => old_pos += 1,
            Edit::Insert => new_pos += 1,
        }
    }

    let mut out = String::new();
    for (start, end) in groups {
        let from = start.saturating_sub(CONTEXT);
        let to = (end + CONTEXT + 1).min(edits.len());
        let slice = &edits[from..to];
        let old_count = slice.iter().filter(|(e, _)| *e != Edit::Insert).count();
        let new_count = slice.iter().filter(|(e, _)| *e != Edit::Delete).count();
        let (old_start, new_start) = positions[from];
        let header_start = |start: usize, count: usize| if count == 0 { start } else { start + 1 };

        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            header_start(old_start, old_count),
            old_count,
            header_start(new_start, new_count),
            new_count
        ));
        for (edit, line) in slice {
            let marker = match edit {
                Edit::Equal => ' ',
                Edit::Delete => '-',
                Edit::Insert => '+',
            };
            out.push(marker);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub struct DiffFormatter;

impl DiffFormatter {
    pub fn new() -> Self {
        Self
    }

    fn write_file(
        original: Option<&DependencyFile>,
        updated: &DependencyFile,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let path = updated.path();
        let (old_name, old) = match original {
            Some(file) if updated.operation != FileOperation::Create => (format!("a/{}", path), file.content()),
            _ => ("/dev/null".to_string(), ""),
        };
        let (new_name, new) = match updated.operation {
            FileOperation::Delete => ("/dev/null".to_string(), ""),
            _ => (format!("b/{}", path), updated.content()),
        };
        if updated.is_binary() {
            return writeln!(writer, "Binary file {} changed", path);
        }

        let hunks = unified_hunks(old, new);
        if hunks.is_empty() {
            return Ok(());
        }
        writeln!(writer, "--- {}", old_name)?;
        writeln!(writer, "+++ {}", new_name)?;
        write!(writer, "{}", hunks)
    }
}

impl Default for DiffFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for DiffFormatter {
    fn format(&self, result: &OrchestratorResult, writer: &mut dyn Write) -> std::io::Result<()> {
        for updated in &result.changed_files {
            let original = result.original_files.iter().find(|f| f.path() == updated.path());
            Self::write_file(original, updated, writer)?;
        }
        self.format_summary(&result.summary, writer)
    }

    fn format_summary(&self, summary: &UpdateSummary, writer: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            writer,
            "# {} dependencies updated, {} files changed",
            summary.total_updates(),
            summary.changed_files.len()
        )
    }

    fn format_pull_request(
        &self,
        handle: Option<&PullRequestHandle>,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        match handle {
            Some(handle) => writeln!(writer, "# pull request #{} ({})", handle.number, handle.branch_name),
            None => writeln!(writer, "# no pull request opened"),
        }
    }
}

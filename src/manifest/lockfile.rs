//! Gemfile.lock parser and post-processing
//!
//! This module provides:
//! - `Lockfile`, the `GEM`/`GIT`/`PATH` spec sections plus `DEPENDENCIES`
//! - Lockfile ending handling (`RUBY VERSION`, `BUNDLED WITH`)
//! - Git section reordering so regenerated lockfiles keep their order

use regex::Regex;
use std::sync::LazyLock;

static SPEC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^    (?P<name>[^\s(]+) \((?P<version>[^)]+)\)\s*$").unwrap());

static DEPENDENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^  (?P<name>[^\s(!]+)!?(?: \(.*\))?\s*$").unwrap());

static LOCKFILE_ENDING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\s*(?:RUBY VERSION|BUNDLED WITH).*").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Gem,
    Git,
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedSpec {
    pub name: String,
    pub version: String,
    /// Names this spec depends on
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSection {
    pub kind: SectionKind,
    pub remote: Option<String>,
    pub revision: Option<String>,
    pub branch: Option<String>,
    pub reference: Option<String>,
    pub specs: Vec<LockedSpec>,
}

impl LockSection {
    fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            remote: None,
            revision: None,
            branch: None,
            reference: None,
            specs: Vec::new(),
        }
    }
}

/// A parsed Gemfile.lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    pub sections: Vec<LockSection>,
    /// Top-level names from `DEPENDENCIES`
    pub dependencies: Vec<String>,
    pub bundled_with: Option<String>,
    pub ruby_version: Option<String>,
}

impl Lockfile {
    pub fn parse(content: &str) -> Self {
        let mut lockfile = Lockfile::default();
        let mut current: Option<LockSection> = None;
        let mut heading = "";

        for line in content.lines() {
            if !line.starts_with(' ') && !line.trim().is_empty() {
                if let Some(section) = current.take() {
                    lockfile.sections.push(section);
                }
                heading = line.trim();
                current = match heading {
                    "GEM" => Some(LockSection::new(SectionKind::Gem)),
                    "GIT" => Some(LockSection::new(SectionKind::Git)),
                    "PATH" => Some(LockSection::new(SectionKind::Path)),
                    _ => None,
                };
                continue;
            }

            match heading {
                "GEM" | "GIT" | "PATH" => {
                    if let Some(section) = current.as_mut() {
                        parse_section_line(section, line);
                    }
                }
                "DEPENDENCIES" => {
                    if let Some(caps) = DEPENDENCY_RE.captures(line) {
                        lockfile.dependencies.push(caps["name"].to_string());
                    }
                }
                "BUNDLED WITH" if !line.trim().is_empty() => {
                    lockfile.bundled_with = Some(line.trim().to_string());
                }
                "RUBY VERSION" if !line.trim().is_empty() => {
                    lockfile.ruby_version = Some(line.trim().to_string());
                }
                _ => {}
            }
        }
        if let Some(section) = current {
            lockfile.sections.push(section);
        }
        lockfile
    }

    pub fn specs(&self) -> impl Iterator<Item = (&LockSection, &LockedSpec)> {
        self.sections
            .iter()
            .flat_map(|section| section.specs.iter().map(move |spec| (section, spec)))
    }

    pub fn spec(&self, name: &str) -> Option<(&LockSection, &LockedSpec)> {
        self.specs().find(|(_, spec)| spec.name == name)
    }

    /// Locked version; the revision for git sources
    pub fn locked_version(&self, name: &str) -> Option<String> {
        let (section, spec) = self.spec(name)?;
        match section.kind {
            SectionKind::Git => section.revision.clone(),
            _ => Some(spec.version.clone()),
        }
    }

    /// Listed under `DEPENDENCIES`
    pub fn is_top_level(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }
}

fn parse_section_line(section: &mut LockSection, line: &str) {
    if let Some(caps) = SPEC_RE.captures(line) {
        section.specs.push(LockedSpec {
            name: caps["name"].to_string(),
            version: strip_platform(&caps["version"]).to_string(),
            dependencies: Vec::new(),
        });
        return;
    }
    if line.starts_with("      ") {
        if let (Some(spec), Some(name)) = (section.specs.last_mut(), line.split_whitespace().next()) {
            spec.dependencies.push(name.to_string());
        }
        return;
    }
    let Some((key, value)) = line.trim().split_once(": ") else {
        return;
    };
    let value = Some(value.trim().to_string());
    match key {
        "remote" => section.remote = value,
        "revision" => section.revision = value,
        "branch" => section.branch = value,
        "ref" | "tag" => section.reference = value,
        _ => {}
    }
}

/// `1.10.4-x86_64-linux` locks version `1.10.4`
fn strip_platform(version: &str) -> &str {
    version.split_once('-').map_or(version, |(v, _)| v)
}

/// Puts the original `RUBY VERSION`/`BUNDLED WITH` ending back onto a
/// regenerated lockfile, dropping any ending the original did not have
pub fn replace_lockfile_ending(updated: &str, original: &str) -> String {
    let ending = LOCKFILE_ENDING_RE
        .find(original)
        .map_or("\n", |m| m.as_str());
    LOCKFILE_ENDING_RE.replace(updated, regex::NoExpand(ending)).into_owned()
}

/// Keeps the `GIT` sections in the order the original lockfile had them
pub fn reorder_git_sections(updated: &str, original: &str) -> String {
    let (Some(new_run), Some(old_run)) = (git_run(updated), git_run(original)) else {
        return updated.to_string();
    };
    let new_blocks = blocks(&updated[new_run.clone()]);
    let old_blocks = blocks(&original[old_run]);
    if new_blocks.len() != old_blocks.len() {
        return updated.to_string();
    }

    let mut keyed = Vec::with_capacity(new_blocks.len());
    for block in new_blocks {
        let Some(remote) = block.lines().find_map(|l| l.trim().strip_prefix("remote: ")) else {
            return updated.to_string();
        };
        let Some(index) = old_blocks.iter().position(|b| b.contains(remote)) else {
            return updated.to_string();
        };
        keyed.push((index, block));
    }
    keyed.sort_by_key(|(index, _)| *index);

    let reordered: String = keyed.into_iter().map(|(_, block)| block).collect();
    let mut result = updated.to_string();
    result.replace_range(new_run, &reordered);
    result
}

/// Byte range of the consecutive `GIT` blocks, each ending in a blank line
fn git_run(content: &str) -> Option<std::ops::Range<usize>> {
    let start = if content.starts_with("GIT\n") {
        0
    } else {
        content.find("\nGIT\n")? + 1
    };
    let mut end = start;
    while content[end..].starts_with("GIT\n") {
        end += content[end..].find("\n\n")? + 2;
    }
    Some(start..end)
}

fn blocks(run: &str) -> Vec<&str> {
    run.split_inclusive("\n\n").collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKFILE: &str = "GIT
  remote: https://github.com/gocardless/business
  revision: a1b78a929dac93a52f08db4f2847d76d6cfe39bd
  ref: a1b78a9
  specs:
    business (1.5.0)

GEM
  remote: https://rubygems.org/
  specs:
    i18n (0.7.0)
    nokogiri (1.10.4-x86_64-linux)
      mini_portile2 (~> 2.4.0)
    mini_portile2 (2.4.0)
    statesman (1.2.1)

PLATFORMS
  ruby

DEPENDENCIES
  business!
  nokogiri (~> 1.10)
  statesman (~> 1.2.0)

RUBY VERSION
   ruby 2.6.3p62

BUNDLED WITH
   1.17.3
";

    #[test]
    fn test_parse_sections() {
        let lockfile = Lockfile::parse(LOCKFILE);
        assert_eq!(lockfile.sections.len(), 2);
        assert_eq!(lockfile.sections[0].kind, SectionKind::Git);
        assert_eq!(lockfile.sections[0].reference.as_deref(), Some("a1b78a9"));
        assert_eq!(lockfile.dependencies, vec!["business", "nokogiri", "statesman"]);
        assert_eq!(lockfile.bundled_with.as_deref(), Some("1.17.3"));
        assert_eq!(lockfile.ruby_version.as_deref(), Some("ruby 2.6.3p62"));
    }

    #[test]
    fn test_locked_versions() {
        let lockfile = Lockfile::parse(LOCKFILE);
        assert_eq!(lockfile.locked_version("statesman").as_deref(), Some("1.2.1"));
        assert_eq!(lockfile.locked_version("nokogiri").as_deref(), Some("1.10.4"));
        assert_eq!(
            lockfile.locked_version("business").as_deref(),
            Some("a1b78a929dac93a52f08db4f2847d76d6cfe39bd")
        );
        assert_eq!(lockfile.locked_version("rails"), None);

        let (_, nokogiri) = lockfile.spec("nokogiri").unwrap();
        assert_eq!(nokogiri.dependencies, vec!["mini_portile2"]);
        assert!(!lockfile.is_top_level("i18n"));
    }

    #[test]
    fn test_replace_lockfile_ending() {
        let regenerated = "GEM\n  specs:\n    statesman (1.3.1)\n\nBUNDLED WITH\n   2.4.10\n";
        let result = replace_lockfile_ending(regenerated, LOCKFILE);
        assert!(result.ends_with("RUBY VERSION\n   ruby 2.6.3p62\n\nBUNDLED WITH\n   1.17.3\n"));
        assert!(result.starts_with("GEM\n  specs:\n    statesman (1.3.1)"));
    }

    #[test]
    fn test_ending_dropped_when_original_had_none() {
        let original = "GEM\n  specs:\n    statesman (1.2.1)\n";
        let regenerated = "GEM\n  specs:\n    statesman (1.3.1)\n\nBUNDLED WITH\n   2.4.10\n";
        assert_eq!(
            replace_lockfile_ending(regenerated, original),
            "GEM\n  specs:\n    statesman (1.3.1)\n"
        );
    }

    #[test]
    fn test_reorder_git_sections() {
        let original = "GIT\n  remote: https://github.com/a/one\n  specs:\n    one (1.0)\n\nGIT\n  remote: https://github.com/a/two\n  specs:\n    two (1.0)\n\nGEM\n";
        let updated = "GIT\n  remote: https://github.com/a/two\n  specs:\n    two (1.1)\n\nGIT\n  remote: https://github.com/a/one\n  specs:\n    one (1.1)\n\nGEM\n";
        let reordered = reorder_git_sections(updated, original);
        assert_eq!(
            reordered,
            "GIT\n  remote: https://github.com/a/one\n  specs:\n    one (1.1)\n\nGIT\n  remote: https://github.com/a/two\n  specs:\n    two (1.1)\n\nGEM\n"
        );
    }
}

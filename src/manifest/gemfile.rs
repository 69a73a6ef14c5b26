//! Gemfile parser for Ruby projects
//!
//! Handles:
//! - gem declarations with version constraints
//! - `group` blocks and `group:`/`groups:` options
//! - git (`git:`, `github:`, `branch:`, `ref:`, `tag:`) and `path:` sources,
//!   inline or from `git`/`path` blocks
//! - Non-literal requirements, reported as dynamic

use super::ruby_call::{find_declarations, Declaration};
use crate::domain::{Requirement, RequirementSource};
use regex::Regex;
use std::sync::LazyLock;

static GROUP_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*group\b(?P<args>.*?)\bdo\b").unwrap());

static GIT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*git\s*\(?\s*["'](?P<url>[^"']+)["'](?P<rest>.*?)\bdo\b"#).unwrap()
});

static PATH_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*path\s*\(?\s*["'](?P<path>[^"']+)["'].*?\bdo\b"#).unwrap());

static BLOCK_OPENER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:if|unless|case|begin|while|until|def|class|module)\b|\bdo\s*(?:\|[^|]*\|)?\s*$")
        .unwrap()
});

static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*end\b").unwrap());

static GROUP_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#":(?P<sym>\w+)|["'](?P<str>\w+)["']"#).unwrap());

static BLOCK_OPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:(?P<label>\w+):|:(?P<sym>\w+)\s*=>)\s*["'](?P<value>[^"']+)["']"#).unwrap()
});

/// Bundler's requirement for a bare `gem 'name'`
pub const DEFAULT_REQUIREMENT: &str = ">= 0";

const GEMFILE_METHODS: &[&str] = &["gem"];

#[derive(Debug, Clone)]
enum Block {
    Group(Vec<String>),
    Source(RequirementSource),
    Other,
}

/// Block context in effect for one line
#[derive(Debug, Clone, Default)]
struct LineContext {
    groups: Vec<String>,
    source: Option<RequirementSource>,
}

/// A gem declared in a Gemfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemfileEntry {
    pub name: String,
    pub requirement: Requirement,
}

/// Parser for Gemfile and gems.rb files
pub struct GemfileParser;

impl GemfileParser {
    pub fn parse(&self, file_name: &str, content: &str) -> Vec<GemfileEntry> {
        let contexts = line_contexts(content);
        let line_starts = line_starts(content);

        find_declarations(content, GEMFILE_METHODS)
            .iter()
            .filter_map(|declaration| {
                let line = line_index(&line_starts, declaration.args_span.start);
                let context = contexts.get(line).cloned().unwrap_or_default();
                entry_for(file_name, declaration, context)
            })
            .collect()
    }
}

fn entry_for(file_name: &str, declaration: &Declaration, context: LineContext) -> Option<GemfileEntry> {
    let name = declaration.name()?.to_string();

    let requirement = match declaration.requirement_strings() {
        Some(strings) if strings.is_empty() => Requirement::new(file_name, DEFAULT_REQUIREMENT),
        Some(strings) => Requirement::new(file_name, strings.join(", ")),
        None => Requirement::dynamic(file_name),
    };

    let option_groups: Vec<String> = ["group", "groups"]
        .iter()
        .filter_map(|key| declaration.option(key))
        .flat_map(|arg| arg.names())
        .map(str::to_string)
        .collect();
    let groups = if !option_groups.is_empty() {
        option_groups
    } else if !context.groups.is_empty() {
        context.groups
    } else {
        vec!["default".to_string()]
    };

    let requirement = requirement.with_groups(groups);
    let requirement = match declared_source(declaration).or(context.source) {
        Some(source) => requirement.with_source(source),
        None => requirement,
    };

    Some(GemfileEntry { name, requirement })
}

/// Source named by the declaration's own options
pub fn declared_source(declaration: &Declaration) -> Option<RequirementSource> {
    let mut source = if let Some(url) = declaration.string_option("git") {
        RequirementSource::git(url)
    } else if let Some(repo) = declaration.string_option("github") {
        RequirementSource::git(github_url(repo))
    } else if let Some(path) = declaration.string_option("path") {
        return Some(RequirementSource::path(path));
    } else {
        return None;
    };

    if let Some(branch) = declaration.string_option("branch") {
        source = source.with_branch(branch);
    }
    if let Some(reference) = declaration
        .string_option("ref")
        .or_else(|| declaration.string_option("tag"))
    {
        source = source.with_ref(reference);
    }
    Some(source)
}

/// `github: "rails"` is shorthand for `rails/rails`
fn github_url(repo: &str) -> String {
    let repo = if repo.contains('/') {
        repo.to_string()
    } else {
        format!("{repo}/{repo}")
    };
    format!("https://github.com/{repo}.git")
}

fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

fn line_index(starts: &[usize], offset: usize) -> usize {
    match starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    }
}

fn line_contexts(content: &str) -> Vec<LineContext> {
    let mut stack: Vec<Block> = Vec::new();
    let mut contexts = Vec::new();

    for line in content.lines() {
        contexts.push(context_for(&stack));

        let code = line.trim_start();
        if code.starts_with('#') {
            continue;
        }
        if BLOCK_END_RE.is_match(line) {
            stack.pop();
        } else if let Some(caps) = GROUP_BLOCK_RE.captures(line) {
            let groups = GROUP_NAME_RE
                .captures_iter(&caps["args"])
                .filter_map(|c| c.name("sym").or_else(|| c.name("str")))
                .map(|m| m.as_str().to_string())
                .collect();
            stack.push(Block::Group(groups));
        } else if let Some(caps) = GIT_BLOCK_RE.captures(line) {
            stack.push(Block::Source(git_block_source(&caps["url"], &caps["rest"])));
        } else if let Some(caps) = PATH_BLOCK_RE.captures(line) {
            stack.push(Block::Source(RequirementSource::path(&caps["path"])));
        } else if BLOCK_OPENER_RE.is_match(line) {
            stack.push(Block::Other);
        }
    }

    contexts
}

fn git_block_source(url: &str, rest: &str) -> RequirementSource {
    let mut source = RequirementSource::git(url);
    for caps in BLOCK_OPTION_RE.captures_iter(rest) {
        let Some(key) = caps.name("label").or_else(|| caps.name("sym")) else {
            continue;
        };
        let value = &caps["value"];
        match key.as_str() {
            "branch" => source = source.with_branch(value),
            "ref" | "tag" => source = source.with_ref(value),
            _ => {}
        }
    }
    source
}

fn context_for(stack: &[Block]) -> LineContext {
    let mut context = LineContext::default();
    for block in stack {
        match block {
            Block::Group(groups) => context.groups.extend(groups.iter().cloned()),
            Block::Source(source) => context.source = Some(source.clone()),
            Block::Other => {}
        }
    }
    context
}

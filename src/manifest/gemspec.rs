//! Gemspec parser
//!
//! `add_dependency` and `add_runtime_dependency` declare runtime
//! requirements, `add_development_dependency` development ones.

use super::gemfile::DEFAULT_REQUIREMENT;
use super::ruby_call::find_declarations;
use crate::domain::Requirement;

pub const GEMSPEC_METHODS: &[&str] = &[
    "add_dependency",
    "add_runtime_dependency",
    "add_development_dependency",
];

/// A dependency declared in a gemspec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemspecEntry {
    pub name: String,
    pub requirement: Requirement,
}

pub struct GemspecParser;

impl GemspecParser {
    pub fn parse(&self, file_name: &str, content: &str) -> Vec<GemspecEntry> {
        find_declarations(content, GEMSPEC_METHODS)
            .into_iter()
            .filter_map(|declaration| {
                let name = declaration.name()?.to_string();
                let group = if declaration.method == "add_development_dependency" {
                    "development"
                } else {
                    "runtime"
                };
                let requirement = match declaration.requirement_strings() {
                    Some(strings) if strings.is_empty() => {
                        Requirement::new(file_name, DEFAULT_REQUIREMENT)
                    }
                    Some(strings) => Requirement::new(file_name, strings.join(", ")),
                    None => Requirement::dynamic(file_name),
                };
                Some(GemspecEntry {
                    name,
                    requirement: requirement.with_groups([group]),
                })
            })
            .collect()
    }
}

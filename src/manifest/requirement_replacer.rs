//! Rewrites requirement arguments of a declaration in place
//!
//! The replacement keeps the declaration's quote style (including `%q()`
//! strings and symbols), whether the operator is followed by a space, and
//! whether an explicit `=` was used. Trailing comments keep their column.

use super::ruby_call::{declarations_for, find_declarations, Arg, ArgKind};
use crate::domain::Operator;

/// Which declaration calls a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Gemfile,
    Gemspec,
    Podfile,
}

impl FileType {
    pub fn for_file(name: &str) -> Option<Self> {
        let basename = name.rsplit('/').next().unwrap_or(name);
        match basename {
            "Gemfile" | "gems.rb" => Some(FileType::Gemfile),
            "Podfile" => Some(FileType::Podfile),
            _ if basename.ends_with(".gemspec") => Some(FileType::Gemspec),
            _ => None,
        }
    }

    pub fn methods(&self) -> &'static [&'static str] {
        match self {
            FileType::Gemfile => &["gem"],
            FileType::Gemspec => super::gemspec::GEMSPEC_METHODS,
            FileType::Podfile => &["pod"],
        }
    }
}

pub struct RequirementReplacer<'a> {
    dependency_name: &'a str,
    file_type: FileType,
    updated_requirement: &'a str,
    previous_requirement: Option<&'a str>,
    insert_if_bare: bool,
}

impl<'a> RequirementReplacer<'a> {
    pub fn new(dependency_name: &'a str, file_type: FileType, updated_requirement: &'a str) -> Self {
        Self {
            dependency_name,
            file_type,
            updated_requirement,
            previous_requirement: None,
            insert_if_bare: false,
        }
    }

    /// Previous requirement text, used to keep trailing comments aligned
    pub fn with_previous_requirement(mut self, previous: Option<&'a str>) -> Self {
        self.previous_requirement = previous;
        self
    }

    /// Add the requirement to declarations that have none
    pub fn insert_if_bare(mut self, insert: bool) -> Self {
        self.insert_if_bare = insert;
        self
    }

    pub fn rewrite(&self, content: &str) -> String {
        let declarations = find_declarations(content, self.file_type.methods());
        let mut edits: Vec<(std::ops::Range<usize>, String)> = Vec::new();

        for declaration in declarations_for(&declarations, self.dependency_name) {
            let requirement_args = &declaration.positional;
            if requirement_args.is_empty() {
                if self.insert_if_bare {
                    let at = declaration.name.span.end;
                    let style = Style::default();
                    edits.push((at..at, format!(", {}", self.new_requirement_string(&style))));
                }
                continue;
            }
            let Some(style) = Style::from_args(content, requirement_args) else {
                continue;
            };
            let range = requirement_args[0].span.start
                ..requirement_args[requirement_args.len() - 1].span.end;
            edits.push((range, self.new_requirement_string(&style)));
        }

        let mut updated = content.to_string();
        for (range, text) in edits.into_iter().rev() {
            updated.replace_range(range, &text);
        }
        self.update_comment_spacing(content, updated)
    }

    fn new_requirement_string(&self, style: &Style) -> String {
        self.updated_requirement
            .split(',')
            .map(|clause| {
                let clause = if style.equality_operator {
                    clause.trim().to_string()
                } else {
                    strip_equality_operator(clause).trim().to_string()
                };
                let quoted = format!("{}{}{}", style.open, clause, style.close);
                if style.space_after_operator {
                    quoted
                } else {
                    quoted.replace(' ', "")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn length_change(&self) -> isize {
        let Some(previous) = self.previous_requirement else {
            return 0;
        };
        let previous = match previous.strip_prefix('=') {
            Some(rest) => rest.trim(),
            None => previous,
        };
        self.updated_requirement.len() as isize - previous.len() as isize
    }

    /// Shifts a trailing comment on the first changed line back to its
    /// original column
    fn update_comment_spacing(&self, original: &str, updated: String) -> String {
        let change = self.length_change();
        if self.previous_requirement.is_none() || updated == original || change == 0 {
            return updated;
        }

        let original_lines: Vec<&str> = original.split_inclusive('\n').collect();
        let mut lines: Vec<String> = updated.split_inclusive('\n').map(str::to_string).collect();
        let Some(index) = (0..lines.len()).find(|&i| original_lines.get(i) != Some(&lines[i].as_str()))
        else {
            return updated;
        };

        let line = &lines[index];
        let Some(hash) = line.find('#') else {
            return updated;
        };
        let before = &line[..hash];
        let trailing_blanks = before.len() - before.trim_end().len();

        let adjusted = if change > 0 {
            let remove = change as usize;
            if trailing_blanks <= remove {
                return updated;
            }
            format!("{}{}", &line[..hash - remove], &line[hash..])
        } else {
            if trailing_blanks < 2 {
                return updated;
            }
            let pad = " ".repeat(change.unsigned_abs());
            format!("{before}{pad}{}", &line[hash..])
        };
        lines[index] = adjusted;
        lines.concat()
    }
}

/// Formatting of the existing requirement arguments
struct Style {
    open: String,
    close: String,
    space_after_operator: bool,
    equality_operator: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            open: "\"".to_string(),
            close: "\"".to_string(),
            space_after_operator: true,
            equality_operator: true,
        }
    }
}

impl Style {
    /// `None` for requirements that are not literals
    fn from_args(content: &str, args: &[Arg]) -> Option<Self> {
        if args.iter().any(Arg::is_expr) {
            return None;
        }
        let first = match &args[0].kind {
            ArgKind::Array(items) => items.first()?,
            _ => &args[0],
        };
        let (open, close) = match &first.kind {
            ArgKind::Str { open, close, .. } => (open.clone(), close.clone()),
            ArgKind::Symbol(_) => (":\"".to_string(), "\"".to_string()),
            _ => return None,
        };
        let source = &content[first.span.clone()];
        let has_operator = Operator::ALL.iter().any(|op| source.contains(op.as_str()));
        Some(Self {
            open,
            close,
            space_after_operator: !has_operator || source.contains(' '),
            equality_operator: has_equality_operator(source),
        })
    }
}

/// An `=` that is not part of `>=`, `<=` or `!=`
fn has_equality_operator(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'=' && (i == 0 || !matches!(bytes[i - 1], b'<' | b'>' | b'!')))
}

fn strip_equality_operator(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '=' && !matches!(previous, Some('<' | '>' | '!')) {
            previous = Some(c);
            continue;
        }
        result.push(c);
        previous = Some(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gemfile(content: &str, requirement: &str) -> String {
        RequirementReplacer::new("business", FileType::Gemfile, requirement).rewrite(content)
    }

    #[test]
    fn test_keeps_quote_style() {
        assert_eq!(
            gemfile("gem 'business', '~> 1.4.0'\n", "~> 1.13.0"),
            "gem 'business', '~> 1.13.0'\n"
        );
        assert_eq!(
            gemfile("gem \"business\", \"~> 1.4.0\"\n", "~> 1.13.0"),
            "gem \"business\", \"~> 1.13.0\"\n"
        );
    }

    #[test]
    fn test_only_targets_named_gem() {
        let content = "gem \"business\", \"~> 1.4.0\"\ngem \"business_calendar\", \"~> 1.4.0\"\n";
        assert_eq!(
            gemfile(content, "~> 1.13.0"),
            "gem \"business\", \"~> 1.13.0\"\ngem \"business_calendar\", \"~> 1.4.0\"\n"
        );
    }

    #[test]
    fn test_space_after_operator() {
        assert_eq!(
            gemfile("gem \"business\", \"~>1.4.0\"\n", "~> 1.13.0"),
            "gem \"business\", \"~>1.13.0\"\n"
        );
    }

    #[test]
    fn test_equality_operator_usage() {
        assert_eq!(
            gemfile("gem \"business\", \"1.4.0\"\n", "= 1.13.0"),
            "gem \"business\", \"1.13.0\"\n"
        );
        assert_eq!(
            gemfile("gem \"business\", \"= 1.4.0\"\n", "= 1.13.0"),
            "gem \"business\", \"= 1.13.0\"\n"
        );
    }

    #[test]
    fn test_multiple_clauses_become_separate_arguments() {
        assert_eq!(
            gemfile("gem \"business\", \">= 1.0\", \"< 1.5.0\"\n", ">= 1.0, < 1.14.0"),
            "gem \"business\", \">= 1.0\", \"< 1.14.0\"\n"
        );
        assert_eq!(
            gemfile("gem \"business\", \"~> 1.4\"\n", ">= 1.4, < 3.0"),
            "gem \"business\", \">= 1.4\", \"< 3.0\"\n"
        );
    }

    #[test]
    fn test_skips_dynamic_requirements() {
        let content = "gem \"business\", BUSINESS_VERSION\n";
        assert_eq!(gemfile(content, "~> 1.13.0"), content);
    }

    #[test]
    fn test_bare_declaration() {
        let content = "gem \"business\", require: false\n";
        assert_eq!(gemfile(content, "~> 1.13.0"), content);

        let inserted = RequirementReplacer::new("business", FileType::Gemfile, "~> 1.13.0")
            .insert_if_bare(true)
            .rewrite(content);
        assert_eq!(inserted, "gem \"business\", \"~> 1.13.0\", require: false\n");
    }

    #[test]
    fn test_percent_strings() {
        let content = "  spec.add_dependency(%q<business>, %q(~> 1.0))\n";
        let updated = RequirementReplacer::new("business", FileType::Gemspec, ">= 1.0, < 3.0")
            .rewrite(content);
        assert_eq!(updated, "  spec.add_dependency(%q<business>, %q(>= 1.0), %q(< 3.0))\n");
    }

    #[test]
    fn test_comment_alignment_kept() {
        let content = "gem \"business\", \"~> 1.4.0\"   # business days\ngem \"rake\"         # tasks\n";
        let updated = RequirementReplacer::new("business", FileType::Gemfile, "~> 1.13.0")
            .with_previous_requirement(Some("~> 1.4.0"))
            .rewrite(content);
        assert_eq!(
            updated,
            "gem \"business\", \"~> 1.13.0\"  # business days\ngem \"rake\"         # tasks\n"
        );

        let shrunk = RequirementReplacer::new("business", FileType::Gemfile, "~> 1.4.0")
            .with_previous_requirement(Some("~> 1.13.0"))
            .rewrite("gem \"business\", \"~> 1.13.0\"  # business days\n");
        assert_eq!(shrunk, "gem \"business\", \"~> 1.4.0\"   # business days\n");
    }

    #[test]
    fn test_podfile() {
        let updated = RequirementReplacer::new("Alamofire", FileType::Podfile, "~> 4.0.0")
            .rewrite("  pod 'Alamofire', '~> 3.0.0'\n");
        assert_eq!(updated, "  pod 'Alamofire', '~> 4.0.0'\n");
    }

    #[test]
    fn test_file_types() {
        assert_eq!(FileType::for_file("Gemfile"), Some(FileType::Gemfile));
        assert_eq!(FileType::for_file("backend/gems.rb"), Some(FileType::Gemfile));
        assert_eq!(FileType::for_file("example.gemspec"), Some(FileType::Gemspec));
        assert_eq!(FileType::for_file("Gemfile.lock"), None);
    }
}

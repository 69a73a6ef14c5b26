//! Rewrites or removes the git source options of a declaration

use super::requirement_replacer::FileType;
use super::ruby_call::{declarations_for, find_declarations, ArgKind};

/// Options that only make sense for git sources
const GIT_OPTIONS: &[&str] = &["git", "github", "branch", "ref", "tag", "commit"];

/// Moves a pinned `ref:`/`tag:` (or `:commit`/`:tag` in a Podfile) to a new value
pub struct GitPinReplacer<'a> {
    dependency_name: &'a str,
    file_type: FileType,
    new_pin: &'a str,
}

impl<'a> GitPinReplacer<'a> {
    pub fn new(dependency_name: &'a str, file_type: FileType, new_pin: &'a str) -> Self {
        Self {
            dependency_name,
            file_type,
            new_pin,
        }
    }

    pub fn rewrite(&self, content: &str) -> String {
        let declarations = find_declarations(content, self.file_type.methods());
        let mut edits = Vec::new();
        for declaration in declarations_for(&declarations, self.dependency_name) {
            for option in &declaration.options {
                if !matches!(option.key.as_str(), "ref" | "tag" | "commit") {
                    continue;
                }
                if let ArgKind::Str { open, close, .. } = &option.value.kind {
                    edits.push((
                        option.value.span.clone(),
                        format!("{open}{}{close}", self.new_pin),
                    ));
                }
            }
        }

        let mut updated = content.to_string();
        for (range, text) in edits.into_iter().rev() {
            updated.replace_range(range, &text);
        }
        updated
    }
}

/// Drops git options from a declaration that now comes from the registry
pub struct GitSourceRemover<'a> {
    dependency_name: &'a str,
    file_type: FileType,
}

impl<'a> GitSourceRemover<'a> {
    pub fn new(dependency_name: &'a str, file_type: FileType) -> Self {
        Self {
            dependency_name,
            file_type,
        }
    }

    pub fn rewrite(&self, content: &str) -> String {
        let declarations = find_declarations(content, self.file_type.methods());
        let mut edits = Vec::new();
        for declaration in declarations_for(&declarations, self.dependency_name) {
            if !declaration
                .options
                .iter()
                .any(|o| GIT_OPTIONS.contains(&o.key.as_str()))
            {
                continue;
            }

            let mut kept: Vec<&str> = declaration
                .positional
                .iter()
                .map(|arg| &content[arg.span.clone()])
                .collect();
            kept.extend(
                declaration
                    .options
                    .iter()
                    .filter(|o| !GIT_OPTIONS.contains(&o.key.as_str()))
                    .map(|o| &content[o.span.clone()]),
            );

            let range = declaration.name.span.end..declaration.args_span.end;
            let replacement: String = kept.iter().map(|arg| format!(", {arg}")).collect();
            edits.push((range, replacement));
        }

        let mut updated = content.to_string();
        for (range, text) in edits.into_iter().rev() {
            updated.replace_range(range, &text);
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replaces_ref_keeping_quotes() {
        let content = "gem \"business\", git: \"https://github.com/gocardless/business\", ref: 'v1.4.0'\n";
        let updated = GitPinReplacer::new("business", FileType::Gemfile, "v1.5.0").rewrite(content);
        assert_eq!(
            updated,
            "gem \"business\", git: \"https://github.com/gocardless/business\", ref: 'v1.5.0'\n"
        );
    }

    #[test]
    fn test_replaces_podfile_tag() {
        let content = "pod 'Result', :git => 'https://github.com/antitypical/Result.git', :tag => '3.0.0'\n";
        let updated = GitPinReplacer::new("Result", FileType::Podfile, "4.0.0").rewrite(content);
        assert!(updated.ends_with(":tag => '4.0.0'\n"));
    }

    #[test]
    fn test_branch_is_left_alone() {
        let content = "gem \"business\", git: \"https://github.com/gocardless/business\", branch: \"main\"\n";
        let updated = GitPinReplacer::new("business", FileType::Gemfile, "v1.5.0").rewrite(content);
        assert_eq!(updated, content);
    }

    #[test]
    fn test_removes_git_source() {
        let content =
            "gem \"business\", \"~> 1.0\", git: \"https://github.com/gocardless/business\", ref: \"a1b78a9\", require: false\ngem \"rake\"\n";
        let updated = GitSourceRemover::new("business", FileType::Gemfile).rewrite(content);
        assert_eq!(updated, "gem \"business\", \"~> 1.0\", require: false\ngem \"rake\"\n");
    }
}

//! Bundler dependency file parser

use super::{
    check_external_code, DependencySet, FileParser, GemfileParser, GemspecParser, Lockfile,
    ParserOptions, SectionKind,
};
use crate::domain::{Dependency, DependencyFile, PackageManager};
use crate::error::ManifestError;
use tracing::debug;

pub struct BundlerFileParser {
    options: ParserOptions,
}

impl BundlerFileParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }
}

fn is_gemfile(file: &DependencyFile) -> bool {
    file.name == "gems.rb" || (file.name.starts_with("Gemfile") && !file.name.ends_with(".lock"))
}

fn is_lockfile(file: &DependencyFile) -> bool {
    PackageManager::Bundler
        .lock_filenames()
        .contains(&file.name.as_str())
}

/// Top-level gemspecs only; nested ones belong to path gems
fn is_gemspec(file: &DependencyFile) -> bool {
    file.name.ends_with(".gemspec") && !file.name.contains('/')
}

impl FileParser for BundlerFileParser {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Bundler
    }

    fn parse(&self, files: &[DependencyFile]) -> Result<Vec<Dependency>, ManifestError> {
        let gemfiles: Vec<&DependencyFile> = files.iter().filter(|f| is_gemfile(f)).collect();
        let gemspecs: Vec<&DependencyFile> = files.iter().filter(|f| is_gemspec(f)).collect();
        if gemfiles.is_empty() && gemspecs.is_empty() {
            return Err(ManifestError::not_found("Gemfile"));
        }
        let lockfile = files
            .iter()
            .find(|f| is_lockfile(f))
            .map(|f| Lockfile::parse(f.content()));
        let locked = |name: &str| lockfile.as_ref().and_then(|l| l.locked_version(name));

        let mut set = DependencySet::new();
        for gemfile in &gemfiles {
            for entry in GemfileParser.parse(&gemfile.name, gemfile.content()) {
                set.add(
                    &entry.name,
                    locked(&entry.name),
                    Some(entry.requirement),
                    PackageManager::Bundler,
                );
            }
        }
        for gemspec in &gemspecs {
            for entry in GemspecParser.parse(&gemspec.name, gemspec.content()) {
                set.add(
                    &entry.name,
                    locked(&entry.name),
                    Some(entry.requirement),
                    PackageManager::Bundler,
                );
            }
        }
        if let Some(lockfile) = &lockfile {
            for (section, spec) in lockfile.specs() {
                if section.kind == SectionKind::Path {
                    continue;
                }
                set.add(&spec.name, locked(&spec.name), None, PackageManager::Bundler);
            }
        }

        let dependencies = set.into_dependencies();
        check_external_code(&dependencies, self.options)?;
        debug!(count = dependencies.len(), "parsed bundler dependencies");
        Ok(dependencies)
    }
}

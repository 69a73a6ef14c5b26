//! CocoaPods dependency file parser

use super::{check_external_code, DependencySet, FileParser, ParserOptions, PodfileLock, PodfileParser};
use crate::domain::{Dependency, DependencyFile, PackageManager};
use crate::error::ManifestError;

pub struct CocoaPodsFileParser {
    options: ParserOptions,
}

impl CocoaPodsFileParser {
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }
}

impl FileParser for CocoaPodsFileParser {
    fn package_manager(&self) -> PackageManager {
        PackageManager::CocoaPods
    }

    fn parse(&self, files: &[DependencyFile]) -> Result<Vec<Dependency>, ManifestError> {
        let podfile = files
            .iter()
            .find(|f| f.name == "Podfile")
            .ok_or_else(|| ManifestError::not_found("Podfile"))?;
        let lock = files
            .iter()
            .find(|f| f.name == "Podfile.lock")
            .map(|f| PodfileLock::parse(f.content()));
        let locked = |name: &str| lock.as_ref().and_then(|l| l.locked_version(name));

        let mut set = DependencySet::new();
        for entry in PodfileParser.parse(&podfile.name, podfile.content()) {
            set.add(
                &entry.name,
                locked(&entry.name),
                Some(entry.requirement),
                PackageManager::CocoaPods,
            );
        }
        if let Some(lock) = &lock {
            for (name, _) in &lock.pods {
                let declared = set_contains_root(&set, name);
                if !declared {
                    set.add(name, locked(name), None, PackageManager::CocoaPods);
                }
            }
        }

        let dependencies = set.into_dependencies();
        check_external_code(&dependencies, self.options)?;
        Ok(dependencies)
    }
}

/// Subspec declarations (`Firebase/Core`) cover their root pod
fn set_contains_root(set: &DependencySet, root: &str) -> bool {
    set.names()
        .any(|name| super::root_pod(name) == root)
}

//! Integration tests for depbot
//!
//! These tests verify:
//! - Reading and parsing Bundler and CocoaPods projects from disk
//! - Requirement rewriting for applications and libraries
//! - Manifest rewriting and writing back to disk
//! - Job configuration discovery

use depbot::domain::{Dependency, PackageManager, Requirement};
use depbot::manifest::{create_parser, load_dependency_files, FileUpdater, ManifestWriter, ParserOptions};
use depbot::update::{RequirementUpdate, RequirementsUpdater, UpdateStrategy};
use std::fs;
use tempfile::TempDir;

const GEMFILE: &str = r#"source "https://rubygems.org"

gemspec

gem "business", "~> 1.4.0"
gem "statesman", "~> 1.2.0"

group :development do
  gem "rake", ">= 12.0", "< 13.0"
end
"#;

const GEMSPEC: &str = r#"Gem::Specification.new do |spec|
  spec.name = "example"
  spec.version = "0.9.3"
  spec.add_runtime_dependency "business", "~> 1.0"
  spec.add_development_dependency "rspec", "~> 3.8"
end
"#;

const LOCKFILE: &str = "PATH
  remote: .
  specs:
    example (0.9.3)
      business (~> 1.0)

GEM
  remote: https://rubygems.org/
  specs:
    business (1.4.0)
      i18n
    i18n (0.7.0)
    rake (12.3.3)
    rspec (3.8.0)
    statesman (1.2.1)

DEPENDENCIES
  business (~> 1.4.0)
  example!
  rake (>= 12.0, < 13.0)
  rspec (~> 3.8)
  statesman (~> 1.2.0)

BUNDLED WITH
   1.17.3
";

fn bundler_project() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(dir.path().join("Gemfile"), GEMFILE).unwrap();
    fs::write(dir.path().join("Gemfile.lock"), LOCKFILE).unwrap();
    fs::write(dir.path().join("example.gemspec"), GEMSPEC).unwrap();
    dir
}

fn find<'a>(dependencies: &'a [Dependency], name: &str) -> &'a Dependency {
    dependencies
        .iter()
        .find(|d| d.name == name)
        .unwrap_or_else(|| panic!("{} not parsed", name))
}

mod parsing {
    use super::*;

    #[test]
    fn test_bundler_project_from_disk() {
        let dir = bundler_project();
        let files = load_dependency_files(dir.path(), PackageManager::Bundler, "/").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Gemfile", "Gemfile.lock", "example.gemspec"]);

        let dependencies = create_parser(PackageManager::Bundler, ParserOptions::default())
            .parse(&files)
            .unwrap();

        let business = find(&dependencies, "business");
        assert_eq!(business.version.as_deref(), Some("1.4.0"));
        let files: Vec<&str> = business.requirements.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(files, vec!["Gemfile", "example.gemspec"]);

        let rake = find(&dependencies, "rake");
        assert_eq!(rake.requirements[0].requirement.as_deref(), Some(">= 12.0, < 13.0"));
        assert_eq!(rake.requirements[0].groups, vec!["development"]);

        let rspec = find(&dependencies, "rspec");
        assert!(rspec.requirements[0].is_development());

        assert!(find(&dependencies, "i18n").subdependency);
        assert!(dependencies.iter().all(|d| d.name != "example"));
    }

    #[test]
    fn test_cocoapods_project_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Podfile"),
            "platform :ios, '11.0'\n\ntarget 'App' do\n  pod 'Alamofire', '~> 3.0.0'\nend\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("Podfile.lock"),
            "PODS:\n  - Alamofire (3.0.1)\n\nDEPENDENCIES:\n  - Alamofire (~> 3.0.0)\n\nCOCOAPODS: 1.5.3\n",
        )
        .unwrap();

        let files = load_dependency_files(dir.path(), PackageManager::CocoaPods, "/").unwrap();
        let dependencies = create_parser(PackageManager::CocoaPods, ParserOptions::default())
            .parse(&files)
            .unwrap();
        let alamofire = find(&dependencies, "Alamofire");
        assert_eq!(alamofire.version.as_deref(), Some("3.0.1"));
        assert_eq!(alamofire.requirements[0].requirement.as_deref(), Some("~> 3.0.0"));
    }

    #[test]
    fn test_git_sources_rejected_when_external_code_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Gemfile"),
            "gem \"business\", git: \"https://github.com/gocardless/business\"\n",
        )
        .unwrap();
        let files = load_dependency_files(dir.path(), PackageManager::Bundler, "/").unwrap();
        let options = ParserOptions {
            reject_external_code: true,
        };
        assert!(create_parser(PackageManager::Bundler, options).parse(&files).is_err());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Gemfile.lock"), LOCKFILE).unwrap();
        assert!(load_dependency_files(dir.path(), PackageManager::Bundler, "/").is_err());
    }
}

mod requirements {
    use super::*;

    fn update(requirements: Vec<Requirement>, strategy: UpdateStrategy, latest: &str) -> Vec<RequirementUpdate> {
        let version = depbot::domain::GemVersion::parse(latest).unwrap();
        RequirementsUpdater::new(requirements, strategy)
            .with_latest_version(Some(version.clone()))
            .with_latest_resolvable_version(Some(version))
            .updated_requirements()
            .unwrap()
    }

    fn text(update: &RequirementUpdate) -> &str {
        update.requirement().requirement.as_deref().unwrap()
    }

    #[test]
    fn test_application_requirements_are_bumped() {
        let updates = update(
            vec![
                Requirement::new("Gemfile", "~> 1.4.0"),
                Requirement::new("Gemfile", "1.4.0"),
            ],
            UpdateStrategy::BumpVersions,
            "1.13.0",
        );
        assert_eq!(text(&updates[0]), "~> 1.13.0");
        assert_eq!(text(&updates[1]), "1.13.0");
        assert!(updates.iter().all(RequirementUpdate::is_updated));
    }

    #[test]
    fn test_library_requirements_are_widened() {
        let updates = update(
            vec![Requirement::new("example.gemspec", "~> 1.4.0").with_groups(["runtime"])],
            UpdateStrategy::BumpVersionsIfNecessary,
            "1.13.0",
        );
        assert_eq!(text(&updates[0]), ">= 1.4, < 1.14");
    }

    #[test]
    fn test_lockfile_only_leaves_requirements_alone() {
        let updates = update(
            vec![Requirement::new("Gemfile", "~> 1.4.0")],
            UpdateStrategy::LockfileOnly,
            "1.13.0",
        );
        assert!(matches!(updates[0], RequirementUpdate::Unchanged(_)));
    }

    #[test]
    fn test_dynamic_requirement_is_unlockable() {
        let updates = update(
            vec![Requirement::dynamic("Gemfile")],
            UpdateStrategy::BumpVersions,
            "1.13.0",
        );
        assert!(updates[0].is_unlockable());
    }
}

mod updating {
    use super::*;

    #[tokio::test]
    async fn test_update_written_back_to_disk() {
        let dir = bundler_project();
        let files = load_dependency_files(dir.path(), PackageManager::Bundler, "/").unwrap();
        let dependencies = create_parser(PackageManager::Bundler, ParserOptions::default())
            .parse(&files)
            .unwrap();

        let business = find(&dependencies, "business");
        let requirements: Vec<Requirement> = business
            .requirements
            .iter()
            .map(|r| {
                if r.file == "Gemfile" {
                    r.clone().with_requirement("~> 1.13.0")
                } else {
                    r.clone()
                }
            })
            .collect();
        let updated = vec![business.updated(Some("1.13.0".to_string()), requirements)];

        let changed = FileUpdater::new(&updated, &files)
            .updated_dependency_files()
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name, "Gemfile");

        let result = ManifestWriter::new(false).write_all(dir.path(), &changed).unwrap();
        assert_eq!(result.written, vec!["Gemfile"]);

        let gemfile = fs::read_to_string(dir.path().join("Gemfile")).unwrap();
        assert!(gemfile.contains("gem \"business\", \"~> 1.13.0\""));
        assert!(gemfile.contains("gem \"statesman\", \"~> 1.2.0\""));
        assert_eq!(
            fs::read_to_string(dir.path().join("example.gemspec")).unwrap(),
            GEMSPEC
        );
    }
}

mod configuration {
    use super::*;
    use depbot::config::JobConfig;

    #[test]
    fn test_config_discovered_in_project() {
        let dir = bundler_project();
        fs::write(
            dir.path().join("depbot.toml"),
            "update_strategy = \"lockfile_only\"\n\n[[ignore]]\ndependency_name = \"rake\"\n",
        )
        .unwrap();

        let config = JobConfig::discover(dir.path()).unwrap();
        assert_eq!(config.update_strategy, Some(UpdateStrategy::LockfileOnly));
        let filter = config.update_filter();
        let version = depbot::domain::GemVersion::parse("13.0.0").unwrap();
        assert!(filter.is_ignored("rake", &version));
        assert!(!filter.is_ignored("business", &version));
    }
}

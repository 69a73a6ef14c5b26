//! Core domain models for depbot
//!
//! This module contains the fundamental types used throughout the application:
//! - RubyGems version and requirement types
//! - Dependency and per-file requirement declarations
//! - Dependency files written back to a repository
//! - Package manager tags with their configuration tables
//! - Hosting-provider sources and credentials
//! - Per-dependency update results and the job summary

mod dependency;
mod dependency_file;
mod gem_requirement;
mod gem_version;
mod package_manager;
mod source;
mod summary;
mod update_result;

pub use dependency::{Dependency, Requirement, RequirementSource};
pub use dependency_file::{ContentEncoding, DependencyFile, FileOperation};
pub use gem_requirement::{Clause, GemRequirement, IllformedRequirement, Operator};
pub use gem_version::{GemVersion, MalformedVersion, Segment};
pub use package_manager::{LabelDetails, PackageManager, PackageManagerTable, ToolVersionPolicy};
pub use source::{credential_for_host, Credential, Provider, Source};
pub use summary::UpdateSummary;
pub use update_result::{SkipReason, UpdateResult};

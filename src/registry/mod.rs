//! Registry adapters for fetching package version information
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - RubyGems API adapter
//! - CocoaPods trunk adapter
//! - Git ref advertisements for git-sourced dependencies

mod client;
mod cocoapods;
mod git_metadata;
mod rubygems;

pub use client::HttpClient;
pub use cocoapods::CocoaPodsAdapter;
pub use git_metadata::{git_host, normalize_git_url, GitMetadata, GitMetadataFetcher, GitRef, RefType};
pub use rubygems::RubyGemsAdapter;

#[cfg(test)]
pub(crate) use git_metadata::tests::upload_pack;

use crate::domain::PackageManager;
use crate::error::RegistryError;
use crate::update::VersionInfo;
use async_trait::async_trait;

/// Trait for registry adapters
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Get the package manager this adapter serves
    fn package_manager(&self) -> PackageManager;

    /// Get the registry name
    fn registry_name(&self) -> &'static str;

    /// Fetch available versions for a package
    async fn fetch_versions(&self, package: &str) -> Result<Vec<VersionInfo>, RegistryError>;
}

/// Create a registry adapter for the given package manager
pub fn create_adapter(package_manager: PackageManager, client: HttpClient) -> Box<dyn RegistryAdapter> {
    match package_manager {
        PackageManager::Bundler => Box::new(RubyGemsAdapter::new(client)),
        PackageManager::CocoaPods => Box::new(CocoaPodsAdapter::new(client)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_adapter() {
        let client = HttpClient::new().unwrap();
        let adapter = create_adapter(PackageManager::Bundler, client.clone());
        assert_eq!(adapter.registry_name(), "rubygems");

        let adapter = create_adapter(PackageManager::CocoaPods, client);
        assert_eq!(adapter.registry_name(), "cocoapods");
    }
}

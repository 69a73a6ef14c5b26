//! RubyGems Registry adapter
//!
//! Fetches package version information from the RubyGems registry.
//! API endpoint: https://rubygems.org/api/v1/versions/{gem}.json
//!
//! Yanked releases never appear in this listing. Platform-specific builds
//! (`java`, `x86-mingw32`, ...) are folded into the plain `ruby` release.

use crate::domain::PackageManager;
use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use crate::update::VersionInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// RubyGems registry base URL
const RUBYGEMS_URL: &str = "https://rubygems.org";

/// RubyGems Registry adapter
pub struct RubyGemsAdapter {
    client: HttpClient,
    base_url: String,
}

/// One entry of the versions listing
#[derive(Debug, Deserialize)]
struct GemVersionEntry {
    number: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

impl RubyGemsAdapter {
    /// Create a new RubyGems adapter
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: RUBYGEMS_URL.to_string(),
        }
    }

    /// Point at a private gem server or a test double
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the URL for a gem
    fn build_url(&self, gem: &str) -> String {
        format!(
            "{}/api/v1/versions/{}.json",
            self.base_url,
            urlencoding::encode(gem)
        )
    }
}

#[async_trait]
impl RegistryAdapter for RubyGemsAdapter {
    fn package_manager(&self) -> PackageManager {
        PackageManager::Bundler
    }

    fn registry_name(&self) -> &'static str {
        "rubygems"
    }

    async fn fetch_versions(&self, package: &str) -> Result<Vec<VersionInfo>, RegistryError> {
        let url = self.build_url(package);
        let entries: Vec<GemVersionEntry> = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        let mut versions: Vec<VersionInfo> = Vec::new();
        for entry in entries {
            if entry.platform.as_deref().is_some_and(|p| p != "ruby") {
                continue;
            }
            if versions.iter().any(|v| v.version == entry.number) {
                continue;
            }
            let released_at = entry
                .created_at
                .as_deref()
                .and_then(|t| t.parse::<DateTime<Utc>>().ok());
            versions.push(VersionInfo {
                version: entry.number,
                released_at,
                yanked: false,
            });
        }

        Ok(versions)
    }
}

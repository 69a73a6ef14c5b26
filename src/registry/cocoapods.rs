//! CocoaPods trunk adapter
//!
//! Fetches pod version information from the CocoaPods trunk service.
//! API endpoint: https://trunk.cocoapods.org/api/v1/pods/{name}

use crate::domain::PackageManager;
use crate::error::RegistryError;
use crate::registry::{HttpClient, RegistryAdapter};
use crate::update::VersionInfo;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Trunk base URL
const TRUNK_URL: &str = "https://trunk.cocoapods.org";

/// Trunk timestamps look like `2017-05-22 15:42:20 UTC`
const TRUNK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// CocoaPods trunk adapter
pub struct CocoaPodsAdapter {
    client: HttpClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PodResponse {
    #[serde(default)]
    versions: Vec<PodVersion>,
}

#[derive(Debug, Deserialize)]
struct PodVersion {
    name: String,
    #[serde(default)]
    created_at: Option<String>,
}

impl CocoaPodsAdapter {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: TRUNK_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_url(&self, pod: &str) -> String {
        // Subspecs (`Firebase/Core`) are published with their root pod
        let root = pod.split('/').next().unwrap_or(pod);
        format!("{}/api/v1/pods/{}", self.base_url, urlencoding::encode(root))
    }
}

fn parse_trunk_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TRUNK_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl RegistryAdapter for CocoaPodsAdapter {
    fn package_manager(&self) -> PackageManager {
        PackageManager::CocoaPods
    }

    fn registry_name(&self) -> &'static str {
        "cocoapods"
    }

    async fn fetch_versions(&self, package: &str) -> Result<Vec<VersionInfo>, RegistryError> {
        let url = self.build_url(package);
        let response: PodResponse = self
            .client
            .get_json(&url, package, self.registry_name())
            .await?;

        Ok(response
            .versions
            .into_iter()
            .map(|v| VersionInfo {
                released_at: v.created_at.as_deref().and_then(parse_trunk_time),
                version: v.name,
                yanked: false,
            })
            .collect())
    }
}

//! Hosting-provider descriptors and credentials

use serde::{Deserialize, Serialize};
use std::fmt;

/// Git hosting providers that pull requests can be opened against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Github,
    Gitlab,
    Azure,
    BitbucketServer,
}

impl Provider {
    pub fn default_hostname(&self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("github.com"),
            Provider::Gitlab => Some("gitlab.com"),
            Provider::Azure => Some("dev.azure.com"),
            Provider::BitbucketServer => None,
        }
    }

    pub fn default_api_endpoint(&self) -> Option<&'static str> {
        match self {
            Provider::Github => Some("https://api.github.com/"),
            Provider::Gitlab => Some("https://gitlab.com/api/v4"),
            Provider::Azure => Some("https://dev.azure.com/"),
            Provider::BitbucketServer => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Azure => "azure",
            Provider::BitbucketServer => "bitbucket_server",
        };
        f.write_str(name)
    }
}

/// Where pull requests are opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub provider: Provider,
    /// `owner/name`; for Azure `organization/project/_git/repository`
    pub repo: String,
    #[serde(default)]
    pub directory: Option<String>,
    /// Target branch; the repository default when absent
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
}

impl Source {
    pub fn new(provider: Provider, repo: impl Into<String>) -> Self {
        Self {
            provider,
            repo: repo.into(),
            directory: None,
            branch: None,
            hostname: None,
            api_endpoint: None,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname
            .as_deref()
            .or_else(|| self.provider.default_hostname())
    }

    /// API base URL without a trailing slash
    pub fn api_endpoint(&self) -> Option<String> {
        self.api_endpoint
            .as_deref()
            .or_else(|| self.provider.default_api_endpoint())
            .map(|e| e.trim_end_matches('/').to_string())
    }

    /// Directory of the manifests, always starting with `/`
    pub fn directory(&self) -> String {
        match self.directory.as_deref() {
            None | Some("") => "/".to_string(),
            Some(d) if d.starts_with('/') => d.to_string(),
            Some(d) => format!("/{}", d),
        }
    }

    /// Azure repositories are addressed as `organization/project/_git/repo`
    pub fn azure_parts(&self) -> Option<(&str, &str, &str)> {
        let parts: Vec<&str> = self.repo.split('/').collect();
        match parts.as_slice() {
            [organization, project, "_git", repository] => {
                Some((organization, project, repository))
            }
            _ => None,
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}/{}", self.hostname().unwrap_or("localhost"), self.repo)
    }
}

/// Authentication for one host
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// `git_source`, `rubygems_server`, ...
    #[serde(rename = "type")]
    pub credential_type: String,
    pub host: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl Credential {
    pub fn git_source(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            credential_type: "git_source".to_string(),
            host: host.into(),
            username: Some("x-access-token".to_string()),
            password: None,
            token: Some(token.into()),
        }
    }

    /// Token, or `username:password` for basic auth hosts
    pub fn secret(&self) -> Option<String> {
        if let Some(token) = &self.token {
            return Some(token.clone());
        }
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some(format!("{}:{}", u, p)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("type", &self.credential_type)
            .field("host", &self.host)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Find the git credential for a host
pub fn credential_for_host<'a>(credentials: &'a [Credential], host: &str) -> Option<&'a Credential> {
    credentials
        .iter()
        .find(|c| c.credential_type == "git_source" && c.host == host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let source = Source::new(Provider::Github, "gocardless/bump");
        assert_eq!(source.api_endpoint().as_deref(), Some("https://api.github.com"));
        assert_eq!(source.hostname(), Some("github.com"));
        assert_eq!(source.directory(), "/");
    }

    #[test]
    fn test_custom_endpoint_is_trimmed() {
        let source = Source::new(Provider::BitbucketServer, "bump")
            .with_api_endpoint("https://stash.example.com/rest/api/1.0/projects/APP/");
        assert_eq!(
            source.api_endpoint().as_deref(),
            Some("https://stash.example.com/rest/api/1.0/projects/APP")
        );
    }

    #[test]
    fn test_directory_normalization() {
        let source = Source::new(Provider::Gitlab, "a/b").with_directory("app");
        assert_eq!(source.directory(), "/app");
    }

    #[test]
    fn test_azure_parts() {
        let source = Source::new(Provider::Azure, "org/project/_git/repo");
        assert_eq!(source.azure_parts(), Some(("org", "project", "repo")));
        assert_eq!(Source::new(Provider::Azure, "org/repo").azure_parts(), None);
    }

    #[test]
    fn test_provider_serde() {
        let provider: Provider = serde_json::from_str("\"bitbucket_server\"").unwrap();
        assert_eq!(provider, Provider::BitbucketServer);
        assert_eq!(provider.to_string(), "bitbucket_server");
    }

    #[test]
    fn test_credential_debug_hides_secrets() {
        let cred = Credential::git_source("github.com", "secret-token");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("secret-token"));
        assert_eq!(cred.secret().as_deref(), Some("secret-token"));
    }
}

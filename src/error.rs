//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ManifestError: Issues reading or parsing manifests and lockfiles
//! - RequirementError: Requirement strings the updater cannot handle
//! - RegistryError: Issues with package registry communication
//! - ResolverError: Failures reported by the native package-manager helper
//! - ProviderError: Git hosting provider API failures
//! - ConfigError: Issues with job configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors related to manifest and lockfile handling
#[derive(Error, Debug)]
pub enum ManifestError {
    /// A required manifest or lockfile is missing
    #[error("dependency file not found: {path}")]
    NotFound { path: PathBuf },

    /// The file could not be evaluated by the native tool
    #[error("dependency file {path} is not evaluatable: {message}")]
    NotEvaluatable { path: PathBuf, message: String },

    /// The file could not be parsed
    #[error("dependency file {path} is not parseable: {message}")]
    NotParseable { path: PathBuf, message: String },

    /// The file contents could not be resolved by the native tool
    #[error("dependency file {path} is not resolvable: {message}")]
    NotResolvable { path: PathBuf, message: String },

    /// Git or path sources found where they are not allowed
    #[error("unexpected external code in {path}: {source_url}")]
    UnexpectedExternalCode { path: PathBuf, source_url: String },

    /// Failed to read a file from disk
    #[error("failed to read dependency file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file to disk
    #[error("failed to write dependency file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Updated content was expected but nothing changed
    #[error("expected {path} to change when updating {dependency}")]
    ContentUnchanged { path: PathBuf, dependency: String },
}

/// Errors raised while rewriting requirement strings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequirementError {
    /// The requirement string is not a valid gem requirement
    #[error("malformed requirement '{requirement}' in {file}")]
    Malformed { file: String, requirement: String },

    /// A clause excludes the new version and has no sensible rewrite
    #[error(
        "unexpected operation '{operator}' for unsatisfied requirement '{requirement}' in {file}"
    )]
    UnexpectedOperation {
        file: String,
        requirement: String,
        operator: String,
    },

    /// A resolved version string could not be parsed
    #[error("malformed version '{version}'")]
    MalformedVersion { version: String },
}

/// Errors related to package registry communication
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("package '{package}' not found in {registry} registry")]
    PackageNotFound { package: String, registry: String },

    #[error("failed to fetch package '{package}' from {registry}: {message}")]
    NetworkError {
        package: String,
        registry: String,
        message: String,
    },

    #[error("rate limit exceeded for {registry} registry")]
    RateLimitExceeded { registry: String },

    #[error("invalid response from {registry} for '{package}': {message}")]
    InvalidResponse {
        package: String,
        registry: String,
        message: String,
    },

    #[error("timeout while fetching '{package}' from {registry}")]
    Timeout { package: String, registry: String },

    #[error("authentication failed for {registry}: {message}")]
    AuthenticationError { registry: String, message: String },
}

/// A dependency and the requirement that blocked resolution
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlockingRequirement {
    pub name: String,
    pub requirement: String,
    #[serde(default)]
    pub required_by: Option<String>,
}

/// Errors reported across the native helper subprocess boundary
#[derive(Error, Debug)]
pub enum ResolverError {
    /// The resolver found no version set satisfying every constraint
    #[error("version conflict for {dependency}: {}", describe_conflicts(.conflicts))]
    Conflict {
        dependency: String,
        conflicts: Vec<BlockingRequirement>,
    },

    /// The helper exited with a structured error
    #[error("helper {function} failed with {error_class}: {message}")]
    HelperFailed {
        function: String,
        error_class: String,
        message: String,
        context: Box<HelperContext>,
    },

    /// The helper was killed by the timeout wrapper
    #[error("helper {function} timed out after {}s", .timeout.as_secs())]
    Timeout { function: String, timeout: Duration },

    /// The helper could not be started
    #[error("failed to run helper command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The installed native tool is outside the supported range
    #[error("{tool} {version} is not supported (supported: {supported})")]
    ToolVersionNotSupported {
        tool: String,
        version: String,
        supported: String,
    },

    /// A git dependency's ref could not be found
    #[error("git reference for {dependency} not found")]
    GitReferenceNotFound { dependency: String },

    /// Private registries or git hosts could not be reached
    #[error("source not reachable: {source_url}")]
    SourceNotReachable { source_url: String },

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Diagnostic details captured for a failed helper call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HelperContext {
    pub command: String,
    pub time_taken: Duration,
    pub stderr: String,
    pub trace: Vec<String>,
}

fn describe_conflicts(conflicts: &[BlockingRequirement]) -> String {
    if conflicts.is_empty() {
        return "no details reported".to_string();
    }
    conflicts
        .iter()
        .map(|c| match &c.required_by {
            Some(parent) => format!("{} ({}) required by {}", c.name, c.requirement, parent),
            None => format!("{} ({})", c.name, c.requirement),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by git hosting provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("repository not found: {repo}")]
    RepoNotFound { repo: String },

    #[error("repository is disabled: {repo}")]
    RepoDisabled { repo: String },

    #[error("repository is archived: {repo}")]
    RepoArchived { repo: String },

    #[error("authentication failed for {provider}: {message}")]
    Unauthorized { provider: String, message: String },

    #[error("forbidden by {provider}: {message}")]
    Forbidden { provider: String, message: String },

    #[error("branch {branch} has no history in common with the target branch")]
    NoHistoryInCommon { branch: String },

    #[error("branch {branch} is protected")]
    BranchProtected { branch: String },

    /// Network timeouts, 5xx responses and secondary rate limits
    #[error("transient {provider} error: {message}")]
    Transient { provider: String, message: String },

    #[error("{provider} API returned {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("invalid {provider} response: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("{provider} is missing configuration: {message}")]
    Misconfigured { provider: String, message: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("missing required setting: {key}")]
    Missing { key: String },
}

impl ManifestError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::NotFound { path: path.into() }
    }

    pub fn not_parseable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::NotParseable {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_evaluatable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ManifestError::NotEvaluatable {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_external_code(
        path: impl Into<PathBuf>,
        source_url: impl Into<String>,
    ) -> Self {
        ManifestError::UnexpectedExternalCode {
            path: path.into(),
            source_url: source_url.into(),
        }
    }

    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::ReadError {
            path: path.into(),
            source,
        }
    }

    pub fn write_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ManifestError::WriteError {
            path: path.into(),
            source,
        }
    }
}

impl RequirementError {
    pub fn malformed(file: impl Into<String>, requirement: impl Into<String>) -> Self {
        RequirementError::Malformed {
            file: file.into(),
            requirement: requirement.into(),
        }
    }
}

impl RegistryError {
    pub fn package_not_found(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::PackageNotFound {
            package: package.into(),
            registry: registry.into(),
        }
    }

    pub fn network_error(
        package: impl Into<String>,
        registry: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RegistryError::NetworkError {
            package: package.into(),
            registry: registry.into(),
            message: message.into(),
        }
    }

    pub fn rate_limit_exceeded(registry: impl Into<String>) -> Self {
        RegistryError::RateLimitExceeded {
            registry: registry.into(),
        }
    }

    pub fn timeout(package: impl Into<String>, registry: impl Into<String>) -> Self {
        RegistryError::Timeout {
            package: package.into(),
            registry: registry.into(),
        }
    }
}

impl ResolverError {
    /// Conflicts are something callers branch on, not a crash
    pub fn is_conflict(&self) -> bool {
        matches!(self, ResolverError::Conflict { .. })
    }

    pub fn error_class(&self) -> Option<&str> {
        match self {
            ResolverError::HelperFailed { error_class, .. } => Some(error_class),
            _ => None,
        }
    }
}

impl ProviderError {
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ProviderError::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Only transient failures are worth retrying by the caller
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transient { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Status code of an unclassified API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

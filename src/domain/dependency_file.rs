//! Files read from and written back to a repository

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// What should happen to a file when it is committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    #[default]
    Update,
    Create,
    Delete,
}

/// How `content` is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

/// A manifest, lockfile or support file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyFile {
    /// Path relative to `directory`
    pub name: String,
    #[serde(default = "default_directory")]
    pub directory: String,
    pub content: Option<String>,
    #[serde(default)]
    pub content_encoding: ContentEncoding,
    #[serde(default)]
    pub operation: FileOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
    /// Support files are needed for resolution but never updated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub support_file: bool,
}

fn default_directory() -> String {
    "/".to_string()
}

impl DependencyFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: default_directory(),
            content: Some(content.into()),
            content_encoding: ContentEncoding::Utf8,
            operation: FileOperation::Update,
            symlink_target: None,
            support_file: false,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_operation(mut self, operation: FileOperation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_symlink_target(mut self, target: impl Into<String>) -> Self {
        self.symlink_target = Some(target.into());
        self
    }

    pub fn as_support_file(mut self) -> Self {
        self.support_file = true;
        self
    }

    /// Returns a copy carrying new content
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        let mut file = self.clone();
        file.content = Some(content.into());
        file
    }

    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn is_binary(&self) -> bool {
        self.content_encoding == ContentEncoding::Base64
    }

    /// Repository path without a leading slash, e.g. `app/Gemfile`
    pub fn path(&self) -> String {
        let joined: PathBuf = Path::new(&self.directory).join(&self.name);
        let mut parts: Vec<String> = Vec::new();
        for component in joined.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    parts.pop();
                }
                _ => {}
            }
        }
        parts.join("/")
    }

    /// Path that should actually be written; follows symlinks
    pub fn write_path(&self) -> String {
        match &self.symlink_target {
            Some(target) => target.trim_start_matches('/').to_string(),
            None => self.path(),
        }
    }

    /// Bare filename without directories
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

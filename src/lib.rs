//! depbot - Dependency updater library for Bundler and CocoaPods
//!
//! This library provides:
//! - Manifest and lockfile parsing, and rewriting for new versions
//! - Update checking against registries, git remotes and the native resolver
//! - Pull request creation on GitHub, GitLab, Azure DevOps and Bitbucket Server

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod pull_request;
pub mod registry;
pub mod resolver;
pub mod update;

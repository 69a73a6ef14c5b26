//! CLI argument parsing module for depbot

use crate::update::UpdateStrategy;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Parse duration string in format: Nd (days), Nw (weeks), Nm (months)
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (number, days_per_unit) = if let Some(n) = s.strip_suffix('d') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('w') {
        (n, 7)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 30)
    } else {
        return Err(format!("invalid duration format: {}", s));
    };

    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", number))?;
    Ok(Duration::from_secs(number * days_per_unit * 24 * 60 * 60))
}

fn parse_strategy(s: &str) -> Result<UpdateStrategy, String> {
    UpdateStrategy::from_name(s).ok_or_else(|| {
        format!(
            "unknown update strategy '{}' (expected lockfile_only, bump_versions or bump_versions_if_necessary)",
            s
        )
    })
}

/// Dependency updater for Bundler and CocoaPods projects
#[derive(Parser, Debug, Clone)]
#[command(name = "depbot", version, about = "Dependency updater for Bundler and CocoaPods projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check dependencies and update the manifests and lockfile
    Update(UpdateArgs),
    /// Rewrite requirement entries for new versions (JSON in, JSON out)
    Requirements(RequirementsArgs),
    /// Update dependencies and open a pull request with the changes
    Pr(UpdateArgs),
}

/// Options shared by `update` and `pr`
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Repository checkout (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file (default: <path>/depbot.toml when present)
    #[arg(short, long, env = "DEPBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write updated files to disk (`update` only reports by default)
    #[arg(short, long)]
    pub write: bool,

    /// Override the configured update strategy
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<UpdateStrategy>,

    /// Exclude specific dependencies from update (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Update only specific dependencies (can be specified multiple times)
    #[arg(long, action = ArgAction::Append)]
    pub only: Vec<String>,

    /// Only update to versions released at least this long ago (e.g., 2w, 10d, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub age: Option<Duration>,

    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show changes in diff format
    #[arg(long)]
    pub diff: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RequirementsArgs {
    /// JSON request file; reads stdin when omitted or `-`
    pub input: Option<PathBuf>,

    /// Override the request's latest version
    #[arg(long)]
    pub latest_version: Option<String>,

    /// Override the request's latest resolvable version
    #[arg(long)]
    pub latest_resolvable_version: Option<String>,

    /// Override the request's update strategy
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<UpdateStrategy>,
}

impl RequirementsArgs {
    /// True when the request should come from stdin
    pub fn reads_stdin(&self) -> bool {
        self.input.as_deref().is_none_or(|p| p.as_os_str() == "-")
    }
}

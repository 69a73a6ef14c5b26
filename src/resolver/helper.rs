//! Native helper subprocess protocol
//!
//! A helper is a script run by the package manager's own runtime
//! (`ruby helper.rb`). It reads `{"function": ..., "args": {...}}` on stdin
//! and answers with `{"result": ...}` or
//! `{"error": ..., "error_class": ..., "trace": [...]}` on stdout.
//!
//! When a timeout is configured the command is wrapped in
//! `timeout -s KILL <seconds>`.

use crate::error::{HelperContext, ResolverError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Environment variable overriding the helper script path
pub const HELPERS_PATH_ENV: &str = "DEPBOT_HELPERS_PATH";

/// Environment variable overriding the helper timeout in seconds
pub const HELPERS_TIMEOUT_ENV: &str = "DEPBOT_NATIVE_HELPERS_TIMEOUT";

pub const MIN_TIMEOUT: Duration = Duration::from_secs(120);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(1800);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// stderr kept in error context
const MAX_STDERR_BYTES: usize = 50_000;

/// Keeps a timeout inside `[MIN_TIMEOUT, MAX_TIMEOUT]`
pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
}

/// Environment value first, then configuration, then the default
pub fn resolve_timeout(env_value: Option<&str>, configured: Option<u64>) -> Duration {
    let from_env = env_value.and_then(|v| match v.trim().parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!(value = v, "ignoring invalid {}", HELPERS_TIMEOUT_ENV);
            None
        }
    });
    from_env
        .or(configured)
        .map(Duration::from_secs)
        .map(clamp_timeout)
        .unwrap_or(DEFAULT_TIMEOUT)
}

/// Environment value first, then configuration, then the default
pub fn resolve_helper_path(
    env_value: Option<&str>,
    configured: Option<&Path>,
    default: &Path,
) -> PathBuf {
    match (env_value.filter(|v| !v.is_empty()), configured) {
        (Some(env), _) => PathBuf::from(env),
        (None, Some(path)) => path.to_path_buf(),
        (None, None) => default.to_path_buf(),
    }
}

/// What a finished process produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// Terminated by a signal rather than exiting
    pub killed: bool,
}

/// Runs external commands; swapped for a fake in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: &str,
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes with tokio
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: &str,
        cwd: Option<&Path>,
        env: &[(String, String)],
    ) -> std::io::Result<CommandOutput> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn()?;
        if let Some(mut input) = child.stdin.take() {
            input.write_all(stdin.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            killed: output.status.code().is_none(),
        })
    }
}

#[derive(Deserialize)]
struct HelperResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_class: Option<String>,
    #[serde(default)]
    trace: Option<Value>,
}

/// A configured helper script
#[derive(Clone)]
pub struct HelperSubprocess {
    runner: Arc<dyn CommandRunner>,
    runtime: String,
    script: PathBuf,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
}

impl HelperSubprocess {
    pub fn new(runner: Arc<dyn CommandRunner>, runtime: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            runtime: runtime.into(),
            script: script.into(),
            timeout: None,
            env: Vec::new(),
        }
    }

    /// Wrap the command in `timeout`; values are clamped
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.map(clamp_timeout);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Full argv, including the timeout wrapper
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(timeout) = self.timeout {
            argv.extend([
                "timeout".to_string(),
                "-s".to_string(),
                "KILL".to_string(),
                timeout.as_secs().to_string(),
            ]);
        }
        argv.push(self.runtime.clone());
        argv.push(self.script.display().to_string());
        argv
    }

    /// Calls `function` and returns its `result`
    pub async fn call(
        &self,
        function: &str,
        args: Value,
        cwd: Option<&Path>,
    ) -> Result<Value, ResolverError> {
        let argv = self.command_line();
        let command = argv.join(" ");
        let stdin = json!({ "function": function, "args": args }).to_string();

        debug!(function, command = %command, "running native helper");
        let start = Instant::now();
        let output = self
            .runner
            .run(&argv[0], &argv[1..], &stdin, cwd, &self.env)
            .await
            .map_err(|source| ResolverError::Spawn {
                command: command.clone(),
                source,
            })?;
        let time_taken = start.elapsed();

        if let (true, Some(timeout)) = (output.killed, self.timeout) {
            return Err(ResolverError::Timeout {
                function: function.to_string(),
                timeout,
            });
        }

        let context = |trace: Vec<String>| {
            Box::new(HelperContext {
                command: command.clone(),
                time_taken,
                stderr: truncate(&output.stderr, MAX_STDERR_BYTES),
                trace,
            })
        };

        let response: HelperResponse = match serde_json::from_str(&output.stdout) {
            Ok(response) => response,
            Err(_) => {
                let message = if output.stdout.trim().is_empty() {
                    "No output from command".to_string()
                } else {
                    output.stdout.clone()
                };
                return Err(ResolverError::HelperFailed {
                    function: function.to_string(),
                    error_class: "JSON::ParserError".to_string(),
                    message,
                    context: context(Vec::new()),
                });
            }
        };

        if output.success {
            debug!(function, elapsed_ms = time_taken.as_millis() as u64, "native helper finished");
            return Ok(response.result.unwrap_or(Value::Null));
        }

        Err(ResolverError::HelperFailed {
            function: function.to_string(),
            error_class: response.error_class.unwrap_or_default(),
            message: response.error.unwrap_or_default(),
            context: context(trace_lines(response.trace)),
        })
    }
}

fn trace_lines(trace: Option<Value>) -> Vec<String> {
    match trace {
        Some(Value::Array(lines)) => lines
            .into_iter()
            .map(|l| match l {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => s.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

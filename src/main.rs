//! depbot - Dependency updater CLI for Bundler and CocoaPods
//!
//! Exit codes: 0 on success, 1 on a fatal error, 2 when some dependency
//! checks failed.

use anyhow::Context;
use clap::Parser;
use depbot::cli::{Cli, Command, RequirementsArgs, UpdateArgs};
use depbot::config::JobConfig;
use depbot::orchestrator::{Orchestrator, RunOptions};
use depbot::output::{create_formatter, OutputConfig, OutputFormat};
use depbot::update::RequirementsRequest;
use std::io::{self, IsTerminal, Read, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "DEPBOT_LOG";

/// Logs go to stderr so stdout stays parseable
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Command::Update(args) => run_update(&cli, args, false).await,
        Command::Pr(args) => run_update(&cli, args, true).await,
        Command::Requirements(args) => run_requirements(args),
    }
}

fn load_config(args: &UpdateArgs) -> anyhow::Result<JobConfig> {
    let mut config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::discover(&args.path)?,
    };
    if args.strategy.is_some() {
        config.update_strategy = args.strategy;
    }
    Ok(config)
}

async fn run_update(cli: &Cli, args: &UpdateArgs, open_pull_request: bool) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    let output_config = OutputConfig::from_cli(args.json, args.diff, cli.verbose, cli.quiet)
        .with_color(io::stdout().is_terminal());
    let show_progress =
        output_config.format == OutputFormat::Text && !cli.quiet && io::stderr().is_terminal();

    if cli.verbose {
        eprintln!("depbot v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Target: {} ({})", args.path.display(), config.package_manager);
        if !args.write {
            eprintln!("Mode: dry-run");
        }
    }

    let options = RunOptions {
        write: args.write,
        only: args.only.clone(),
        exclude: args.exclude.clone(),
        min_age: args.age,
        show_progress,
    };
    let orchestrator = Orchestrator::new(config, &args.path, options)?;
    let result = orchestrator.run().await?;

    let formatter = create_formatter(output_config);
    let mut stdout = io::stdout().lock();
    formatter.format(&result, &mut stdout)?;

    if open_pull_request {
        let handle = orchestrator.create_pull_request(&result).await?;
        formatter.format_pull_request(handle.as_ref(), &mut stdout)?;
    }
    stdout.flush()?;

    if result.summary.has_failures() {
        Ok(ExitCode::from(2))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_requirements(args: &RequirementsArgs) -> anyhow::Result<ExitCode> {
    let input = match &args.input {
        Some(path) if !args.reads_stdin() => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read request from stdin")?;
            buffer
        }
    };

    let mut request: RequirementsRequest =
        serde_json::from_str(&input).context("invalid requirements request")?;
    if args.latest_version.is_some() {
        request.latest_version = args.latest_version.clone();
    }
    if args.latest_resolvable_version.is_some() {
        request.latest_resolvable_version = args.latest_resolvable_version.clone();
    }
    if args.strategy.is_some() {
        request.update_strategy = args.strategy;
    }

    let updates = request.updater()?.updated_requirements()?;
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &updates)?;
    writeln!(stdout)?;
    Ok(ExitCode::SUCCESS)
}

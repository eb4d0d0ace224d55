//! CLI for the source-patch tool.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use source_patch::diff;
use source_patch::prelude::*;
use source_patch::telemetry::{self, LogFormat};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "source-patch")]
#[command(author, version, about = "Apply ordered, idempotent text rules to source trees", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format (compact or json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a rule set to the files under the roots
    Apply {
        #[command(flatten)]
        target: Target,

        /// Compute outcomes without writing files
        #[arg(long)]
        dry_run: bool,

        /// Print a diff of every changed file
        #[arg(long)]
        diff: bool,

        /// Fail files whose output changes on a second pass
        #[arg(long)]
        verify: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report files that would change, without writing (exit 1 if any)
    Check {
        #[command(flatten)]
        target: Target,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the compiled rules of a rule set
    Rules {
        /// Rule set file (.yaml, .yml or .json)
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct Target {
    /// Rule set file (.yaml, .yml or .json)
    #[arg(short, long)]
    config: PathBuf,

    /// Root directories or files to process
    #[arg(default_value = ".")]
    roots: Vec<PathBuf>,

    /// File extension to process, added to the rule set's (repeatable)
    #[arg(short, long)]
    extension: Vec<String>,

    /// Glob pattern to exclude, added to the rule set's (repeatable)
    #[arg(long)]
    exclude: Vec<String>,

    /// Text encoding label, overriding the rule set's
    #[arg(long)]
    encoding: Option<String>,
}

impl Target {
    fn rewrite(&self) -> Result<Rewrite> {
        let mut config = RulesetConfig::load(&self.config)
            .with_context(|| format!("Failed to load rule set {}", self.config.display()))?;
        config.extensions.extend(self.extension.iter().cloned());
        config.exclude.extend(self.exclude.iter().cloned());
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.clone();
        }

        // First signal stops after the current file; a second one exits.
        let stop = StopSignal::new();
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register_conditional_shutdown(signal, 130, stop.flag())
                .context("Failed to install signal handler")?;
            signal_hook::flag::register(signal, stop.flag())
                .context("Failed to install signal handler")?;
        }

        let rewrite = Rewrite::from_config(&config)
            .with_context(|| format!("Invalid rule set '{}'", config.name))?
            .roots(self.roots.iter().cloned())
            .stop_signal(stop);
        Ok(rewrite)
    }
}

/// Failures that end the process before any file is processed.
struct ConfigFailure(anyhow::Error);

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = telemetry::init(cli.verbose, cli.log_format) {
        eprintln!("warning: {err}");
    }

    let outcome = match cli.command {
        Commands::Apply {
            target,
            dry_run,
            diff,
            verify,
            json,
        } => cmd_apply(&target, dry_run, diff, verify, json),
        Commands::Check { target, json } => cmd_check(&target, json),
        Commands::Rules { config } => cmd_rules(&config),
    };

    match outcome {
        Ok(code) => code,
        Err(ConfigFailure(err)) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn cmd_apply(
    target: &Target,
    dry_run: bool,
    show_diff: bool,
    verify: bool,
    json: bool,
) -> std::result::Result<ExitCode, ConfigFailure> {
    let mut rewrite = target.rewrite().map_err(ConfigFailure)?;
    if dry_run {
        rewrite = rewrite.dry_run();
    }
    if verify {
        rewrite = rewrite.verify_idempotence();
    }
    if show_diff {
        rewrite = rewrite.with_previews();
    }

    let report = rewrite
        .run()
        .context("Rewrite failed")
        .map_err(ConfigFailure)?;

    print_report(&report, json, show_diff).map_err(ConfigFailure)?;

    if report.all_failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(target: &Target, json: bool) -> std::result::Result<ExitCode, ConfigFailure> {
    let report = target
        .rewrite()
        .map_err(ConfigFailure)?
        .dry_run()
        .run()
        .context("Check failed")
        .map_err(ConfigFailure)?;

    print_report(&report, json, false).map_err(ConfigFailure)?;

    if report.updated > 0 || report.all_failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_rules(config: &Path) -> std::result::Result<ExitCode, ConfigFailure> {
    let load = || -> Result<(RulesetConfig, Pipeline)> {
        let config = RulesetConfig::load(config)
            .with_context(|| format!("Failed to load rule set {}", config.display()))?;
        let pipeline = config.pipeline().context("Invalid rule set")?;
        Ok((config, pipeline))
    };
    let (config, pipeline) = load().map_err(ConfigFailure)?;

    println!("{} ({} rule(s))", config.name, pipeline.len());
    if !config.description.is_empty() {
        println!("  {}", config.description);
    }
    for (index, line) in pipeline.describe().iter().enumerate() {
        println!("  {:>2}. {line}", index + 1);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport, json: bool, show_diff: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
        return Ok(());
    }

    let color = std::io::stdout().is_terminal();
    for file in &report.details {
        println!("{file}");
        if show_diff && let Some(preview) = &file.preview {
            if color {
                print!("{}", diff::colorize(preview));
            } else {
                print!("{preview}");
            }
        }
    }
    for root in &report.missing_roots {
        println!("Missing root: {}", root.display());
    }

    println!();
    println!("{report}");
    let changes = report.diff_summary();
    if changes.files_changed > 0 {
        println!("{changes}");
    }
    Ok(())
}

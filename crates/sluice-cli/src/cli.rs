//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use sluice_pipeline::RunMode;
use std::path::PathBuf;

/// Sluice - drain a task queue through a quota-limited transformer.
#[derive(Debug, Parser)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (default: ~/.sluice/config.toml)
    #[arg(short, long, global = true, env = "SLUICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minutes a task may stay processing before the sweeper reclaims it
    #[arg(long, global = true, alias = "reset-after")]
    pub stale_threshold_minutes: Option<u64>,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Arguments for the run modes.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Running mode
    #[arg(short, long, value_enum, default_value = "single")]
    pub mode: ModeArg,

    /// Tasks fetched per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Seconds between batches in draining modes
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Stop after this many iterations
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Concurrent workers
    #[arg(short, long)]
    pub pool_size: Option<usize>,
}

/// Running modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Process one batch
    Single,
    /// Process batches until the queue is empty or the quota runs out
    #[value(alias = "until-empty")]
    DrainUntilEmpty,
    /// Keep polling for work until stopped
    Continuous,
    /// Print task counts without changing anything
    Status,
}

impl ModeArg {
    /// Driver mode, or `None` for the read-only status mode
    pub fn run_mode(self) -> Option<RunMode> {
        match self {
            ModeArg::Single => Some(RunMode::Single),
            ModeArg::DrainUntilEmpty => Some(RunMode::DrainUntilEmpty),
            ModeArg::Continuous => Some(RunMode::Continuous),
            ModeArg::Status => None,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (bare values)
    Quiet,
}

/// Operator commands; without one, the selected mode runs.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add tasks to the queue
    Enqueue(EnqueueArgs),

    /// Reclaim tasks stuck in processing
    Sweep(SweepArgs),

    /// Move failed tasks back to pending
    RetryFailed(RetryFailedArgs),

    /// Print task counts (same as --mode status)
    Status,

    /// Print the effective configuration
    ShowConfig,
}

/// Arguments for the enqueue command.
#[derive(Debug, Parser)]
pub struct EnqueueArgs {
    /// Payload references (URLs, object keys, ...)
    pub payload_refs: Vec<String>,

    /// Read payload references from a file (one per line)
    #[arg(short = 'F', long)]
    pub file: Option<PathBuf>,
}

/// Arguments for the sweep command.
#[derive(Debug, Parser)]
pub struct SweepArgs {
    /// Count stale tasks without reclaiming them
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the retry-failed command.
#[derive(Debug, Parser)]
pub struct RetryFailedArgs {
    /// Only requeue tasks whose retry count is below this value
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_single_mode() {
        let cli = Cli::parse_from(["sluice"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.run.mode, ModeArg::Single);
        assert_eq!(cli.run.mode.run_mode(), Some(RunMode::Single));
    }

    #[test]
    fn test_mode_flags() {
        let cli = Cli::parse_from([
            "sluice",
            "--mode",
            "continuous",
            "--batch-size",
            "10",
            "--interval",
            "5",
            "--max-iterations",
            "3",
            "--stale-threshold-minutes",
            "45",
            "-v",
        ]);
        assert_eq!(cli.run.mode, ModeArg::Continuous);
        assert_eq!(cli.run.batch_size, Some(10));
        assert_eq!(cli.run.interval, Some(5));
        assert_eq!(cli.run.max_iterations, Some(3));
        assert_eq!(cli.stale_threshold_minutes, Some(45));
        assert!(cli.verbose);
    }

    #[test]
    fn test_mode_alias() {
        let cli = Cli::parse_from(["sluice", "--mode", "until-empty"]);
        assert_eq!(cli.run.mode, ModeArg::DrainUntilEmpty);

        let cli = Cli::parse_from(["sluice", "--mode", "status"]);
        assert_eq!(cli.run.mode.run_mode(), None);
    }

    #[test]
    fn test_sweep_command() {
        let cli = Cli::parse_from(["sluice", "sweep", "--dry-run", "--reset-after", "60"]);
        match cli.command {
            Some(Command::Sweep(args)) => assert!(args.dry_run),
            _ => panic!("Expected Sweep command"),
        }
        assert_eq!(cli.stale_threshold_minutes, Some(60));
    }

    #[test]
    fn test_enqueue_command() {
        let cli = Cli::parse_from(["sluice", "enqueue", "https://a", "https://b"]);
        match cli.command {
            Some(Command::Enqueue(args)) => assert_eq!(args.payload_refs.len(), 2),
            _ => panic!("Expected Enqueue command"),
        }
    }

    #[test]
    fn test_retry_failed_command() {
        let cli = Cli::parse_from(["sluice", "retry-failed", "--max-retries", "3"]);
        match cli.command {
            Some(Command::RetryFailed(args)) => assert_eq!(args.max_retries, Some(3)),
            _ => panic!("Expected RetryFailed command"),
        }
    }
}

//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use opsched_types::RetryMode;
use std::path::PathBuf;

/// opsched - run shell commands as scheduled operations
#[derive(Parser)]
#[command(name = "opsched")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run shell commands as scheduled operations with admission control")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging and show queue activity
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run each shell command as one operation
    Run(RunArgs),

    /// Show the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Maximum number of operations running at once
    #[arg(short, long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Admission and cancellation polling interval
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Retry failed operations once with this mode
    #[arg(long, value_enum, value_name = "MODE")]
    pub retry_failed: Option<RetryMode>,

    /// Start every operation immediately, ignoring the concurrency cap
    #[arg(long)]
    pub no_queue: bool,

    /// Shell commands, one operation each
    #[arg(last = true, required = true, value_name = "CMD")]
    pub commands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parses_commands_after_separator() {
        let cli = Cli::try_parse_from([
            "opsched",
            "run",
            "--parallel",
            "2",
            "--retry-failed",
            "admin",
            "--",
            "make build",
            "make test",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.parallel, Some(2));
        assert_eq!(args.retry_failed, Some(RetryMode::RetryAsAdmin));
        assert!(!args.no_queue);
        assert_eq!(args.commands, vec!["make build", "make test"]);
    }

    #[test]
    fn test_run_requires_a_command() {
        assert!(Cli::try_parse_from(["opsched", "run"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["opsched", "config", "--json", "--debug"]).unwrap();
        assert!(cli.global.json);
        assert!(cli.global.debug);
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn test_unknown_retry_mode_rejected() {
        assert!(Cli::try_parse_from([
            "opsched",
            "run",
            "--retry-failed",
            "sometimes",
            "--",
            "true"
        ])
        .is_err());
    }
}

//! opsched - run shell commands as scheduled operations
//!
//! Every command given to `opsched run` becomes one operation. Operations
//! share a single admission queue, so at most `parallel_operations` of them
//! run at once and the rest wait their turn in arrival order.

mod cli;
mod command;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs, RunArgs};
use crate::command::CommandBody;
use crate::display::{OperationSummary, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use opsched_config::Config;
use opsched_errors::Error;
use opsched_events::{ChannelObserver, EventReceiver};
use opsched_ops::{Operation, RetryDispatch};
use opsched_queue::AdmissionQueue;
use opsched_types::OperationStatus;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting opsched v{}", env!("CARGO_PKG_VERSION"));

    // defaults < file < environment < CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    if let Commands::Run(args) = &cli.command {
        apply_cli_config(&mut config, args);
    }

    let renderer = OutputRenderer::new(cli.global.json);
    match cli.command {
        Commands::Config => {
            renderer.render_config(&config)?;
            Ok(())
        }
        Commands::Run(args) => {
            let summaries = run_commands(args, &config, &cli.global).await?;
            renderer.render_summary(&summaries)?;

            let failed = summaries
                .iter()
                .filter(|summary| summary.status != OperationStatus::Succeeded)
                .count();
            if failed > 0 {
                return Err(CliError::Unsuccessful {
                    failed,
                    total: summaries.len(),
                });
            }
            info!("All operations completed successfully");
            Ok(())
        }
    }
}

/// Run every command as an operation, retrying failures once if requested
async fn run_commands(
    args: RunArgs,
    config: &Config,
    global: &GlobalArgs,
) -> Result<Vec<OperationSummary>, CliError> {
    let (event_sender, mut event_receiver) = opsched_events::channel();
    let queue = AdmissionQueue::builder()
        .with_config(&config.scheduler)
        .with_event_sender(event_sender.clone())
        .build();

    let colors_enabled = console::Term::stderr().features().colors_supported();
    let mut event_handler = EventHandler::new(colors_enabled, global.debug, global.json);

    let operations: Vec<(String, Operation)> = args
        .commands
        .iter()
        .map(|command| {
            let body = Arc::new(CommandBody::new(command.as_str()));
            let operation = Operation::builder(queue.clone(), body.clone())
                .with_metadata(body.metadata())
                .with_queue_enabled(!args.no_queue)
                .with_observer(Arc::new(ChannelObserver::new(event_sender.clone())))
                .build();
            event_handler.register(operation.id(), command.as_str());
            (command.clone(), operation)
        })
        .collect();

    let mut tasks = JoinSet::new();
    for (_, operation) in &operations {
        let operation = operation.clone();
        tasks.spawn(async move { operation.run().await });
    }
    drive(&mut tasks, &operations, &mut event_receiver, &mut event_handler).await?;

    if let Some(mode) = args.retry_failed {
        for (command, operation) in &operations {
            if operation.status() != OperationStatus::Failed {
                continue;
            }
            info!(command = %command, %mode, "retrying failed operation");
            if let RetryDispatch::Relaunched(handle) = operation.retry(mode)? {
                tasks.spawn(async move {
                    handle
                        .await
                        .unwrap_or_else(|e| Err(Error::internal(e.to_string())))
                });
            }
        }
        drive(&mut tasks, &operations, &mut event_receiver, &mut event_handler).await?;
    }

    Ok(operations
        .iter()
        .map(|(command, operation)| OperationSummary::capture(command.as_str(), operation))
        .collect())
}

/// Wait for every spawned lifecycle pass while rendering events
async fn drive(
    tasks: &mut JoinSet<Result<(), Error>>,
    operations: &[(String, Operation)],
    event_receiver: &mut EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<(), CliError> {
    loop {
        select! {
            joined = tasks.join_next() => match joined {
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => warn!(error = %e, "operation rejected"),
                Some(Err(e)) => return Err(CliError::Ops(Error::internal(e.to_string()))),
                None => {
                    // Drain any remaining events
                    while let Ok(message) = event_receiver.try_recv() {
                        event_handler.handle_event(&message);
                    }
                    return Ok(());
                }
            },

            Some(message) = event_receiver.recv() => {
                event_handler.handle_event(&message);
            }

            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, canceling operations");
                for (_, operation) in operations {
                    operation.cancel();
                }
            }
        }
    }
}

/// Apply command-specific CLI flags (highest precedence)
fn apply_cli_config(config: &mut Config, args: &RunArgs) {
    if let Some(parallel) = args.parallel {
        config.scheduler.parallel_operations = parallel.max(1);
    }
    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.scheduler.poll_interval_ms = poll_interval_ms;
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let default_filter = if debug_enabled {
        "info,opsched=debug,opsched_ops=debug,opsched_queue=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        // JSON mode: structured records on stderr keep stdout clean for results
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(debug_enabled)
            .init();
    }

    if debug_enabled {
        info!(
            started_at = %chrono::Utc::now().to_rfc3339(),
            "debug logging enabled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["opsched", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            Commands::Config => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_flags_override_config() {
        let mut config = Config::default();
        apply_cli_config(
            &mut config,
            &run_args(&["--parallel", "4", "--poll-interval-ms", "25", "--", "true"]),
        );
        assert_eq!(config.scheduler.parallel_operations, 4);
        assert_eq!(config.scheduler.poll_interval_ms, 25);
    }

    #[test]
    fn test_zero_parallel_flag_means_one() {
        let mut config = Config::default();
        apply_cli_config(&mut config, &run_args(&["--parallel", "0", "--", "true"]));
        assert_eq!(config.scheduler.parallel_operations, 1);
    }

    #[tokio::test]
    async fn test_cli_flag_beats_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nparallel_operations = 2").unwrap();

        let mut config = Config::load_or_default(Some(file.path())).await.unwrap();
        assert_eq!(config.scheduler.parallel_operations, 2);

        apply_cli_config(&mut config, &run_args(&["-p", "3", "--", "true"]));
        assert_eq!(config.scheduler.parallel_operations, 3);
    }

    #[tokio::test]
    async fn test_run_commands_reports_each_operation() {
        let config = Config::default();
        let global = GlobalArgs {
            json: true,
            debug: false,
            config: None,
        };
        let args = run_args(&["--parallel", "2", "--", "true", "exit 1"]);

        let summaries = run_commands(args, &config, &global).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].status, OperationStatus::Succeeded);
        assert_eq!(summaries[1].status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_failed_reruns_with_mode() {
        let config = Config::default();
        let global = GlobalArgs {
            json: true,
            debug: false,
            config: None,
        };
        let args = run_args(&[
            "--retry-failed",
            "skip-integrity",
            "--",
            "test \"$OPSCHED_SKIP_INTEGRITY_CHECK\" = 1",
        ]);

        let summaries = run_commands(args, &config, &global).await.unwrap();

        assert_eq!(summaries[0].status, OperationStatus::Succeeded);
        assert_eq!(
            summaries[0].badges.map(|b| b.skip_integrity_check),
            Some(true)
        );
    }
}

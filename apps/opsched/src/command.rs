//! Shell commands as operation bodies

use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use opsched_errors::{Error, OperationError};
use opsched_ops::{Operation, OperationBody};
use opsched_types::{BadgeSet, LineKind, OperationMetadata, PackageScope, RetryMode, Verdict};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Set for the child process when retried with the integrity check skipped
pub const SKIP_INTEGRITY_ENV: &str = "OPSCHED_SKIP_INTEGRITY_CHECK";

/// How the next attempt launches the command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub as_administrator: bool,
    pub interactive: bool,
    pub skip_integrity_check: bool,
}

impl RunOptions {
    fn apply(&mut self, mode: RetryMode) {
        match mode {
            RetryMode::NoRetry | RetryMode::Retry => {}
            RetryMode::RetryAsAdmin => self.as_administrator = true,
            RetryMode::RetryInteractive => self.interactive = true,
            RetryMode::RetrySkipIntegrityCheck => self.skip_integrity_check = true,
        }
    }

    fn badges(self) -> BadgeSet {
        let scope = if self.as_administrator {
            PackageScope::Machine
        } else {
            PackageScope::User
        };
        BadgeSet::new(
            self.as_administrator,
            self.interactive,
            self.skip_integrity_check,
            Some(scope),
        )
    }
}

/// Runs one shell command through `sh -c`
#[derive(Debug)]
pub struct CommandBody {
    command: String,
    options: Mutex<RunOptions>,
}

impl CommandBody {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: Mutex::new(RunOptions::default()),
        }
    }

    pub fn options(&self) -> RunOptions {
        *self.options.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Strings shown for this command's operation
    pub fn metadata(&self) -> OperationMetadata {
        let command = &self.command;
        OperationMetadata {
            title: format!("Run `{command}`"),
            status: format!("`{command}` is running"),
            success_title: format!("`{command}` finished"),
            success_message: format!("`{command}` completed successfully"),
            failure_title: format!("`{command}` failed"),
            failure_message: format!("`{command}` did not complete"),
            operation_information: format!("Starting `{command}`"),
        }
    }

    fn build_command(&self, options: RunOptions) -> Command {
        let mut command = if options.as_administrator {
            let mut sudo = Command::new("sudo");
            if !options.interactive {
                sudo.arg("-n");
            }
            sudo.args(["sh", "-c", &self.command]);
            sudo
        } else {
            let mut sh = Command::new("sh");
            sh.args(["-c", &self.command]);
            sh
        };

        command
            .stdin(if options.interactive {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if options.skip_integrity_check {
            command.env(SKIP_INTEGRITY_ENV, "1");
        }
        command
    }
}

#[async_trait]
impl OperationBody for CommandBody {
    async fn perform(&self, operation: &Operation) -> Result<Verdict, Error> {
        let options = self.options();
        operation.apply_capabilities(options.badges());
        tracing::debug!(operation = %operation.id(), command = %self.command, ?options, "spawning command");

        let mut child = self.build_command(options).spawn().map_err(|e| {
            OperationError::CommandFailed {
                command: self.command.clone(),
                message: e.to_string(),
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            forward(stdout, operation, LineKind::StandardOutput),
            forward(stderr, operation, LineKind::StandardError),
        );
        let status = child.wait().await?;

        if status.success() {
            Ok(Verdict::Success)
        } else {
            operation.line(describe_exit(status), LineKind::StandardError);
            Ok(Verdict::Failure)
        }
    }

    fn apply_retry(&self, mode: RetryMode) {
        let mut options = self.options.lock().unwrap_or_else(PoisonError::into_inner);
        options.apply(mode);
        tracing::debug!(command = %self.command, %mode, options = ?options, "retry mode applied");
    }

    async fn icon(&self) -> Result<String, Error> {
        let program = self.command.split_whitespace().next().unwrap_or("sh");
        Ok(format!("opsched://icons/command/{program}"))
    }
}

async fn forward<R>(stream: Option<R>, operation: &Operation, kind: LineKind)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => operation.line(line, kind),
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(operation = %operation.id(), error = %e, "stopped reading command output");
                break;
            }
        }
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("Process exited with code {code}"),
        None => "Process was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsched_queue::AdmissionQueue;
    use opsched_types::{LogLine, OperationStatus};
    use std::sync::Arc;

    fn operation(command: &str) -> (Operation, Arc<CommandBody>) {
        let body = Arc::new(CommandBody::new(command));
        let op = Operation::builder(AdmissionQueue::new(1), body.clone())
            .with_metadata(body.metadata())
            .build();
        (op, body)
    }

    #[test]
    fn test_retry_modes_accumulate() {
        let body = CommandBody::new("true");
        body.apply_retry(RetryMode::Retry);
        assert_eq!(body.options(), RunOptions::default());

        body.apply_retry(RetryMode::RetryAsAdmin);
        body.apply_retry(RetryMode::RetrySkipIntegrityCheck);
        let options = body.options();
        assert!(options.as_administrator);
        assert!(options.skip_integrity_check);
        assert!(!options.interactive);
        assert_eq!(options.badges().scope, Some(PackageScope::Machine));
    }

    #[test]
    fn test_metadata_is_complete() {
        assert!(CommandBody::new("ls -la").metadata().validate().is_ok());
    }

    #[tokio::test]
    async fn test_icon_names_the_program() {
        let body = CommandBody::new("cargo build --release");
        assert_eq!(body.icon().await.unwrap(), "opsched://icons/command/cargo");
    }

    #[tokio::test]
    async fn test_streams_output_and_succeeds() {
        let (op, _) = operation("echo hello; echo oops >&2");
        op.run().await.unwrap();

        assert_eq!(op.status(), OperationStatus::Succeeded);
        let output = op.output();
        assert!(output.contains(&LogLine::new("hello", LineKind::StandardOutput)));
        assert!(output.contains(&LogLine::new("oops", LineKind::StandardError)));
        assert_eq!(op.badges().map(|b| b.as_administrator), Some(false));
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let (op, _) = operation("exit 3");
        op.run().await.unwrap();

        assert_eq!(op.status(), OperationStatus::Failed);
        assert!(op
            .output()
            .contains(&LogLine::new("Process exited with code 3", LineKind::StandardError)));
    }

    #[tokio::test]
    async fn test_skip_integrity_sets_environment() {
        let (op, body) = operation("test \"$OPSCHED_SKIP_INTEGRITY_CHECK\" = 1");
        op.run().await.unwrap();
        assert_eq!(op.status(), OperationStatus::Failed);

        body.apply_retry(RetryMode::RetrySkipIntegrityCheck);
        op.run().await.unwrap();
        assert_eq!(op.status(), OperationStatus::Succeeded);
        assert_eq!(op.badges().map(|b| b.skip_integrity_check), Some(true));
    }
}

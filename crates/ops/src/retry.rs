//! Re-running a finished operation

use opsched_errors::{ContractError, Error};
use opsched_types::{LineKind, RetryMode};
use tokio::task::JoinHandle;

use crate::Operation;

pub(crate) const RETRY_SEPARATOR: &str = "-----------------------";

/// What [`Operation::retry`] did after applying the retry mode
#[derive(Debug)]
pub enum RetryDispatch {
    /// A pass was still queued or running; only the body was adjusted
    AlreadyActive,
    /// A fresh lifecycle pass was spawned on the current runtime
    Relaunched(JoinHandle<Result<(), Error>>),
}

impl Operation {
    /// Apply `mode` to the body, log a retry banner and start a new pass if
    /// none is active.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::NoRetryMode`] for [`RetryMode::NoRetry`], and
    /// an internal error when called outside a Tokio runtime.
    pub fn retry(&self, mode: RetryMode) -> Result<RetryDispatch, Error> {
        if mode == RetryMode::NoRetry {
            return Err(ContractError::NoRetryMode.into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::internal(format!("retry requires a Tokio runtime: {e}")))?;

        self.body().apply_retry(mode);
        self.line("", LineKind::Info);
        self.line(RETRY_SEPARATOR, LineKind::Info);
        self.line(format!("Retrying operation with RetryMode={mode}"), LineKind::Info);
        self.line("", LineKind::Info);

        if self.status().is_active() {
            tracing::info!(operation = %self.id(), %mode, "retry applied to an active operation");
            return Ok(RetryDispatch::AlreadyActive);
        }

        tracing::info!(operation = %self.id(), %mode, "relaunching operation");
        let operation = self.clone();
        Ok(RetryDispatch::Relaunched(
            runtime.spawn(async move { operation.run().await }),
        ))
    }
}

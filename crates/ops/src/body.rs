//! The work an operation performs once admitted

use std::future::Future;

use async_trait::async_trait;
use opsched_errors::Error;
use opsched_types::{RetryMode, Verdict};

use crate::Operation;

/// Icon returned when a body does not provide its own
pub const DEFAULT_ICON: &str = "opsched://icons/operation";

/// Concrete behavior plugged into the generic lifecycle.
///
/// `perform` is called once per attempt; returning [`Verdict::AutoRetry`]
/// makes the lifecycle call it again immediately without re-entering the
/// admission queue. An `Err` or a panic counts as [`Verdict::Failure`].
#[async_trait]
pub trait OperationBody: Send + Sync {
    /// Run one attempt. Output goes through [`Operation::line`].
    async fn perform(&self, operation: &Operation) -> Result<Verdict, Error>;

    /// Adjust how the next attempt is made. Called before the retry banner.
    fn apply_retry(&self, mode: RetryMode);

    /// Icon identifier for presentation layers.
    async fn icon(&self) -> Result<String, Error> {
        Ok(DEFAULT_ICON.to_string())
    }
}

/// Body backed by an async closure; retry modes are ignored.
pub struct FnBody<F> {
    f: F,
}

impl<F> FnBody<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Operation) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Verdict, Error>> + Send,
    {
        Self { f }
    }
}

impl<F> std::fmt::Debug for FnBody<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBody").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> OperationBody for FnBody<F>
where
    F: Fn(Operation) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Verdict, Error>> + Send,
{
    async fn perform(&self, operation: &Operation) -> Result<Verdict, Error> {
        (self.f)(operation.clone()).await
    }

    fn apply_retry(&self, mode: RetryMode) {
        tracing::debug!(%mode, "closure body ignores retry mode");
    }
}

//! Per-call cancellation and deadline handling.
//!
//! Every async operation in this crate takes an [`OperationContext`]. Work
//! that waits on a collaborator is wrapped in [`OperationContext::run`] so a
//! cancelled or timed-out request stops waiting instead of producing a
//! partial result.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::AuthResult;
use crate::error::AuthError;

/// Cancellation signal and optional deadline for one inbound request.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Creates a context with no deadline that is cancelled only explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context bound to an existing cancellation token.
    #[must_use]
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Returns a copy of this context that expires after `timeout`.
    ///
    /// An earlier existing deadline wins.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy of this context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Returns a child context; cancelling the parent cancels the child.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every child derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns `true` once the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast when the context is already cancelled or past its deadline.
    pub fn check(&self) -> AuthResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(AuthError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drives `fut` to completion unless the context is cancelled or its
    /// deadline passes first, in which case `fut` is dropped.
    pub async fn run<F>(&self, fut: F) -> AuthResult<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthError::Cancelled),
            _ = expired => Err(AuthError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = OperationContext::new();
        let value = ctx.run(async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let ctx = OperationContext::new();
        ctx.cancel();
        let result = ctx.run(async { 1 }).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn test_child_cancelled_with_parent() {
        let parent = OperationContext::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_exceeded() {
        let ctx = OperationContext::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert!(matches!(result, Err(AuthError::DeadlineExceeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_run() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });
        let result = ctx.run(tokio::time::sleep(Duration::from_secs(5))).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let base = Instant::now();
        let ctx = OperationContext::new().with_deadline(base + Duration::from_secs(1));
        let later = ctx.with_deadline(base + Duration::from_secs(10));
        assert_eq!(later.deadline(), Some(base + Duration::from_secs(1)));
    }
}

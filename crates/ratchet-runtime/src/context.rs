//! Cancellation and deadline shared by every step of a unit.

use std::future::Future;
use std::time::Duration;

use ratchet_core::error::{RatchetError, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// The deadline is fixed when the context is built, so a context reused
/// across retry attempts bounds all of them together.
#[derive(Debug, Clone)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl RunContext {
    /// A context that only ends on cancellation.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context that also ends `timeout` from now.
    pub fn with_timeout(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Some((Instant::now() + timeout, timeout)),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.map(|(at, _)| at)
    }

    /// Fail if the context has already ended.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(RatchetError::Cancelled);
        }
        if let Some((at, timeout)) = self.deadline {
            if Instant::now() >= at {
                return Err(RatchetError::DeadlineExceeded(timeout));
            }
        }
        Ok(())
    }

    /// Resolve with the terminating error once the context ends.
    pub async fn done(&self) -> RatchetError {
        match self.deadline {
            Some((at, timeout)) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => RatchetError::Cancelled,
                    _ = tokio::time::sleep_until(at) => RatchetError::DeadlineExceeded(timeout),
                }
            }
            None => {
                self.token.cancelled().await;
                RatchetError::Cancelled
            }
        }
    }

    /// Run `fut` unless the context ends first.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }

    /// Sleep for `delay` unless the context ends first.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_passes_while_live() {
        let ctx = RunContext::with_timeout(CancellationToken::new(), Duration::from_secs(60));
        assert!(ctx.check().is_ok());
    }

    #[tokio::test]
    async fn test_check_after_cancel() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());
        token.cancel();
        assert!(matches!(ctx.check(), Err(RatchetError::Cancelled)));
    }

    #[tokio::test]
    async fn test_check_after_deadline() {
        let ctx = RunContext::with_timeout(CancellationToken::new(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(
            ctx.check(),
            Err(RatchetError::DeadlineExceeded(_))
        ));
    }

    #[tokio::test]
    async fn test_done_pending_until_cancelled() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());

        let mut done = tokio_test::task::spawn(ctx.done());
        tokio_test::assert_pending!(done.poll());

        token.cancel();
        assert!(done.is_woken());
        let err = tokio_test::assert_ready!(done.poll());
        assert!(matches!(err, RatchetError::Cancelled));
    }

    #[tokio::test]
    async fn test_guard_interrupts_slow_future() {
        let ctx = RunContext::with_timeout(CancellationToken::new(), Duration::from_millis(20));
        let result: Result<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RatchetError::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = RunContext::new(CancellationToken::new());
        let result = ctx.guard(async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn test_sleep_cut_short_by_cancel() {
        let token = CancellationToken::new();
        let ctx = RunContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let result = ctx.sleep(Duration::from_secs(30)).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(RatchetError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

//! Per-call deadline and cancellation

use super::traits::EngineError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Deadline and cancellation signal for a single engine call.
///
/// The service hands the context to the engine untouched; bindings wrap
/// their one request in [`CallContext::run`].
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every context cloned from the one it was created with
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CallContext {
    /// No deadline, not cancellable
    pub fn background() -> Self {
        Self::default()
    }

    /// Context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_in(timeout)
    }

    /// Context paired with a handle that cancels it
    pub fn cancellable() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        let ctx = Self {
            deadline: None,
            cancel: Some(receiver),
        };
        (ctx, CancelHandle { sender })
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now
    pub fn deadline_in(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Time left before the deadline, if one is set
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    /// Fail fast if the call may no longer start
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.is_expired() {
            return Err(EngineError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one engine call, aborting it on cancellation or deadline expiry
    pub async fn run<F, T>(&self, call: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        self.check()?;

        let guarded = async {
            tokio::select! {
                result = call => result,
                _ = self.cancelled() => Err(EngineError::Cancelled),
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(EngineError::DeadlineExceeded)),
            None => guarded.await,
        }
    }

    async fn cancelled(&self) {
        let Some(mut rx) = self.cancel.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling
                return std::future::pending().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_call() {
        let ctx = CallContext::background();
        let result = ctx.run(async { Ok::<_, EngineError>(42) }).await;
        assert_eq!(tokio_test::assert_ok!(result), 42);
    }

    #[tokio::test]
    async fn test_deadline_aborts_call() {
        let ctx = CallContext::with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, EngineError>(())
            })
            .await;
        assert!(matches!(result, Err(EngineError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_expired_context_never_starts_call() {
        let ctx = CallContext::background().with_deadline(Instant::now() - Duration::from_secs(1));
        let mut started = false;
        let result = ctx
            .run(async {
                started = true;
                Ok::<_, EngineError>(())
            })
            .await;
        assert!(matches!(result, Err(EngineError::DeadlineExceeded)));
        assert!(!started);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let (ctx, handle) = CallContext::cancellable();
        let call = ctx.run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, EngineError>(())
        });
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };
        let (result, _) = tokio::join!(call, cancel);
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_background_context_never_expires() {
        let ctx = CallContext::background();
        tokio_test::assert_ok!(ctx.check());
        let result = tokio_test::block_on(ctx.run(async { Ok::<_, EngineError>("done") }));
        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn test_remaining() {
        assert!(CallContext::background().remaining().is_none());
        let remaining = CallContext::with_timeout(Duration::from_secs(60))
            .remaining()
            .unwrap();
        assert!(remaining <= Duration::from_secs(60));
    }
}

//! Request-scoped cancellation and deadlines
//!
//! Every provider and function call receives a [`Context`]. It is cancelled
//! explicitly through [`Context::cancel`] or implicitly once its deadline
//! passes. Clones share cancellation.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            deadline: None,
            cancel: Arc::new(cancel),
        }
    }

    /// Derive a context that is also done after `timeout`. An earlier
    /// deadline already set is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        let mut rx = self.cancel.subscribe();
        let cancelled = async {
            // The sender lives as long as self, so this only ends on cancel.
            let _ = rx.wait_for(|c| *c).await;
        };
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = cancelled => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => cancelled.await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));

        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(80)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn context_manual_cancel_reaches_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();

        assert!(!clone.is_cancelled());

        ctx.cancel();

        assert!(clone.is_cancelled());
        clone.done().await;
    }

    #[tokio::test]
    async fn done_waits_for_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let started = Instant::now();
        ctx.done().await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn done_wakes_on_cancel() {
        let ctx = Context::new();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.done().await })
        };
        sleep(Duration::from_millis(10)).await;
        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn earlier_deadline_is_kept() {
        let ctx = Context::new().with_timeout(Duration::from_secs(1));
        let first = ctx.deadline().unwrap();
        let ctx = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(first));
        assert!(Context::new().deadline().is_none());
    }
}

//! Trailing-edge debouncing on top of tokio tasks

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs only the most recently scheduled job, once `delay` has passed without a newer one
///
/// Each [`Debouncer::schedule`] aborts the pending job (if any) and starts a fresh timer.
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending job with `job`, to run after the quiet period
    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        }));
    }

    /// Abort the pending job, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Whether a job is waiting or running
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the pending job to run to completion
    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending.take()
            && let Err(e) = handle.await
            && !e.is_cancelled()
        {
            tracing::error!("Debounced job failed: {}", e);
        }
    }
}

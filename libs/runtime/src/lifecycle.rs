use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result returned by background tasks.
type TaskResult = anyhow::Result<()>;

/// Reason why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    Cancelled,
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("already started")]
    AlreadyStarted,
}

/// Controller for a single long-lived background task bound to a
/// cancellation token. `stop` cancels the token, waits up to a deadline for
/// the task to return, and aborts it on overrun.
pub struct Lifecycle {
    handle: Mutex<Option<JoinHandle<()>>>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            handle: Mutex::new(None),
            cancel: Mutex::new(None),
        }
    }

    /// Spawn the task built by `make(token)`. The task must return promptly
    /// once the token is cancelled.
    pub fn start_with_token<F, Fut>(
        &self,
        token: CancellationToken,
        make: F,
    ) -> Result<(), LifecycleError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = TaskResult> + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(LifecycleError::AlreadyStarted);
        }

        {
            let mut cancel = self.cancel.lock();
            *cancel = Some(token.clone());
        }

        *handle = Some(tokio::spawn(async move {
            if let Err(e) = make(token).await {
                tracing::error!(error = %e, "background task error");
            }
        }));

        Ok(())
    }

    /// Request cancellation and wait up to `timeout` for the task to finish.
    pub async fn stop(&self, timeout: Duration) -> StopReason {
        let cancelled = if let Some(token) = { self.cancel.lock().take() } {
            token.cancel();
            true
        } else {
            false
        };

        let handle = { self.handle.lock().take() };
        let Some(handle) = handle else {
            return StopReason::Finished;
        };

        let abort = handle.abort_handle();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => {
                if cancelled {
                    StopReason::Cancelled
                } else {
                    StopReason::Finished
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "background task join error");
                StopReason::Finished
            }
            Err(_) => {
                tracing::warn!("background task stop timed out; aborting");
                abort.abort();
                StopReason::Timeout
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lifecycle {
    /// Best-effort cleanup to avoid orphaned tasks if `stop` was never called.
    fn drop(&mut self) {
        if let Some(token) = self.cancel.get_mut().take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

//! Process-wide shutdown coordination.
//!
//! One `CancellationToken` is the shutdown signal; every long-running loop
//! selects on it at its wait points. A `TaskTracker` counts the loops so the
//! main task can block until all of them have returned.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Why shutdown was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// OS interrupt (Ctrl+C / SIGINT)
    Interrupt,
    /// An admin asked for it from chat
    AdminCommand { user_id: i64 },
    /// Some component gave up
    Internal(String),
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::AdminCommand { user_id } => write!(f, "admin command by {}", user_id),
            ShutdownReason::Internal(reason) => write!(f, "internal: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
    raised: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Child handle for loops to select on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Raise the shutdown signal. Raising it again is a no-op.
    pub fn trigger(&self, reason: ShutdownReason) {
        let was_raised = self.raised.swap(true, Ordering::SeqCst);
        if !was_raised {
            warn!("Shutdown signal raised: {}", reason);
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a tracked loop. `wait` will not return before it does.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(async move {
            task.await;
            info!("{} completed", name);
        });
    }

    /// Trigger shutdown on Ctrl+C. The listener itself is tracked.
    pub fn listen_for_interrupt(&self) {
        let coordinator = self.clone();
        let token = self.token();
        self.spawn("interrupt listener", async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => coordinator.trigger(ShutdownReason::Interrupt),
                    Err(e) => {
                        error!("Unable to listen for shutdown signal: {}", e);
                        coordinator.trigger(ShutdownReason::Internal(e.to_string()));
                    }
                },
            }
        });
    }

    /// Number of tracked loops still running.
    pub fn running(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for the signal, then for every tracked loop to finish.
    pub async fn wait(&self) {
        self.token.cancelled().await;
        info!(
            "Shutdown signal received, waiting for {} tasks",
            self.tracker.len()
        );
        self.tracker.close();
        self.tracker.wait().await;
        warn!("Shutting down");
    }
}

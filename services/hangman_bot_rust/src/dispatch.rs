//! Dispatch pipeline.
//!
//! One inbound loop polls the transport and routes each message; a fixed pool
//! of sender workers drains a shared bounded outbound queue. When the queue is
//! full the inbound loop waits, which throttles routing to send throughput.
//!
//! On shutdown the inbound loop finishes its current batch and exits, dropping
//! the last queue sender. Workers keep sending until the queue is empty and
//! closed, so replies that were already computed are not lost.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hangman_rust_core::clients::Transport;
use hangman_rust_core::error::{HangmanError, Result};
use hangman_rust_core::models::{InboundMessage, OutboundMessage};
use hangman_rust_core::shutdown::ShutdownCoordinator;

use crate::router::CommandRouter;

/// Receiving half of the outbound queue, shared by every sender worker.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<OutboundMessage>>>;

/// Producer handle for the bounded outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundMessage>,
}

impl OutboundQueue {
    pub fn bounded(capacity: usize) -> (Self, SharedReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, Arc::new(Mutex::new(rx)))
    }

    /// Enqueue a reply, waiting while the queue is full.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| HangmanError::QueueClosed)
    }
}

/// Exponential backoff for a failing transport poll.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter fraction (0.0-1.0)
    pub jitter_pct: f64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_pct: 0.1,
        }
    }
}

impl RetryBackoff {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponential_ms = base_ms * 2f64.powi(attempt.saturating_sub(1).min(30) as i32);
        let capped_ms = exponential_ms.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped_ms * self.jitter_pct;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        Duration::from_millis((capped_ms + jitter).max(0.0) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub backoff: RetryBackoff,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 128,
            backoff: RetryBackoff::default(),
        }
    }
}

/// Handle to a started pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    inbound_finished: CancellationToken,
}

impl Pipeline {
    /// Spawn the inbound loop and `config.workers` sender workers on the
    /// coordinator's tracker. They stop when its token is cancelled.
    pub fn start(
        coordinator: &ShutdownCoordinator,
        transport: Arc<dyn Transport>,
        router: Arc<CommandRouter>,
        config: PipelineConfig,
    ) -> Self {
        let (queue, rx) = OutboundQueue::bounded(config.queue_capacity.max(1));
        let inbound_finished = CancellationToken::new();

        for id in 0..config.workers.max(1) {
            coordinator.spawn(
                "sender worker",
                run_sender_worker(
                    id,
                    Arc::clone(&transport),
                    Arc::clone(&rx),
                    coordinator.token(),
                ),
            );
        }

        coordinator.spawn(
            "message monitor",
            run_inbound_loop(
                transport,
                router,
                queue,
                config.backoff,
                coordinator.token(),
                inbound_finished.clone(),
            ),
        );

        Self { inbound_finished }
    }

    /// Cancelled once the inbound loop has returned, i.e. after the last
    /// store change the pipeline will ever make. The final snapshot waits on
    /// this rather than on the shutdown signal.
    pub fn inbound_finished(&self) -> CancellationToken {
        self.inbound_finished.clone()
    }
}

/// Route one message. A panicking handler is logged and yields no replies.
fn route_isolated(router: &CommandRouter, message: &InboundMessage) -> Vec<OutboundMessage> {
    match catch_unwind(AssertUnwindSafe(|| router.route(message))) {
        Ok(replies) => replies,
        Err(_) => {
            error!(
                "Handler panicked on message {} in chat {}",
                message.message_id, message.chat_id
            );
            Vec::new()
        }
    }
}

pub async fn run_inbound_loop(
    transport: Arc<dyn Transport>,
    router: Arc<CommandRouter>,
    queue: OutboundQueue,
    backoff: RetryBackoff,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    // Fires on return, and also if this future is dropped or unwinds.
    let _finished = finished.drop_guard();
    info!("Starting message monitor");
    let mut failures: u32 = 0;

    loop {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            polled = transport.poll_updates() => polled,
        };

        let messages = match polled {
            Ok(messages) => {
                failures = 0;
                messages
            }
            Err(e) => {
                failures += 1;
                let delay = backoff.delay(failures);
                warn!(
                    "Polling updates failed (attempt {}), retrying in {:?}: {}",
                    failures, delay, e
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };

        // A batch already received is routed in full, even during shutdown.
        for message in messages {
            for reply in route_isolated(&router, &message) {
                if let Err(e) = queue.send(reply).await {
                    error!("Dropping reply for chat {}: {}", message.chat_id, e);
                }
            }
        }
    }

    warn!("Stopping message monitor");
}

pub async fn run_sender_worker(
    id: usize,
    transport: Arc<dyn Transport>,
    rx: SharedReceiver,
    cancel: CancellationToken,
) {
    info!("Starting message sender {}", id);

    // The mutex only shares the receiver between workers. It is never the
    // session store lock, and no store access happens while it is held.
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => next,
            }
        };
        match next {
            Some(message) => deliver(id, transport.as_ref(), &message).await,
            None => {
                warn!("Stopping message sender {}", id);
                return;
            }
        }
    }

    // Flush whatever is still queued; ends once the inbound loop is gone.
    let mut flushed = 0usize;
    loop {
        let next = rx.lock().await.recv().await;
        match next {
            Some(message) => {
                deliver(id, transport.as_ref(), &message).await;
                flushed += 1;
            }
            None => break,
        }
    }
    if flushed > 0 {
        info!("Message sender {} flushed {} queued replies", id, flushed);
    }
    warn!("Stopping message sender {}", id);
}

async fn deliver(id: usize, transport: &dyn Transport, message: &OutboundMessage) {
    match transport.send(message).await {
        Ok(()) => debug!("Sender {} delivered reply to chat {}", id, message.chat_id),
        Err(e) => error!(
            "Sender {} failed to send to chat {}: {}",
            id, message.chat_id, e
        ),
    }
}

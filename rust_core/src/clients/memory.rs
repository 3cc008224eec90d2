//! In-process transport for tests and local runs.
//!
//! Inbound messages are pushed with `push`; everything the bot sends is kept
//! and can be read back with `sent`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::{HangmanError, Result};
use crate::models::{BotIdentity, InboundMessage, OutboundMessage};

pub struct MemoryTransport {
    identity: BotIdentity,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    sent: Mutex<Vec<OutboundMessage>>,
    send_delay: Duration,
}

impl MemoryTransport {
    pub fn new(identity: BotIdentity) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            identity,
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            send_delay: Duration::ZERO,
        }
    }

    /// Make every send take at least `delay`, to exercise queue backpressure.
    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn push(&self, message: InboundMessage) -> Result<()> {
        self.inbound_tx
            .send(message)
            .map_err(|_| HangmanError::QueueClosed)
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn identity(&self) -> Result<BotIdentity> {
        Ok(self.identity.clone())
    }

    async fn poll_updates(&self) -> Result<Vec<InboundMessage>> {
        let mut rx = self.inbound_rx.lock().await;
        let Some(first) = rx.recv().await else {
            return Ok(Vec::new());
        };

        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }
        Ok(batch)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

//! Pipeline tests over the in-memory transport.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hangman_bot_rust::{CommandRouter, Pipeline, PipelineConfig, RetryBackoff};
use hangman_rust_core::clients::{MemoryTransport, Transport};
use hangman_rust_core::dictionary::FixedDictionary;
use hangman_rust_core::error::{HangmanError, Result};
use hangman_rust_core::models::{BotIdentity, InboundMessage, OutboundMessage, Sender};
use hangman_rust_core::persistence::{run_snapshot_loop, JsonSnapshotStore, SnapshotStore};
use hangman_rust_core::shutdown::{ShutdownCoordinator, ShutdownReason};
use hangman_rust_core::store::SessionStore;

const CHAT: i64 = 11;
const ADMIN: i64 = 1;

fn bot() -> BotIdentity {
    BotIdentity::new(500, "HangBot")
}

fn message(id: i64, from: i64, text: &str) -> InboundMessage {
    message_in(CHAT, id, from, text)
}

fn message_in(chat_id: i64, id: i64, from: i64, text: &str) -> InboundMessage {
    let sender = Sender {
        id: from,
        first_name: "Test".to_string(),
        last_name: None,
    };
    InboundMessage::new(id, chat_id, sender, text)
}

fn router(store: Arc<SessionStore>, coordinator: &ShutdownCoordinator) -> Arc<CommandRouter> {
    Arc::new(CommandRouter::new(
        store,
        Arc::new(FixedDictionary::new("PYTHON")),
        bot(),
        vec![ADMIN],
        coordinator.clone(),
    ))
}

fn config(workers: usize, queue_capacity: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        queue_capacity,
        backoff: RetryBackoff {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter_pct: 0.0,
        },
    }
}

async fn wait_for_sent(transport: &MemoryTransport, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.sent_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("replies were not delivered in time");
}

async fn shut_down(coordinator: &ShutdownCoordinator) {
    coordinator.trigger(ShutdownReason::Internal("test over".to_string()));
    tokio::time::timeout(Duration::from_secs(5), coordinator.wait())
        .await
        .expect("pipeline did not stop");
    assert_eq!(coordinator.running(), 0);
}

#[tokio::test]
async fn test_start_and_guess_end_to_end() {
    let coordinator = ShutdownCoordinator::new();
    let store = Arc::new(SessionStore::new());
    let transport = Arc::new(MemoryTransport::new(bot()));
    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::clone(&store), &coordinator),
        config(3, 8),
    );

    transport.push(message(1, 7, "/start")).unwrap();
    wait_for_sent(&transport, 1).await;
    transport.push(message(2, 7, "p")).unwrap();
    wait_for_sent(&transport, 2).await;

    let sent = transport.sent();
    assert!(sent[0].text.starts_with("A new game has started!"));
    assert_eq!(sent[1].text, "Good letter!\nWord:\nP➖➖➖➖➖\nLives: 10");
    assert_eq!(sent[1].reply_to_message_id, Some(2));
    assert!(sent[1].force_reply);

    shut_down(&coordinator).await;
}

#[tokio::test]
async fn test_full_queue_applies_backpressure_without_loss() {
    let coordinator = ShutdownCoordinator::new();
    let transport =
        Arc::new(MemoryTransport::new(bot()).with_send_delay(Duration::from_millis(10)));
    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::new(SessionStore::new()), &coordinator),
        config(1, 1),
    );

    for i in 0..20 {
        let text = if i % 2 == 0 { "/ping" } else { "/pong" };
        transport.push(message(i, 7, text)).unwrap();
    }
    wait_for_sent(&transport, 20).await;

    // One worker: delivery order is enqueue order.
    let texts: Vec<String> = transport.sent().into_iter().map(|m| m.text).collect();
    for (i, text) in texts.iter().enumerate() {
        let expected = if i % 2 == 0 { "Pong!" } else { "Ping!" };
        assert_eq!(text, expected);
    }

    shut_down(&coordinator).await;
}

#[tokio::test]
async fn test_queued_replies_are_flushed_on_shutdown() {
    let coordinator = ShutdownCoordinator::new();
    let transport =
        Arc::new(MemoryTransport::new(bot()).with_send_delay(Duration::from_millis(30)));

    // Queued before the loop starts, so the first poll sees them as one batch.
    for i in 0..6 {
        transport.push(message(i, 7, "/hi")).unwrap();
    }

    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::new(SessionStore::new()), &coordinator),
        config(1, 16),
    );

    wait_for_sent(&transport, 1).await;
    shut_down(&coordinator).await;

    assert_eq!(transport.sent_count(), 6);
}

#[tokio::test]
async fn test_admin_shutdown_command_stops_everything() {
    let coordinator = ShutdownCoordinator::new();
    let transport = Arc::new(MemoryTransport::new(bot()));
    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::new(SessionStore::new()), &coordinator),
        config(2, 8),
    );

    transport.push(message(1, 99, "/shutdown")).unwrap();
    wait_for_sent(&transport, 1).await;
    assert!(!coordinator.is_triggered());

    transport.push(message(2, ADMIN, "/shutdown")).unwrap();
    tokio::time::timeout(Duration::from_secs(5), coordinator.wait())
        .await
        .expect("admin shutdown did not stop the pipeline");

    let texts: Vec<String> = transport.sent().into_iter().map(|m| m.text).collect();
    assert_eq!(texts, vec!["Only bot admins can do that.", "Shutting down..."]);
}

/// Fails the first few polls, then behaves like the wrapped transport.
struct FlakyTransport {
    inner: MemoryTransport,
    failures_left: AtomicU32,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn identity(&self) -> Result<BotIdentity> {
        self.inner.identity().await
    }

    async fn poll_updates(&self) -> Result<Vec<InboundMessage>> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(HangmanError::Transport {
                reason: "connection reset".to_string(),
                source: None,
            });
        }
        self.inner.poll_updates().await
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.inner.send(message).await
    }
}

#[tokio::test]
async fn test_poll_errors_are_retried() {
    let coordinator = ShutdownCoordinator::new();
    let transport = Arc::new(FlakyTransport {
        inner: MemoryTransport::new(bot()),
        failures_left: AtomicU32::new(3),
    });
    transport.inner.push(message(1, 7, "/ping")).unwrap();

    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::new(SessionStore::new()), &coordinator),
        config(1, 4),
    );

    wait_for_sent(&transport.inner, 1).await;
    assert_eq!(transport.failures_left.load(Ordering::SeqCst), 0);
    shut_down(&coordinator).await;
}

#[tokio::test]
async fn test_snapshot_written_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");

    let coordinator = ShutdownCoordinator::new();
    let store = Arc::new(SessionStore::new());
    let transport = Arc::new(MemoryTransport::new(bot()));
    let persistence: Arc<dyn SnapshotStore> = Arc::new(JsonSnapshotStore::new(&path));

    let pipeline = Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::clone(&store), &coordinator),
        config(2, 8),
    );
    coordinator.spawn(
        "snapshot loop",
        run_snapshot_loop(
            Arc::clone(&store),
            Arc::clone(&persistence),
            Duration::from_secs(3600),
            pipeline.inbound_finished(),
        ),
    );

    transport.push(message(1, 7, "/start")).unwrap();
    wait_for_sent(&transport, 1).await;
    shut_down(&coordinator).await;

    let saved = persistence.load().unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved[&CHAT][0].is_active());
}

#[tokio::test]
async fn test_final_snapshot_includes_batch_routed_during_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let persistence: Arc<dyn SnapshotStore> =
        Arc::new(JsonSnapshotStore::new(dir.path().join("data.json")));

    let coordinator = ShutdownCoordinator::new();
    let store = Arc::new(SessionStore::new());
    let transport =
        Arc::new(MemoryTransport::new(bot()).with_send_delay(Duration::from_millis(50)));

    // One batch: the slow replies keep the inbound loop busy past the
    // shutdown signal, and the game in chat 2 starts only after it.
    for i in 0..3 {
        transport.push(message_in(1, i, 7, "/hi")).unwrap();
    }
    transport.push(message_in(2, 3, 7, "/start")).unwrap();

    let pipeline = Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::clone(&store), &coordinator),
        config(1, 1),
    );
    coordinator.spawn(
        "snapshot loop",
        run_snapshot_loop(
            Arc::clone(&store),
            Arc::clone(&persistence),
            Duration::from_secs(3600),
            pipeline.inbound_finished(),
        ),
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.get_active(2).is_none(), "batch finished too early");
    shut_down(&coordinator).await;

    assert!(pipeline.inbound_finished().is_cancelled());
    assert_eq!(store.session_count(), 1);
    assert_eq!(transport.sent_count(), 4);

    let saved = persistence.load().unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved[&2][0].is_active());
}

#[tokio::test]
async fn test_workers_send_concurrently() {
    let coordinator = ShutdownCoordinator::new();
    let transport =
        Arc::new(MemoryTransport::new(bot()).with_send_delay(Duration::from_millis(100)));
    for i in 0..6 {
        transport.push(message(i, 7, "/ping")).unwrap();
    }

    let started = tokio::time::Instant::now();
    Pipeline::start(
        &coordinator,
        transport.clone() as Arc<dyn Transport>,
        router(Arc::new(SessionStore::new()), &coordinator),
        config(3, 8),
    );
    wait_for_sent(&transport, 6).await;

    // Six sends of 100ms on three workers; one at a time would take 600ms.
    assert!(started.elapsed() < Duration::from_millis(450));
    shut_down(&coordinator).await;
}

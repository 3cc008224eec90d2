use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hangman_bot_rust::{CommandRouter, Config, Pipeline, PipelineConfig, RetryBackoff};
use hangman_rust_core::clients::{TelegramClient, Transport};
use hangman_rust_core::dictionary::{Dictionary, WordListDictionary};
use hangman_rust_core::persistence::{
    restore_or_empty, run_snapshot_loop, JsonSnapshotStore, SnapshotStore,
};
use hangman_rust_core::shutdown::ShutdownCoordinator;
use hangman_rust_core::store::SessionStore;

#[derive(Debug, Parser)]
#[command(name = "hangman_bot", about = "Telegram hangman bot")]
struct Args {
    /// Path to the TOML settings file
    #[arg(long, env = "HANGMAN_SETTINGS", default_value = "settings.toml")]
    settings: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting Hangman Bot...");

    let config = Config::load(&args.settings).context("Failed to load configuration")?;
    config.log_config();

    let dictionary: Arc<dyn Dictionary> = match WordListDictionary::load(&config.dict) {
        Ok(words) => Arc::new(words),
        Err(e) => {
            warn!("Dictionary unavailable, games cannot start until fixed: {}", e);
            Arc::new(WordListDictionary::from_words(Vec::<String>::new()))
        }
    };

    let transport: Arc<dyn Transport> = Arc::new(TelegramClient::new(
        config.api_base_url.clone(),
        config.apikey.clone(),
        config.poll_timeout(),
    ));
    let me = transport
        .identity()
        .await
        .context("Failed to reach Telegram (getMe)")?;
    info!("Authorized as @{} ({})", me.username, me.id);

    let store = Arc::new(SessionStore::new());
    let persistence: Arc<dyn SnapshotStore> =
        Arc::new(JsonSnapshotStore::new(config.snapshot_path.clone()));
    restore_or_empty(&store, persistence.as_ref());

    let coordinator = ShutdownCoordinator::new();
    let router = Arc::new(CommandRouter::new(
        Arc::clone(&store),
        dictionary,
        me,
        config.admins.clone(),
        coordinator.clone(),
    ));

    let pipeline = Pipeline::start(
        &coordinator,
        transport,
        router,
        PipelineConfig {
            workers: config.sender_workers,
            queue_capacity: config.queue_capacity,
            backoff: RetryBackoff::default(),
        },
    );

    coordinator.spawn(
        "snapshot loop",
        // Final save runs once the inbound loop can no longer touch the store.
        run_snapshot_loop(
            store,
            persistence,
            config.snapshot_interval(),
            pipeline.inbound_finished(),
        ),
    );
    coordinator.listen_for_interrupt();

    coordinator.wait().await;
    Ok(())
}

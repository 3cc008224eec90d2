//! Snapshot persistence for the session store.
//!
//! Snapshots are plain JSON (`chat_id -> [session, ...]`). Writes go to a
//! sibling temp file which is then renamed over the target, so a crash mid-save
//! leaves the previous snapshot intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{HangmanError, Result};
use crate::store::{SessionStore, Snapshot};

pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
    fn load(&self) -> Result<Snapshot>;
}

#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let content = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| HangmanError::persistence("cannot encode snapshot", e))?;

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).map_err(|e| {
            HangmanError::persistence(format!("cannot create {}", tmp.display()), e)
        })?;
        file.write_all(&content)
            .and_then(|_| file.sync_all())
            .map_err(|e| HangmanError::persistence(format!("cannot write {}", tmp.display()), e))?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            HangmanError::persistence(format!("cannot replace {}", self.path.display()), e)
        })
    }

    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::new());
        }

        let content = fs::read(&self.path).map_err(|e| {
            HangmanError::persistence(format!("cannot read {}", self.path.display()), e)
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            HangmanError::persistence(format!("cannot decode {}", self.path.display()), e)
        })
    }
}

/// Fill `store` from `persistence`. A failed load is logged and leaves the
/// store empty; it never stops startup.
pub fn restore_or_empty(store: &SessionStore, persistence: &dyn SnapshotStore) {
    match persistence.load() {
        Ok(snapshot) => {
            store.restore(snapshot);
            info!(
                "Restored {} sessions across {} chats",
                store.session_count(),
                store.chat_count()
            );
        }
        Err(e) => {
            error!("Failed to load snapshot, starting empty: {}", e);
            store.restore(Snapshot::new());
        }
    }
}

/// Take a snapshot and save it off the async runtime threads.
pub async fn save_now(store: &SessionStore, persistence: Arc<dyn SnapshotStore>) -> Result<()> {
    let snapshot = store.snapshot();
    tokio::task::spawn_blocking(move || persistence.save(&snapshot))
        .await
        .map_err(|e| HangmanError::persistence("snapshot task failed", e))?
}

/// Save on every `interval` tick until `stop` fires, then save once more.
///
/// `stop` should fire only after every writer to `store` has returned;
/// anything written after the final save is lost on restart.
pub async fn run_snapshot_loop(
    store: Arc<SessionStore>,
    persistence: Arc<dyn SnapshotStore>,
    interval: Duration,
    stop: CancellationToken,
) {
    info!("Snapshot loop started (interval: {}s)", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately; nothing changed yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = save_now(&store, Arc::clone(&persistence)).await {
                    warn!("Periodic snapshot failed: {}", e);
                }
            }
        }
    }

    match save_now(&store, persistence).await {
        Ok(()) => info!("Final snapshot saved ({} sessions)", store.session_count()),
        Err(e) => error!("Final snapshot failed: {}", e),
    }
    warn!("Snapshot loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameSession;

    fn filled_store() -> SessionStore {
        let store = SessionStore::new();
        store
            .start_new(-100, GameSession::new("PYTHON").unwrap())
            .unwrap();
        store
            .mutate_active(-100, |s| s.record_guess(1, 'P'))
            .unwrap();
        store
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonSnapshotStore::new(dir.path().join("data.json"));

        let store = filled_store();
        persistence.save(&store.snapshot()).unwrap();
        assert!(!persistence.tmp_path().exists());

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, store.snapshot());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = JsonSnapshotStore::new(dir.path().join("nothing.json"));
        assert!(persistence.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_restores_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, b"{not json").unwrap();
        let persistence = JsonSnapshotStore::new(&path);

        assert!(matches!(
            persistence.load(),
            Err(HangmanError::PersistenceFailure { .. })
        ));

        let store = filled_store();
        restore_or_empty(&store, &persistence);
        assert_eq!(store.chat_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_loop_saves_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(JsonSnapshotStore::new(dir.path().join("data.json")));
        let store = Arc::new(filled_store());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_snapshot_loop(
            Arc::clone(&store),
            persistence.clone(),
            Duration::from_secs(3600),
            cancel.clone(),
        ));
        cancel.cancel();
        handle.await.unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded, store.snapshot());
    }
}

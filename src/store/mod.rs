//! Durable process-local state.
//!
//! Everything the agent persists across restarts lives here: the auth
//! session handed over by the login flow, the one-shot UX flags, and the
//! bounded upload-failure ring kept for diagnostics. SQLite work runs on a
//! dedicated worker thread so async callers never block the runtime.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::oneshot;

mod migrations;

use crate::{log_error, log_info};
use migrations::run_migrations;

const ENABLE_LOGS: bool = true;

const KEY_AUTH_TOKEN: &str = "auth_token";
const KEY_USER_ID: &str = "user_id";
const KEY_PERMISSIONS_REQUESTED: &str = "permissions_requested";
const KEY_TRAY_NOTICE_SHOWN: &str = "tray_notice_shown";

/// Most recent upload failures kept for diagnostics; older rows are evicted.
pub const MAX_UPLOAD_FAILURES: usize = 10;

/// One recorded upload failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub timestamp_ms: i64,
    pub error: String,
}

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                log_error!("failed to send shutdown to store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                log_error!("failed to join store thread: {join_err:?}");
            }
        }
    }
}

/// Handle to the store worker. Cheap to clone; all clones share one
/// SQLite connection owned by the worker thread.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
    db_path: Arc<PathBuf>,
}

impl Store {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("shiftwatch-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx
                            .send(Err(anyhow::Error::new(err).context("failed to open store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    log_error!("failed to enable WAL mode: {err}");
                }

                let init_result = run_migrations(&mut conn).context("failed to run store migrations");
                if ready_tx.send(init_result).is_err() {
                    log_error!("store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                log_info!("store thread shutting down");
            })
            .with_context(|| "failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        log_info!("store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                log_error!("store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store thread terminated unexpectedly"))?
    }

    async fn get_kv(&self, key: &'static str) -> Result<Option<String>> {
        self.execute(move |conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("failed to read kv entry '{key}'"))
        })
        .await
    }

    async fn set_kv(&self, key: &'static str, value: Option<String>) -> Result<()> {
        self.execute(move |conn| {
            match value {
                Some(value) => {
                    conn.execute(
                        "INSERT INTO kv (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![key, value],
                    )
                    .with_context(|| format!("failed to write kv entry '{key}'"))?;
                }
                None => {
                    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                        .with_context(|| format!("failed to clear kv entry '{key}'"))?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn get_flag(&self, key: &'static str) -> Result<bool> {
        Ok(self.get_kv(key).await?.as_deref() == Some("1"))
    }

    async fn set_flag(&self, key: &'static str, value: bool) -> Result<()> {
        self.set_kv(key, Some(if value { "1" } else { "0" }.into()))
            .await
    }

    /// Current auth token, or `None` when signed out.
    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.get_kv(KEY_AUTH_TOKEN).await
    }

    pub async fn set_auth_token(&self, token: Option<String>) -> Result<()> {
        self.set_kv(KEY_AUTH_TOKEN, token).await
    }

    pub async fn user_id(&self) -> Result<Option<String>> {
        self.get_kv(KEY_USER_ID).await
    }

    pub async fn set_user_id(&self, user_id: Option<String>) -> Result<()> {
        self.set_kv(KEY_USER_ID, user_id).await
    }

    /// Whether the one-shot permission request flow has already run.
    pub async fn permissions_requested(&self) -> Result<bool> {
        self.get_flag(KEY_PERMISSIONS_REQUESTED).await
    }

    pub async fn set_permissions_requested(&self, value: bool) -> Result<()> {
        self.set_flag(KEY_PERMISSIONS_REQUESTED, value).await
    }

    /// Whether the "still running in the background" notice was shown.
    pub async fn tray_notice_shown(&self) -> Result<bool> {
        self.get_flag(KEY_TRAY_NOTICE_SHOWN).await
    }

    pub async fn set_tray_notice_shown(&self, value: bool) -> Result<()> {
        self.set_flag(KEY_TRAY_NOTICE_SHOWN, value).await
    }

    /// Appends a failure record and evicts everything beyond the newest
    /// [`MAX_UPLOAD_FAILURES`] rows.
    pub async fn record_upload_failure(&self, timestamp_ms: i64, error: &str) -> Result<()> {
        let error = error.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO upload_failures (timestamp_ms, error) VALUES (?1, ?2)",
                params![timestamp_ms, error],
            )
            .with_context(|| "failed to insert upload failure")?;
            conn.execute(
                "DELETE FROM upload_failures WHERE id NOT IN
                 (SELECT id FROM upload_failures ORDER BY id DESC LIMIT ?1)",
                params![MAX_UPLOAD_FAILURES as i64],
            )
            .with_context(|| "failed to trim upload failures")?;
            Ok(())
        })
        .await
    }

    /// Recorded upload failures, oldest first.
    pub async fn upload_failures(&self) -> Result<Vec<UploadFailure>> {
        self.execute(|conn| {
            let mut stmt = conn
                .prepare("SELECT timestamp_ms, error FROM upload_failures ORDER BY id ASC")?;
            let mut rows = stmt.query([])?;
            let mut failures = Vec::new();
            while let Some(row) = rows.next()? {
                failures.push(UploadFailure {
                    timestamp_ms: row.get(0)?,
                    error: row.get(1)?,
                });
            }
            Ok(failures)
        })
        .await
    }
}

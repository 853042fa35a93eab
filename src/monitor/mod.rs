//! The capture-and-upload loop.
//!
//! [`CaptureMonitor`] owns the repeating capture task; the per-tick pipeline
//! lives in [`loop_worker`]. Starting and stopping are idempotent, and a
//! failed tick never stops the schedule.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::RemoteApi;
use crate::capture::CaptureBackend;
use crate::clock::ClockService;
use crate::store::Store;
use crate::{log_debug, log_error};

mod loop_worker;

pub use loop_worker::TickOutcome;

const ENABLE_LOGS: bool = true;

/// Everything one capture tick needs, wired once at construction.
pub(crate) struct MonitorContext {
    pub(crate) store: Store,
    pub(crate) api: Arc<dyn RemoteApi>,
    pub(crate) clock: Arc<ClockService>,
    pub(crate) backend: Arc<dyn CaptureBackend>,
    pub(crate) capture_interval: Duration,
    /// Set while a tick is running so a slow upload cannot overlap the next
    /// scheduled tick; the later tick is skipped instead.
    pub(crate) tick_in_flight: AtomicBool,
}

pub struct CaptureMonitor {
    ctx: Arc<MonitorContext>,
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl CaptureMonitor {
    pub fn new(
        store: Store,
        api: Arc<dyn RemoteApi>,
        clock: Arc<ClockService>,
        backend: Arc<dyn CaptureBackend>,
        capture_interval: Duration,
    ) -> Self {
        Self {
            ctx: Arc::new(MonitorContext {
                store,
                api,
                clock,
                backend,
                capture_interval,
                tick_in_flight: AtomicBool::new(false),
            }),
            handle: None,
            cancel: None,
        }
    }

    /// Starts the repeating capture task. A no-op when already running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            log_debug!("capture monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(loop_worker::capture_loop(Arc::clone(&self.ctx), token));

        self.handle = Some(handle);
        self.cancel = Some(cancel);
    }

    /// Stops the repeating capture task. A no-op when already stopped.
    /// Cancels future ticks; an in-flight upload is not aborted.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log_error!("capture loop task failed to join: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Runs a single tick outside the schedule. Used by tests and by the
    /// shell's "capture now" diagnostics.
    pub async fn run_tick_once(&self) -> anyhow::Result<TickOutcome> {
        loop_worker::run_tick(&self.ctx).await
    }
}

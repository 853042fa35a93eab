//! Clock-state polling.
//!
//! The capture loop must never pay a network round trip just to decide
//! whether capture is allowed, so the poller keeps a cached answer that is
//! refreshed on its own timer. Ambiguity of any kind resolves to "clocked
//! out": a user is only ever captured on a positive, recent answer.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::RemoteApi;
use crate::store::Store;
use crate::{log_debug, log_error, log_info, log_warn};

const ENABLE_LOGS: bool = true;

/// Cached attendance state. Written only by [`ClockService::refresh`].
#[derive(Debug, Clone, Copy)]
pub struct ClockState {
    pub is_clocked_in: bool,
    /// Stamped on successful checks only; `None` until the first one lands.
    pub last_checked_at: Option<Instant>,
}

impl ClockState {
    fn clocked_out() -> Self {
        Self {
            is_clocked_in: false,
            last_checked_at: None,
        }
    }
}

/// Owns the cached clock state and the only code path that mutates it.
pub struct ClockService {
    api: Arc<dyn RemoteApi>,
    store: Store,
    state: RwLock<ClockState>,
    poll_interval: Duration,
}

impl ClockService {
    pub fn new(api: Arc<dyn RemoteApi>, store: Store, poll_interval: Duration) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(ClockState::clocked_out()),
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn snapshot(&self) -> ClockState {
        *self.state.read().await
    }

    /// Whether the cached answer is older than one poll interval (or was
    /// never fetched) and must not be trusted by a capture tick.
    pub async fn is_stale(&self) -> bool {
        match self.state.read().await.last_checked_at {
            None => true,
            Some(checked_at) => checked_at.elapsed() > self.poll_interval,
        }
    }

    /// One clock-status check. Returns the resulting clocked-in state.
    ///
    /// No token means no network call; transport errors, non-2xx responses,
    /// and `success: false` bodies all resolve to clocked-out.
    pub async fn refresh(&self) -> bool {
        let token = match self.store.auth_token().await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => {
                self.set_clocked_in(false, false).await;
                log_debug!("clock check skipped: no auth token");
                return false;
            }
            Err(err) => {
                self.set_clocked_in(false, false).await;
                log_error!("clock check could not read auth token: {err:#}");
                return false;
            }
        };

        match self.api.fetch_clock_status(&token).await {
            Ok(response) if response.success => {
                let clocked_in = response.is_clocked_in;
                self.set_clocked_in(clocked_in, true).await;
                log_debug!("clock status: clocked_in={clocked_in}");
                clocked_in
            }
            Ok(_) => {
                self.set_clocked_in(false, false).await;
                log_warn!("clock status reported failure, treating as clocked out");
                false
            }
            Err(err) => {
                self.set_clocked_in(false, false).await;
                log_warn!("clock status check failed, treating as clocked out: {err:#}");
                false
            }
        }
    }

    async fn set_clocked_in(&self, clocked_in: bool, stamp: bool) {
        let mut state = self.state.write().await;
        state.is_clocked_in = clocked_in;
        if stamp {
            state.last_checked_at = Some(Instant::now());
        }
    }
}

/// Start/stop controller for the repeating poll task.
pub struct ClockPoller {
    handle: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl ClockPoller {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel: None,
        }
    }

    /// Starts polling. A no-op when the poller is already running.
    pub fn start(&mut self, clock: Arc<ClockService>) {
        if self.handle.is_some() {
            log_debug!("clock poller already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(poll_loop(clock, token));

        self.handle = Some(handle);
        self.cancel = Some(cancel);
    }

    /// Stops polling. A no-op when the poller is already stopped.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log_error!("clock poll task failed to join: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for ClockPoller {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop(clock: Arc<ClockService>, cancel: CancellationToken) {
    let mut ticker = time::interval(clock.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                clock.refresh().await;
            }
            _ = cancel.cancelled() => {
                log_info!("clock poller shutting down");
                break;
            }
        }
    }
}

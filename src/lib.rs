//! Shiftwatch desktop monitoring agent.
//!
//! Headless core of the Shiftwatch HR suite's desktop app: while the
//! signed-in user is clocked in, the agent captures the primary display on a
//! fixed cadence, compresses the frame, and uploads it to the HR backend.
//! Clock state is polled on its own, shorter cadence so capture decisions
//! never wait on the network. The embedding desktop shell supplies window
//! chrome through [`shell::ShellHost`] and forwards window events as
//! [`shell::ShellEvent`]s.

pub mod api;
pub mod capture;
pub mod clock;
pub mod config;
pub mod monitor;
pub mod permissions;
pub mod shell;
pub mod store;
pub mod utils;

use std::sync::Arc;

use anyhow::Result;

use api::RemoteApi;
use capture::CaptureBackend;
use clock::{ClockPoller, ClockService};
use config::AgentConfig;
use monitor::{CaptureMonitor, TickOutcome};
use permissions::{PermissionOrchestrator, PermissionProbe, PermissionState};
use log::{error, warn};
use shell::{LifecycleController, ShellEvent, ShellHost};
use store::{Store, UploadFailure};

/// The assembled agent: permission orchestrator, clock poller, capture
/// loop, and lifecycle controller, wired over injected dependencies.
pub struct Agent {
    config: AgentConfig,
    store: Store,
    clock: Arc<ClockService>,
    permissions: Arc<PermissionOrchestrator>,
    lifecycle: Arc<LifecycleController>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        store: Store,
        api: Arc<dyn RemoteApi>,
        backend: Arc<dyn CaptureBackend>,
        probe: Arc<dyn PermissionProbe>,
        shell: Arc<dyn ShellHost>,
    ) -> Self {
        if config.poll_interval() >= config.capture_interval() {
            warn!(
                "poll interval ({:?}) should be shorter than the capture interval ({:?})",
                config.poll_interval(),
                config.capture_interval()
            );
        }

        let clock = Arc::new(ClockService::new(
            Arc::clone(&api),
            store.clone(),
            config.poll_interval(),
        ));
        let monitor = CaptureMonitor::new(
            store.clone(),
            api,
            Arc::clone(&clock),
            backend,
            config.capture_interval(),
        );
        let permissions = Arc::new(PermissionOrchestrator::new(
            probe,
            Arc::clone(&shell),
            store.clone(),
        ));
        let lifecycle = Arc::new(LifecycleController::new(
            shell,
            store.clone(),
            monitor,
            ClockPoller::new(),
        ));

        Self {
            config,
            store,
            clock,
            permissions,
            lifecycle,
        }
    }

    /// One-shot permission pass, then the two repeating timers. Permission
    /// denial is reported but never blocks monitoring.
    pub async fn start(&self) -> Result<()> {
        if let Err(err) = self.permissions.request_all().await {
            error!("permission request flow failed: {err:#}");
        }
        self.lifecycle.start_services(Arc::clone(&self.clock)).await;
        Ok(())
    }

    /// Routes a window/process event from the embedding shell.
    pub async fn handle_shell_event(&self, event: ShellEvent) {
        self.lifecycle.handle(event).await;
    }

    /// Orderly shutdown: stops both timers. In-flight uploads finish.
    pub async fn shutdown(&self) {
        self.handle_shell_event(ShellEvent::QuitRequested).await;
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleController> {
        &self.lifecycle
    }

    /// Runs a single capture tick outside the schedule (diagnostics).
    pub async fn run_capture_tick(&self) -> Result<TickOutcome> {
        self.lifecycle.run_capture_tick().await
    }

    // --- Bridge surface consumed by the UI layer ---

    pub async fn auth_token(&self) -> Result<Option<String>> {
        self.store.auth_token().await
    }

    /// Set on login, cleared on logout. The clock poller and capture loop
    /// pick the change up on their next tick without a restart.
    pub async fn set_auth_token(&self, token: Option<String>) -> Result<()> {
        self.store.set_auth_token(token).await
    }

    pub async fn user_id(&self) -> Result<Option<String>> {
        self.store.user_id().await
    }

    pub async fn set_user_id(&self, user_id: Option<String>) -> Result<()> {
        self.store.set_user_id(user_id).await
    }

    pub fn platform_name(&self) -> &'static str {
        std::env::consts::OS
    }

    pub fn app_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Re-triggers the screen-recording prompt and returns the resulting
    /// status string.
    pub async fn request_screen_permission(&self) -> String {
        self.permissions.request_screen().await.as_str().to_string()
    }

    pub async fn permission_state(&self) -> PermissionState {
        self.permissions.current().await
    }

    /// Recorded upload failures, oldest first, for diagnostics views.
    pub async fn upload_failures(&self) -> Result<Vec<UploadFailure>> {
        self.store.upload_failures().await
    }
}

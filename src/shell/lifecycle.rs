use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::clock::{ClockPoller, ClockService};
use crate::monitor::CaptureMonitor;
use crate::store::Store;
use crate::{log_debug, log_error, log_info};

use super::ShellHost;

const ENABLE_LOGS: bool = true;

/// Window and process events forwarded by the embedding shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEvent {
    /// The user clicked the window close button.
    CloseRequested,
    /// The last window was closed or hidden.
    AllWindowsClosed,
    /// The app was re-activated (dock/taskbar click) with no visible window.
    ActivateRequested,
    /// Explicit quit (tray menu, Cmd+Q).
    QuitRequested,
}

/// Keeps the monitoring timers alive independent of window visibility.
///
/// The timers are owned here, by a long-lived service object, never by the
/// window: closing the window hides it, and only an explicit quit stops the
/// capture loop and the clock poller.
pub struct LifecycleController {
    shell: Arc<dyn ShellHost>,
    store: Store,
    monitor: Mutex<CaptureMonitor>,
    poller: Mutex<ClockPoller>,
    quitting: AtomicBool,
}

impl LifecycleController {
    pub fn new(
        shell: Arc<dyn ShellHost>,
        store: Store,
        monitor: CaptureMonitor,
        poller: ClockPoller,
    ) -> Self {
        Self {
            shell,
            store,
            monitor: Mutex::new(monitor),
            poller: Mutex::new(poller),
            quitting: AtomicBool::new(false),
        }
    }

    /// Starts the clock poller and the capture loop. Idempotent.
    pub async fn start_services(&self, clock: Arc<ClockService>) {
        self.poller.lock().await.start(clock);
        self.monitor.lock().await.start();
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    pub async fn monitor_running(&self) -> bool {
        self.monitor.lock().await.is_running()
    }

    pub async fn poller_running(&self) -> bool {
        self.poller.lock().await.is_running()
    }

    /// Runs a single capture tick outside the schedule (diagnostics).
    pub async fn run_capture_tick(&self) -> anyhow::Result<crate::monitor::TickOutcome> {
        self.monitor.lock().await.run_tick_once().await
    }

    pub async fn handle(&self, event: ShellEvent) {
        match event {
            ShellEvent::CloseRequested => {
                if self.is_quitting() {
                    return;
                }
                self.shell.hide_window();
                self.notify_tray_once().await;
            }
            ShellEvent::AllWindowsClosed => {
                // Timers outlive the window; nothing stops here.
                if !self.is_quitting() {
                    log_debug!("all windows closed, monitoring continues in the background");
                }
            }
            ShellEvent::ActivateRequested => {
                self.shell.show_window();
            }
            ShellEvent::QuitRequested => {
                if self.quitting.swap(true, Ordering::SeqCst) {
                    return;
                }
                log_info!("quit requested, stopping monitoring services");
                self.monitor.lock().await.stop().await;
                self.poller.lock().await.stop().await;
            }
        }
    }

    /// One-time heads-up that closing the window does not stop monitoring.
    async fn notify_tray_once(&self) {
        match self.store.tray_notice_shown().await {
            Ok(false) => {
                self.shell.show_notification(
                    "Shiftwatch is still running",
                    "Monitoring continues in the background. Use Quit in the tray menu to exit.",
                );
                if let Err(err) = self.store.set_tray_notice_shown(true).await {
                    log_error!("failed to persist tray notice flag: {err:#}");
                }
            }
            Ok(true) => {}
            Err(err) => {
                log_error!("failed to read tray notice flag: {err:#}");
            }
        }
    }
}

//! Shell integration.
//!
//! The agent is headless; window chrome, tray rendering, dialogs, and
//! notifications belong to whatever desktop shell embeds it. [`ShellHost`]
//! is that seam. [`LifecycleController`] implements the behavior behind it:
//! single running instance, close-to-tray, explicit-quit-only shutdown.

use anyhow::{Context, Result};

use crate::{log_debug, log_warn};

mod instance;
mod lifecycle;

pub use instance::{InstanceError, InstanceLock};
pub use lifecycle::{LifecycleController, ShellEvent};

const ENABLE_LOGS: bool = true;

/// Operations the embedding desktop shell performs on the agent's behalf.
pub trait ShellHost: Send + Sync {
    /// Shows the main window, creating it first if none exists.
    fn show_window(&self);
    fn hide_window(&self);
    fn focus_window(&self);

    fn show_notification(&self, summary: &str, body: &str);

    /// Modal dialog with actionable guidance. Must not block the caller.
    fn show_dialog(&self, title: &str, body: &str);

    fn open_url(&self, url: &str) -> Result<()>;

    fn notifications_supported(&self) -> bool;
}

/// Default host for running without an embedding shell: notifications go to
/// the desktop notification daemon, window operations are recorded only in
/// the log.
pub struct DesktopShell;

impl ShellHost for DesktopShell {
    fn show_window(&self) {
        log_debug!("show_window requested (no window chrome attached)");
    }

    fn hide_window(&self) {
        log_debug!("hide_window requested (no window chrome attached)");
    }

    fn focus_window(&self) {
        log_debug!("focus_window requested (no window chrome attached)");
    }

    fn show_notification(&self, summary: &str, body: &str) {
        if let Err(err) = notify_rust::Notification::new()
            .summary(summary)
            .body(body)
            .show()
        {
            log_warn!("failed to show notification '{summary}': {err}");
        }
    }

    fn show_dialog(&self, title: &str, body: &str) {
        // Without window chrome the best available surface is a notification.
        log_warn!("{title}: {body}");
        self.show_notification(title, body);
    }

    fn open_url(&self, url: &str) -> Result<()> {
        open::that(url).with_context(|| format!("failed to open {url}"))
    }

    fn notifications_supported(&self) -> bool {
        true
    }
}

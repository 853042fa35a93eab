//! OS privacy-permission orchestration.
//!
//! Runs once per install: query each capability, prompt where the platform
//! supports prompting, and leave a remediation path (dialog plus settings
//! deep link) when something is refused. A denied permission is never fatal;
//! the capture loop keeps running and fails at the OS level instead.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::shell::ShellHost;
use crate::store::Store;
use crate::{log_debug, log_error, log_warn};

#[cfg(target_os = "macos")]
mod macos;
mod portable;

#[cfg(target_os = "macos")]
pub use macos::MacosProbe;
pub use portable::PortableProbe;

const ENABLE_LOGS: bool = true;

/// Result of a native permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionStatus::Granted => "granted",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Undetermined => "undetermined",
        }
    }
}

/// Last-known grant state for every capability the web content needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionState {
    pub camera: bool,
    pub microphone: bool,
    pub screen: bool,
    pub notifications: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Camera,
    Microphone,
    Screen,
    Notifications,
}

/// Native permission operations, one implementation per platform family.
///
/// `granular_query` distinguishes the two request flows: per-capability
/// native prompts (macOS) versus one combined explanatory dialog (platforms
/// without a queryable permission model).
pub trait PermissionProbe: Send + Sync {
    fn granular_query(&self) -> bool;

    fn query_camera(&self) -> PermissionStatus;
    fn query_microphone(&self) -> PermissionStatus;
    fn query_screen(&self) -> PermissionStatus;

    /// Shows the native camera prompt and blocks for the answer.
    fn request_camera(&self) -> bool;
    /// Shows the native microphone prompt and blocks for the answer.
    fn request_microphone(&self) -> bool;

    /// Requests the capture source list once, purely to force the OS
    /// screen-recording prompt if it has not appeared yet.
    fn trigger_screen_prompt(&self);

    /// Deep link into the OS privacy pane for screen recording.
    fn screen_settings_url(&self) -> Option<&'static str>;

    /// Human-readable settings path for the remediation dialog.
    fn settings_path(&self, capability: Capability) -> &'static str;
}

pub struct PermissionOrchestrator {
    probe: Arc<dyn PermissionProbe>,
    shell: Arc<dyn ShellHost>,
    store: Store,
    state: RwLock<PermissionState>,
}

impl PermissionOrchestrator {
    pub fn new(probe: Arc<dyn PermissionProbe>, shell: Arc<dyn ShellHost>, store: Store) -> Self {
        Self {
            probe,
            shell,
            store,
            state: RwLock::new(PermissionState::default()),
        }
    }

    /// Idempotent entry point. The first call per install walks the
    /// platform request flow; later calls degrade to a status refresh.
    pub async fn request_all(&self) -> Result<PermissionState> {
        if self.store.permissions_requested().await? {
            log_debug!("permissions already requested, refreshing status only");
            return Ok(self.check_all().await);
        }

        let state = if self.probe.granular_query() {
            self.request_granular().await
        } else {
            self.request_combined().await
        };

        self.store.set_permissions_requested(true).await?;
        *self.state.write().await = state;
        Ok(state)
    }

    /// Re-queries every capability without prompting.
    ///
    /// Platforms without granular query cannot re-verify, so they report
    /// granted once the initial request flow has completed.
    pub async fn check_all(&self) -> PermissionState {
        let state = if self.probe.granular_query() {
            PermissionState {
                camera: self.probe.query_camera().is_granted(),
                microphone: self.probe.query_microphone().is_granted(),
                screen: self.probe.query_screen().is_granted(),
                notifications: self.shell.notifications_supported(),
            }
        } else {
            let requested = self.store.permissions_requested().await.unwrap_or(false);
            PermissionState {
                camera: requested,
                microphone: requested,
                screen: requested,
                notifications: self.shell.notifications_supported(),
            }
        };

        *self.state.write().await = state;
        state
    }

    /// Last-known state; never triggers I/O.
    pub async fn current(&self) -> PermissionState {
        *self.state.read().await
    }

    /// Last-known grant for one capability; never triggers I/O.
    pub async fn has(&self, capability: Capability) -> bool {
        let state = self.current().await;
        match capability {
            Capability::Camera => state.camera,
            Capability::Microphone => state.microphone,
            Capability::Screen => state.screen,
            Capability::Notifications => state.notifications,
        }
    }

    /// Re-triggers the screen-recording prompt and reports the resulting
    /// status. Exposed to the UI layer through the agent bridge.
    pub async fn request_screen(&self) -> PermissionStatus {
        let probe = Arc::clone(&self.probe);
        if let Err(err) = tokio::task::spawn_blocking(move || probe.trigger_screen_prompt()).await {
            log_error!("screen prompt trigger panicked: {err}");
        }

        let status = if self.probe.granular_query() {
            self.probe.query_screen()
        } else if self.store.permissions_requested().await.unwrap_or(false) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Undetermined
        };

        self.state.write().await.screen = status.is_granted();
        status
    }

    async fn request_granular(&self) -> PermissionState {
        let mut state = PermissionState::default();

        state.camera = match self.probe.query_camera() {
            PermissionStatus::Granted => true,
            PermissionStatus::Undetermined => self.prompt(Prompt::Camera).await,
            PermissionStatus::Denied => false,
        };
        if !state.camera {
            self.show_remediation(Capability::Camera);
        }

        state.microphone = match self.probe.query_microphone() {
            PermissionStatus::Granted => true,
            PermissionStatus::Undetermined => self.prompt(Prompt::Microphone).await,
            PermissionStatus::Denied => false,
        };
        if !state.microphone {
            self.show_remediation(Capability::Microphone);
        }

        // Screen-recording status cannot always be queried precisely, so a
        // capture-source probe forces the OS prompt when it has not been
        // shown yet.
        if !self.probe.query_screen().is_granted() {
            self.prompt(Prompt::Screen).await;
        }
        state.screen = self.probe.query_screen().is_granted();
        if !state.screen {
            self.show_remediation(Capability::Screen);
            if let Some(url) = self.probe.screen_settings_url() {
                if let Err(err) = self.shell.open_url(url) {
                    log_warn!("failed to open privacy settings: {err:#}");
                }
            }
        }

        state.notifications = self.shell.notifications_supported();
        state
    }

    async fn request_combined(&self) -> PermissionState {
        self.shell.show_dialog(
            "Permissions needed",
            "Shiftwatch needs access to your camera and microphone for \
             meetings, and to screen recording for work-time activity \
             capture. Your screen is only captured while you are clocked in.",
        );

        self.prompt(Prompt::Screen).await;

        // No per-capability prompt exists on this path; the dialog is the
        // substitute and the grants cannot be re-verified afterwards.
        PermissionState {
            camera: true,
            microphone: true,
            screen: true,
            notifications: self.shell.notifications_supported(),
        }
    }

    /// Native prompts block until the user answers, so they run off the
    /// async runtime.
    async fn prompt(&self, prompt: Prompt) -> bool {
        let probe = Arc::clone(&self.probe);
        tokio::task::spawn_blocking(move || match prompt {
            Prompt::Camera => probe.request_camera(),
            Prompt::Microphone => probe.request_microphone(),
            Prompt::Screen => {
                probe.trigger_screen_prompt();
                true
            }
        })
        .await
        .unwrap_or(false)
    }

    fn show_remediation(&self, capability: Capability) {
        let (title, noun) = match capability {
            Capability::Camera => ("Camera access needed", "camera"),
            Capability::Microphone => ("Microphone access needed", "microphone"),
            Capability::Screen => ("Screen recording access needed", "screen recording"),
            Capability::Notifications => ("Notifications unavailable", "notifications"),
        };
        let body = format!(
            "Shiftwatch does not have {noun} access. Enable it under {} and relaunch the app.",
            self.probe.settings_path(capability)
        );
        self.shell.show_dialog(title, &body);
    }
}

#[derive(Debug, Clone, Copy)]
enum Prompt {
    Camera,
    Microphone,
    Screen,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeProbe {
        granular: bool,
        camera: Mutex<PermissionStatus>,
        microphone: Mutex<PermissionStatus>,
        screen: Mutex<PermissionStatus>,
        camera_prompts: AtomicUsize,
        microphone_prompts: AtomicUsize,
        screen_triggers: AtomicUsize,
        grant_on_prompt: bool,
    }

    impl FakeProbe {
        fn new(granular: bool, grant_on_prompt: bool) -> Self {
            Self {
                granular,
                camera: Mutex::new(PermissionStatus::Undetermined),
                microphone: Mutex::new(PermissionStatus::Undetermined),
                screen: Mutex::new(PermissionStatus::Undetermined),
                camera_prompts: AtomicUsize::new(0),
                microphone_prompts: AtomicUsize::new(0),
                screen_triggers: AtomicUsize::new(0),
                grant_on_prompt,
            }
        }

        fn granular(grant_on_prompt: bool) -> Self {
            Self::new(true, grant_on_prompt)
        }

        fn combined() -> Self {
            Self::new(false, false)
        }
    }

    impl PermissionProbe for FakeProbe {
        fn granular_query(&self) -> bool {
            self.granular
        }

        fn query_camera(&self) -> PermissionStatus {
            *self.camera.lock().unwrap()
        }

        fn query_microphone(&self) -> PermissionStatus {
            *self.microphone.lock().unwrap()
        }

        fn query_screen(&self) -> PermissionStatus {
            *self.screen.lock().unwrap()
        }

        fn request_camera(&self) -> bool {
            self.camera_prompts.fetch_add(1, Ordering::SeqCst);
            let granted = self.grant_on_prompt;
            *self.camera.lock().unwrap() = if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
            granted
        }

        fn request_microphone(&self) -> bool {
            self.microphone_prompts.fetch_add(1, Ordering::SeqCst);
            let granted = self.grant_on_prompt;
            *self.microphone.lock().unwrap() = if granted {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
            granted
        }

        fn trigger_screen_prompt(&self) {
            self.screen_triggers.fetch_add(1, Ordering::SeqCst);
            if self.grant_on_prompt {
                *self.screen.lock().unwrap() = PermissionStatus::Granted;
            }
        }

        fn screen_settings_url(&self) -> Option<&'static str> {
            None
        }

        fn settings_path(&self, _capability: Capability) -> &'static str {
            "Settings > Privacy"
        }
    }

    #[derive(Default)]
    struct FakeShell {
        dialogs: AtomicUsize,
        notifications: AtomicUsize,
    }

    impl ShellHost for FakeShell {
        fn show_window(&self) {}
        fn hide_window(&self) {}
        fn focus_window(&self) {}
        fn show_notification(&self, _summary: &str, _body: &str) {
            self.notifications.fetch_add(1, Ordering::SeqCst);
        }
        fn show_dialog(&self, _title: &str, _body: &str) {
            self.dialogs.fetch_add(1, Ordering::SeqCst);
        }
        fn open_url(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        fn notifications_supported(&self) -> bool {
            true
        }
    }

    fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("agent.sqlite3")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn granular_flow_prompts_each_capability_once() {
        let probe = Arc::new(FakeProbe::granular(true));
        let shell = Arc::new(FakeShell::default());
        let (store, _dir) = temp_store();
        let orchestrator = PermissionOrchestrator::new(probe.clone(), shell, store);

        let state = orchestrator.request_all().await.unwrap();
        assert!(state.camera && state.microphone && state.screen && state.notifications);
        assert_eq!(probe.camera_prompts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.microphone_prompts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.screen_triggers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_request_never_prompts_again() {
        let probe = Arc::new(FakeProbe::granular(true));
        let shell = Arc::new(FakeShell::default());
        let (store, _dir) = temp_store();
        let orchestrator = PermissionOrchestrator::new(probe.clone(), shell, store);

        orchestrator.request_all().await.unwrap();
        orchestrator.request_all().await.unwrap();

        assert_eq!(probe.camera_prompts.load(Ordering::SeqCst), 1);
        assert_eq!(probe.microphone_prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_capabilities_surface_remediation_dialogs() {
        let probe = Arc::new(FakeProbe::granular(false));
        let shell = Arc::new(FakeShell::default());
        let (store, _dir) = temp_store();
        let orchestrator =
            PermissionOrchestrator::new(probe, shell.clone(), store);

        let state = orchestrator.request_all().await.unwrap();
        assert!(!state.camera && !state.microphone && !state.screen);
        // One remediation dialog per refused capability.
        assert_eq!(shell.dialogs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn combined_flow_shows_one_dialog_and_assumes_grants() {
        let probe = Arc::new(FakeProbe::combined());
        let shell = Arc::new(FakeShell::default());
        let (store, _dir) = temp_store();
        let orchestrator =
            PermissionOrchestrator::new(probe.clone(), shell.clone(), store);

        let state = orchestrator.request_all().await.unwrap();
        assert!(state.camera && state.microphone && state.screen);
        assert_eq!(shell.dialogs.load(Ordering::SeqCst), 1);
        assert_eq!(probe.screen_triggers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn accessors_never_touch_the_probe() {
        let probe = Arc::new(FakeProbe::granular(true));
        let shell = Arc::new(FakeShell::default());
        let (store, _dir) = temp_store();
        let orchestrator = PermissionOrchestrator::new(probe.clone(), shell, store);

        assert!(!orchestrator.has(Capability::Screen).await);
        assert_eq!(orchestrator.current().await, PermissionState::default());
        assert_eq!(probe.camera_prompts.load(Ordering::SeqCst), 0);
        assert_eq!(probe.screen_triggers.load(Ordering::SeqCst), 0);
    }
}

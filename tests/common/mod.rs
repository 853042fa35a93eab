#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use shiftwatch::api::{ClockStatusResponse, RemoteApi, ScreenshotPayload, UploadResponse};
use shiftwatch::capture::{CaptureBackend, CaptureError, DisplayInfo, Frame};
use shiftwatch::permissions::{Capability, PermissionProbe, PermissionStatus};
use shiftwatch::shell::ShellHost;
use shiftwatch::store::Store;

/// Scriptable remote endpoint double with call counters.
pub struct FakeApi {
    pub clock_success: AtomicBool,
    pub clocked_in: AtomicBool,
    pub clock_transport_error: AtomicBool,
    pub clock_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    /// Fail this many uploads before succeeding again.
    pub upload_failures_remaining: AtomicUsize,
    pub uploads: Mutex<Vec<ScreenshotPayload>>,
}

impl FakeApi {
    pub fn new(success: bool, clocked_in: bool) -> Arc<Self> {
        Arc::new(Self {
            clock_success: AtomicBool::new(success),
            clocked_in: AtomicBool::new(clocked_in),
            clock_transport_error: AtomicBool::new(false),
            clock_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            upload_failures_remaining: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn clocked_in() -> Arc<Self> {
        Self::new(true, true)
    }

    pub fn clocked_out() -> Arc<Self> {
        Self::new(true, false)
    }

    pub fn fail_next_uploads(&self, count: usize) {
        self.upload_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn set_transport_error(&self, broken: bool) {
        self.clock_transport_error.store(broken, Ordering::SeqCst);
    }

    pub fn clock_calls(&self) -> usize {
        self.clock_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_clock_status(&self, _token: &str) -> Result<ClockStatusResponse> {
        self.clock_calls.fetch_add(1, Ordering::SeqCst);
        if self.clock_transport_error.load(Ordering::SeqCst) {
            bail!("clock status endpoint returned 500");
        }
        Ok(ClockStatusResponse {
            success: self.clock_success.load(Ordering::SeqCst),
            is_clocked_in: self.clocked_in.load(Ordering::SeqCst),
        })
    }

    async fn upload_screenshot(
        &self,
        _token: &str,
        payload: &ScreenshotPayload,
    ) -> Result<UploadResponse> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.upload_failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.upload_failures_remaining
                .store(remaining - 1, Ordering::SeqCst);
            bail!("upload rejected: storage unavailable");
        }
        self.uploads.lock().unwrap().push(payload.clone());
        Ok(UploadResponse {
            path: format!("/uploads/screenshot-{call}.webp"),
        })
    }
}

/// Capture backend double backed by in-memory frames.
pub struct FakeBackend {
    pub displays: Vec<DisplayInfo>,
    pub capture_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn single_display() -> Arc<Self> {
        Arc::new(Self {
            displays: vec![DisplayInfo {
                id: "fake-1".into(),
                name: "Fake Display".into(),
                width: 8,
                height: 6,
                scale_factor: 1.0,
                is_primary: true,
            }],
            capture_calls: AtomicUsize::new(0),
        })
    }

    pub fn no_displays() -> Arc<Self> {
        Arc::new(Self {
            displays: Vec::new(),
            capture_calls: AtomicUsize::new(0),
        })
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }
}

impl CaptureBackend for FakeBackend {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        Ok(self.displays.clone())
    }

    fn capture_display(&self, display_id: &str, captured_at_ms: i64) -> Result<Frame, CaptureError> {
        let display = self
            .displays
            .iter()
            .find(|display| display.id == display_id)
            .ok_or_else(|| CaptureError::UnknownDisplay(display_id.to_string()))?;
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        let rgba = vec![0x40; (display.width as usize) * (display.height as usize) * 4];
        Frame::new(
            display.id.clone(),
            display.width,
            display.height,
            captured_at_ms,
            rgba,
        )
    }
}

/// Shell double recording every interaction.
#[derive(Default)]
pub struct CountingShell {
    pub shows: AtomicUsize,
    pub hides: AtomicUsize,
    pub focuses: AtomicUsize,
    pub notifications: AtomicUsize,
    pub dialogs: AtomicUsize,
}

impl ShellHost for CountingShell {
    fn show_window(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_window(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }

    fn focus_window(&self) {
        self.focuses.fetch_add(1, Ordering::SeqCst);
    }

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

/// Permission probe double for the combined-dialog (non-granular) path.
pub struct FakeProbe {
    pub screen_triggers: AtomicUsize,
}

impl FakeProbe {
    pub fn combined() -> Arc<Self> {
        Arc::new(Self {
            screen_triggers: AtomicUsize::new(0),
        })
    }
}

impl PermissionProbe for FakeProbe {
    fn granular_query(&self) -> bool {
        false
    }

    fn query_camera(&self) -> PermissionStatus {
        PermissionStatus::Undetermined
    }

    fn query_microphone(&self) -> PermissionStatus {
        PermissionStatus::Undetermined
    }

    fn query_screen(&self) -> PermissionStatus {
        PermissionStatus::Undetermined
    }

    fn request_camera(&self) -> bool {
        false
    }

    fn request_microphone(&self) -> bool {
        false
    }

    fn trigger_screen_prompt(&self) {
        self.screen_triggers.fetch_add(1, Ordering::SeqCst);
    }

    fn screen_settings_url(&self) -> Option<&'static str> {
        None
    }

    fn settings_path(&self, _capability: Capability) -> &'static str {
        "Settings > Privacy"
    }
}

pub fn temp_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("agent.sqlite3")).unwrap();
    (store, dir)
}

pub async fn signed_in_store() -> (Store, tempfile::TempDir) {
    let (store, dir) = temp_store();
    store.set_auth_token(Some("test-token".into())).await.unwrap();
    (store, dir)
}

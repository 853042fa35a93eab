use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use block2::RcBlock;
use core_graphics::access::ScreenCaptureAccess;
use objc2::runtime::Bool;
use objc2_av_foundation::{AVAuthorizationStatus, AVCaptureDevice, AVMediaType};

use crate::capture::CaptureBackend;
use crate::log_warn;

use super::{Capability, PermissionProbe, PermissionStatus};

const ENABLE_LOGS: bool = true;

pub const SCREEN_RECORDING_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture";

/// How long to wait for the user to answer a native media prompt.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(300);

/// macOS permission probe: granular TCC queries plus native prompts.
pub struct MacosProbe {
    backend: Arc<dyn CaptureBackend>,
    access: ScreenCaptureAccess,
}

impl MacosProbe {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            access: ScreenCaptureAccess::default(),
        }
    }
}

fn media_status(media_type: &AVMediaType) -> PermissionStatus {
    let status = unsafe { AVCaptureDevice::authorizationStatusForMediaType(media_type) };
    if status == AVAuthorizationStatus::Authorized {
        PermissionStatus::Granted
    } else if status == AVAuthorizationStatus::NotDetermined {
        PermissionStatus::Undetermined
    } else {
        PermissionStatus::Denied
    }
}

fn request_media_access(media_type: &AVMediaType) -> bool {
    let (tx, rx) = mpsc::channel();
    let handler = RcBlock::new(move |granted: Bool| {
        let _ = tx.send(granted.as_bool());
    });
    unsafe {
        AVCaptureDevice::requestAccessForMediaType_completionHandler(media_type, &handler);
    }
    match rx.recv_timeout(PROMPT_TIMEOUT) {
        Ok(granted) => granted,
        Err(_) => {
            log_warn!("media access prompt timed out without an answer");
            false
        }
    }
}

impl PermissionProbe for MacosProbe {
    fn granular_query(&self) -> bool {
        true
    }

    fn query_camera(&self) -> PermissionStatus {
        media_status(unsafe { objc2_av_foundation::AVMediaTypeVideo })
    }

    fn query_microphone(&self) -> PermissionStatus {
        media_status(unsafe { objc2_av_foundation::AVMediaTypeAudio })
    }

    fn query_screen(&self) -> PermissionStatus {
        // Preflight cannot distinguish "denied" from "never asked".
        if self.access.preflight() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Undetermined
        }
    }

    fn request_camera(&self) -> bool {
        request_media_access(unsafe { objc2_av_foundation::AVMediaTypeVideo })
    }

    fn request_microphone(&self) -> bool {
        request_media_access(unsafe { objc2_av_foundation::AVMediaTypeAudio })
    }

    fn trigger_screen_prompt(&self) {
        self.access.request();
        let _ = self.backend.list_displays();
    }

    fn screen_settings_url(&self) -> Option<&'static str> {
        Some(SCREEN_RECORDING_SETTINGS_URL)
    }

    fn settings_path(&self, capability: Capability) -> &'static str {
        match capability {
            Capability::Camera => "System Settings > Privacy & Security > Camera",
            Capability::Microphone => "System Settings > Privacy & Security > Microphone",
            Capability::Screen => "System Settings > Privacy & Security > Screen Recording",
            Capability::Notifications => "System Settings > Notifications",
        }
    }
}

use std::sync::Arc;

use crate::capture::CaptureBackend;

use super::{Capability, PermissionProbe, PermissionStatus};

/// Permission probe for platforms without a granular, queryable permission
/// model (Windows, Linux). The combined explanatory dialog shown by the
/// orchestrator stands in for native prompts; the only native side effect
/// available is the capture-source probe that forces any OS screen prompt.
pub struct PortableProbe {
    backend: Arc<dyn CaptureBackend>,
}

impl PortableProbe {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }
}

impl PermissionProbe for PortableProbe {
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
        let _ = self.backend.list_displays();
    }

    fn screen_settings_url(&self) -> Option<&'static str> {
        #[cfg(windows)]
        {
            Some("ms-settings:privacy")
        }
        #[cfg(not(windows))]
        {
            None
        }
    }

    fn settings_path(&self, capability: Capability) -> &'static str {
        match capability {
            Capability::Camera => "Settings > Privacy > Camera",
            Capability::Microphone => "Settings > Privacy > Microphone",
            Capability::Screen => "Settings > Privacy > Screen capture",
            Capability::Notifications => "Settings > Notifications",
        }
    }
}

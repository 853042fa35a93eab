//! Display enumeration and frame acquisition.
//!
//! The capture loop talks to a [`CaptureBackend`] so real OS capture and the
//! deterministic synthetic backend used in tests are interchangeable.

use std::sync::Mutex;

use thiserror::Error;

pub mod encode;

/// Metadata describing one available display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    /// Stable display identifier.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Work-area width in logical pixels.
    pub width: u32,
    /// Work-area height in logical pixels.
    pub height: u32,
    /// Logical-to-physical pixel ratio.
    pub scale_factor: f32,
    pub is_primary: bool,
}

/// One captured RGBA frame. Owned buffer; lives for a single upload attempt.
#[derive(Debug, Clone)]
pub struct Frame {
    pub display_id: String,
    pub width: u32,
    pub height: u32,
    pub captured_at_ms: i64,
    pub rgba: Vec<u8>,
}

impl Frame {
    pub fn new(
        display_id: String,
        width: u32,
        height: u32,
        captured_at_ms: i64,
        rgba: Vec<u8>,
    ) -> Result<Self, CaptureError> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(CaptureError::InvalidFrame { width, height });
        }
        Ok(Self {
            display_id,
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }
}

/// Trait implemented by concrete capture providers.
pub trait CaptureBackend: Send + Sync {
    /// Enumerates available displays.
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, CaptureError>;

    /// Captures one frame from the selected display.
    fn capture_display(&self, display_id: &str, captured_at_ms: i64)
        -> Result<Frame, CaptureError>;
}

/// Picks the primary display, falling back to the first available source.
pub fn select_display(displays: &[DisplayInfo]) -> Option<&DisplayInfo> {
    displays
        .iter()
        .find(|display| display.is_primary)
        .or_else(|| displays.first())
}

/// Upper bound for encoded captures: the display work area in physical
/// pixels, so uploads are never larger than the visible screen.
pub fn target_dimensions(display: &DisplayInfo) -> (u32, u32) {
    let scale = if display.scale_factor.is_finite() && display.scale_factor > 0.0 {
        display.scale_factor
    } else {
        1.0
    };
    let width = ((display.width as f32) * scale).round().max(1.0) as u32;
    let height = ((display.height as f32) * scale).round().max(1.0) as u32;
    (width, height)
}

/// Real display capture for supported desktop targets.
///
/// Display metadata is snapshotted at discovery; screen handles are
/// reacquired for each capture call.
#[derive(Debug, Clone)]
pub struct RealCaptureBackend {
    #[cfg(any(windows, target_os = "macos"))]
    displays: Vec<RealDisplayRecord>,
}

#[cfg(any(windows, target_os = "macos"))]
#[derive(Debug, Clone)]
struct RealDisplayRecord {
    index: usize,
    info: DisplayInfo,
}

impl RealCaptureBackend {
    /// Discovers currently available displays.
    pub fn discover() -> Result<Self, CaptureError> {
        #[cfg(any(windows, target_os = "macos"))]
        {
            use screenshots::Screen;

            let screens = Screen::all().map_err(|error| {
                CaptureError::Backend(format!("screen enumeration failed: {error}"))
            })?;

            if screens.is_empty() {
                return Err(CaptureError::NoDisplays);
            }

            let mut displays = Vec::with_capacity(screens.len());
            for (index, screen) in screens.into_iter().enumerate() {
                let info = screen.display_info;
                displays.push(RealDisplayRecord {
                    index,
                    info: DisplayInfo {
                        id: format!("display-{}", info.id),
                        name: format!("Display {}", index + 1),
                        width: info.width.max(1),
                        height: info.height.max(1),
                        scale_factor: info.scale_factor,
                        is_primary: info.is_primary,
                    },
                });
            }

            Ok(Self { displays })
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            Err(CaptureError::Backend(
                "real capture backend is not implemented for this platform".to_string(),
            ))
        }
    }
}

impl CaptureBackend for RealCaptureBackend {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        #[cfg(any(windows, target_os = "macos"))]
        {
            Ok(self
                .displays
                .iter()
                .map(|record| record.info.clone())
                .collect())
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            Err(CaptureError::Backend(
                "real capture backend is not implemented for this platform".to_string(),
            ))
        }
    }

    fn capture_display(
        &self,
        display_id: &str,
        captured_at_ms: i64,
    ) -> Result<Frame, CaptureError> {
        #[cfg(any(windows, target_os = "macos"))]
        {
            use screenshots::Screen;

            let record = self
                .displays
                .iter()
                .find(|record| record.info.id == display_id)
                .ok_or_else(|| CaptureError::UnknownDisplay(display_id.to_string()))?;

            let screens = Screen::all().map_err(|error| {
                CaptureError::Backend(format!("screen refresh failed: {error}"))
            })?;
            let screen = screens.get(record.index).ok_or_else(|| {
                CaptureError::Backend(format!(
                    "display index {} is not available anymore",
                    record.index
                ))
            })?;

            let captured = screen
                .capture()
                .map_err(|error| CaptureError::Backend(format!("screen capture failed: {error}")))?;
            let width = captured.width();
            let height = captured.height();
            let rgba = captured.into_raw();

            Frame::new(record.info.id.clone(), width, height, captured_at_ms, rgba)
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            let _ = (display_id, captured_at_ms);
            Err(CaptureError::Backend(
                "real capture backend is not implemented for this platform".to_string(),
            ))
        }
    }
}

/// Deterministic synthetic backend for tests, CI, and platforms without a
/// real capture path.
#[derive(Debug)]
pub struct SyntheticCaptureBackend {
    displays: Vec<DisplayInfo>,
    sequence: Mutex<u64>,
}

impl SyntheticCaptureBackend {
    /// Creates a synthetic backend with one default primary display.
    pub fn new() -> Self {
        Self::with_displays(vec![DisplayInfo {
            id: "synthetic-1".to_string(),
            name: "Synthetic Display".to_string(),
            width: 8,
            height: 6,
            scale_factor: 1.0,
            is_primary: true,
        }])
    }

    /// Creates a backend with a caller-provided display list.
    pub fn with_displays(displays: Vec<DisplayInfo>) -> Self {
        Self {
            displays,
            sequence: Mutex::new(0),
        }
    }
}

impl Default for SyntheticCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>, CaptureError> {
        Ok(self.displays.clone())
    }

    fn capture_display(
        &self,
        display_id: &str,
        captured_at_ms: i64,
    ) -> Result<Frame, CaptureError> {
        let display = self
            .displays
            .iter()
            .find(|display| display.id == display_id)
            .ok_or_else(|| CaptureError::UnknownDisplay(display_id.to_string()))?;

        let mut sequence = self
            .sequence
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic sequence lock poisoned".to_string()))?;
        *sequence += 1;

        let byte = (*sequence % 255) as u8;
        let rgba_len = (display.width as usize) * (display.height as usize) * 4;
        let rgba = vec![byte; rgba_len];

        Frame::new(
            display.id.clone(),
            display.width,
            display.height,
            captured_at_ms,
            rgba,
        )
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The OS reported no displays at all.
    #[error("no displays available")]
    NoDisplays,
    /// Requested display is unknown to the backend.
    #[error("unknown display: {0}")]
    UnknownDisplay(String),
    /// Frame buffer does not match the reported dimensions.
    #[error("frame buffer size mismatch for {width}x{height}")]
    InvalidFrame { width: u32, height: u32 },
    /// Backend runtime failure.
    #[error("capture backend failure: {0}")]
    Backend(String),
}

//! In-memory virtual desktop backend.
//!
//! Monitors and windows are plain records that can be moved, resized,
//! minimized, or removed while sessions are capturing them. Frames are
//! flat-coloured at the captured size.

use std::sync::Arc;

use parking_lot::RwLock;
use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::{
    detect_display_server, CaptureFrame, MonitorInfo, Rect, WindowInfo,
};

use crate::backend::{BackendCapabilities, CaptureBackend, WindowGrab};

#[derive(Debug, Clone)]
struct SyntheticWindow {
    info: WindowInfo,
    color: [u8; 4],
}

#[derive(Debug, Default)]
struct VirtualDesktop {
    monitors: Vec<MonitorInfo>,
    windows: Vec<SyntheticWindow>,
    direct_window_capture: bool,
    pending_failures: u32,
    captures: u64,
}

/// Synthetic [`CaptureBackend`].
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    desktop: Arc<RwLock<VirtualDesktop>>,
}

impl SyntheticBackend {
    /// Empty desktop with the given monitors.
    pub fn new(monitors: Vec<MonitorInfo>) -> Self {
        Self {
            desktop: Arc::new(RwLock::new(VirtualDesktop {
                monitors,
                direct_window_capture: true,
                ..VirtualDesktop::default()
            })),
        }
    }

    /// One 1920x1080 primary monitor and two sample windows.
    pub fn with_default_layout() -> Self {
        let backend = Self::new(vec![MonitorInfo {
            name: "Synthetic-1".to_string(),
            width: 1920,
            height: 1080,
            x: 0,
            y: 0,
            scale_factor: 1.0,
            primary: true,
        }]);
        backend.add_window("Terminal", Rect::new(100, 100, 800, 600), Some(1001));
        backend.add_window("Browser", Rect::new(400, 200, 1280, 720), Some(1002));
        backend
    }

    pub fn add_monitor(&self, monitor: MonitorInfo) {
        self.desktop.write().monitors.push(monitor);
    }

    /// Remove a monitor as if it were unplugged. Later indices shift down.
    pub fn unplug_monitor(&self, index: usize) -> bool {
        let mut desktop = self.desktop.write();
        if index < desktop.monitors.len() {
            desktop.monitors.remove(index);
            true
        } else {
            false
        }
    }

    pub fn add_window(&self, title: &str, bounds: Rect, handle: Option<u64>) {
        let mut desktop = self.desktop.write();
        let shade = 60 + (desktop.windows.len() as u8 % 8) * 20;
        desktop.windows.push(SyntheticWindow {
            info: WindowInfo {
                title: title.to_string(),
                bounds,
                handle,
                minimized: false,
            },
            color: [shade, 90, 200 - shade / 2, 255],
        });
    }

    /// Move/resize the first window with `title`.
    pub fn set_window_bounds(&self, title: &str, bounds: Rect) -> bool {
        self.with_window(title, |w| w.info.bounds = bounds)
    }

    pub fn set_minimized(&self, title: &str, minimized: bool) -> bool {
        self.with_window(title, |w| w.info.minimized = minimized)
    }

    /// Close the first window with `title`.
    pub fn remove_window(&self, title: &str) -> bool {
        let mut desktop = self.desktop.write();
        match desktop.windows.iter().position(|w| w.info.title == title) {
            Some(pos) => {
                desktop.windows.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Toggle whether handle-based capture is offered.
    pub fn set_direct_window_capture(&self, available: bool) {
        self.desktop.write().direct_window_capture = available;
    }

    /// Make the next `count` capture calls fail with a transient error.
    pub fn inject_failures(&self, count: u32) {
        self.desktop.write().pending_failures = count;
    }

    /// Total successful capture calls.
    pub fn capture_count(&self) -> u64 {
        self.desktop.read().captures
    }

    fn with_window(&self, title: &str, f: impl FnOnce(&mut SyntheticWindow)) -> bool {
        let mut desktop = self.desktop.write();
        match desktop.windows.iter_mut().find(|w| w.info.title == title) {
            Some(window) => {
                f(window);
                true
            }
            None => false,
        }
    }

    /// Consume one injected failure, if any, and count the capture.
    fn begin_capture(&self) -> PipResult<()> {
        let mut desktop = self.desktop.write();
        if desktop.pending_failures > 0 {
            desktop.pending_failures -= 1;
            return Err(PipError::capture("injected synthetic capture failure"));
        }
        desktop.captures += 1;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            direct_window_capture: self.desktop.read().direct_window_capture,
            display_server: detect_display_server(),
        }
    }

    async fn monitors(&self) -> PipResult<Vec<MonitorInfo>> {
        Ok(self.desktop.read().monitors.clone())
    }

    async fn windows(&self) -> PipResult<Vec<WindowInfo>> {
        Ok(self
            .desktop
            .read()
            .windows
            .iter()
            .map(|w| w.info.clone())
            .collect())
    }

    async fn capture_monitor(&self, index: usize) -> PipResult<CaptureFrame> {
        let monitor = self
            .desktop
            .read()
            .monitors
            .get(index)
            .cloned()
            .ok_or_else(|| PipError::not_found(format!("monitor {index}")))?;
        self.begin_capture()?;
        Ok(CaptureFrame::solid(
            monitor.width,
            monitor.height,
            [30, 30, 35, 255],
            0,
        ))
    }

    async fn capture_window(&self, handle: u64) -> PipResult<WindowGrab> {
        let window = self
            .desktop
            .read()
            .windows
            .iter()
            .find(|w| w.info.handle == Some(handle))
            .cloned();
        let Some(window) = window else {
            return Ok(WindowGrab::Gone);
        };
        if window.info.minimized {
            return Ok(WindowGrab::Minimized);
        }
        self.begin_capture()?;
        Ok(WindowGrab::Frame(CaptureFrame::solid(
            window.info.bounds.width,
            window.info.bounds.height,
            window.color,
            0,
        )))
    }

    async fn capture_region(&self, rect: Rect) -> PipResult<CaptureFrame> {
        if rect.is_empty() {
            return Err(PipError::invalid_request("region must be non-empty"));
        }
        self.begin_capture()?;
        Ok(CaptureFrame::solid(rect.width, rect.height, [50, 50, 50, 255], 0))
    }
}

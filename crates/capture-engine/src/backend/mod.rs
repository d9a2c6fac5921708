//! Capture backend capability surface.
//!
//! The engine never grabs pixels itself. A backend enumerates monitors and
//! windows and captures one of three kinds of target; which backend runs is
//! decided once at startup.

use std::sync::Arc;

use pipview_common::config::BackendKind;
use pipview_common::error::PipResult;
use pipview_platform_core::{CaptureFrame, DisplayServer, MonitorInfo, Rect, WindowInfo};
use serde::{Deserialize, Serialize};

/// What the selected backend can do on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Capture a window through its native handle, independent of what
    /// overlaps it on screen.
    pub direct_window_capture: bool,
    pub display_server: DisplayServer,
}

/// Result of a direct window capture.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowGrab {
    Frame(CaptureFrame),
    /// The window exists but is minimized.
    Minimized,
    /// The handle no longer refers to a window.
    Gone,
}

/// Abstract interface for platform-specific capture capabilities.
///
/// `capture_monitor` returns [`PipError::NotFound`] when the monitor index
/// no longer exists; any other error is treated as transient.
///
/// [`PipError::NotFound`]: pipview_common::error::PipError::NotFound
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    fn capabilities(&self) -> BackendCapabilities;

    /// Connected monitors in index order.
    async fn monitors(&self) -> PipResult<Vec<MonitorInfo>>;

    /// Visible application windows in enumeration order.
    async fn windows(&self) -> PipResult<Vec<WindowInfo>>;

    /// Full-resolution capture of one monitor.
    async fn capture_monitor(&self, index: usize) -> PipResult<CaptureFrame>;

    /// Direct capture through a native handle.
    async fn capture_window(&self, handle: u64) -> PipResult<WindowGrab>;

    /// Capture a fixed rectangle of the virtual desktop.
    async fn capture_region(&self, rect: Rect) -> PipResult<CaptureFrame>;
}

pub mod synthetic;

pub use synthetic::SyntheticBackend;

/// Build the backend selected by configuration.
pub fn select_backend(kind: BackendKind) -> Arc<dyn CaptureBackend> {
    match kind {
        BackendKind::Synthetic => Arc::new(SyntheticBackend::with_default_layout()),
    }
}

//! Windowing-host capability contracts.
//!
//! A render surface never talks to a toolkit directly. It asks a
//! [`WindowHost`] for a borderless window and drives it through the
//! [`HostWindow`] trait; platform shells provide the implementations.

use pipview_common::error::PipResult;
use serde::{Deserialize, Serialize};

use crate::{CaptureFrame, Point, Rect, RectF};

/// Parameters for a new surface window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub title: String,
    pub bounds: Rect,
    pub always_on_top: bool,
    pub opacity: f64,
    /// Aspect-ratio constraint applied to user resizes, if any.
    pub aspect_ratio: Option<f64>,
}

/// Context-menu entries a host can offer on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MenuAction {
    ToggleAlwaysOnTop,
    ToggleAspectRatio,
    ToggleAutoResize,
    TogglePanMode,
    SetOpacity { value: f64 },
    ResetView,
    Close,
}

/// User input and lifecycle notifications delivered by a host window.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// Primary button pressed at a window-local logical position.
    PointerPressed { local: Point },
    /// Pointer moved while pressed, in screen pixels.
    PointerDragged { dx: i32, dy: i32 },
    PointerReleased,
    /// Wheel movement; positive zooms in.
    Scroll { notches: f64 },
    Key(char),
    Menu(MenuAction),
    /// The user asked the window to close.
    CloseRequested,
}

/// Everything a host needs to draw one surface tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// Physical output size.
    pub output_width: u32,
    pub output_height: u32,
    pub background: [u8; 3],
    /// Sub-rectangle of the frame to draw, in frame pixels.
    pub source: RectF,
    /// Where that sub-rectangle lands, in output pixels.
    pub dest: RectF,
    /// Cosmetic resize affordances, clockwise from top-left.
    pub corner_indicators: [RectF; 4],
    /// Transient label such as "Opacity: 80%".
    pub indicator_text: Option<String>,
    pub controls_visible: bool,
}

/// A borderless, resizable surface window.
pub trait HostWindow: Send {
    /// Current outer bounds in logical virtual-desktop pixels.
    fn bounds(&self) -> Rect;

    fn set_bounds(&mut self, bounds: Rect) -> PipResult<()>;

    /// Display scale factor of the monitor the window is on.
    fn scale_factor(&self) -> f64;

    fn set_opacity(&mut self, opacity: f64) -> PipResult<()>;

    /// Keep the window above other windows, including full-screen ones.
    fn set_always_on_top(&mut self, on_top: bool) -> PipResult<()>;

    /// Constrain user resizes to `ratio` (width / height); `None` clears it.
    fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> PipResult<()>;

    /// Whether the control overlay intercepts pointer gestures.
    fn set_controls_interactive(&mut self, interactive: bool) -> PipResult<()>;

    /// Draw a frame according to `plan`.
    fn present(&mut self, frame: &CaptureFrame, plan: &RenderPlan) -> PipResult<()>;

    /// Take all input events received since the last call.
    fn drain_events(&mut self) -> Vec<HostEvent>;

    fn close(&mut self);
}

/// Factory and global queries of the windowing system.
pub trait WindowHost: Send + Sync {
    fn open_window(&self, spec: WindowSpec) -> PipResult<Box<dyn HostWindow>>;

    /// Global pointer position in logical virtual-desktop pixels.
    fn pointer_position(&self) -> PipResult<Point>;
}

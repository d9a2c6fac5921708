//! Headless window host.
//!
//! Keeps every window as plain state in memory. Used by the `serve`
//! command when no toolkit shell is attached and by tests that need to
//! observe what a surface asked its window to do.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use pipview_common::error::{PipError, PipResult};

use crate::host::{HostEvent, HostWindow, RenderPlan, WindowHost, WindowSpec};
use crate::{CaptureFrame, Point, Rect};

/// Observable state of one headless window.
#[derive(Debug, Clone)]
pub struct HeadlessWindowState {
    pub title: String,
    pub bounds: Rect,
    pub opacity: f64,
    pub always_on_top: bool,
    pub aspect_ratio: Option<f64>,
    pub controls_interactive: bool,
    pub frames_presented: u64,
    pub last_plan: Option<RenderPlan>,
    pub last_frame_label: Option<String>,
    pub closed: bool,
    pending: VecDeque<HostEvent>,
}

#[derive(Debug)]
struct Desktop {
    pointer: Point,
    scale_factor: f64,
    next_id: u64,
    windows: BTreeMap<u64, HeadlessWindowState>,
}

/// In-memory [`WindowHost`].
#[derive(Debug, Clone)]
pub struct HeadlessHost {
    desktop: Arc<Mutex<Desktop>>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::with_scale_factor(1.0)
    }

    pub fn with_scale_factor(scale_factor: f64) -> Self {
        Self {
            desktop: Arc::new(Mutex::new(Desktop {
                pointer: Point::new(-10_000, -10_000),
                scale_factor,
                next_id: 1,
                windows: BTreeMap::new(),
            })),
        }
    }

    /// Move the global pointer.
    pub fn set_pointer(&self, pointer: Point) {
        self.desktop.lock().pointer = pointer;
    }

    /// Queue an input event for a window.
    pub fn push_event(&self, window_id: u64, event: HostEvent) -> bool {
        match self.desktop.lock().windows.get_mut(&window_id) {
            Some(state) if !state.closed => {
                state.pending.push_back(event);
                true
            }
            _ => false,
        }
    }

    /// Simulate the user resizing a window from outside the surface.
    pub fn resize_window(&self, window_id: u64, width: u32, height: u32) {
        if let Some(state) = self.desktop.lock().windows.get_mut(&window_id) {
            state.bounds.width = width;
            state.bounds.height = height;
        }
    }

    /// Snapshot of one window.
    pub fn window(&self, window_id: u64) -> Option<HeadlessWindowState> {
        self.desktop.lock().windows.get(&window_id).cloned()
    }

    /// Ids of windows that have not been closed, in creation order.
    pub fn open_window_ids(&self) -> Vec<u64> {
        self.desktop
            .lock()
            .windows
            .iter()
            .filter(|(_, w)| !w.closed)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Find the open window with the given title.
    pub fn find_window(&self, title: &str) -> Option<u64> {
        self.desktop
            .lock()
            .windows
            .iter()
            .find(|(_, w)| !w.closed && w.title == title)
            .map(|(id, _)| *id)
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowHost for HeadlessHost {
    fn open_window(&self, spec: WindowSpec) -> PipResult<Box<dyn HostWindow>> {
        let mut desktop = self.desktop.lock();
        let id = desktop.next_id;
        desktop.next_id += 1;
        desktop.windows.insert(
            id,
            HeadlessWindowState {
                title: spec.title,
                bounds: spec.bounds,
                opacity: spec.opacity,
                always_on_top: spec.always_on_top,
                aspect_ratio: spec.aspect_ratio,
                controls_interactive: true,
                frames_presented: 0,
                last_plan: None,
                last_frame_label: None,
                closed: false,
                pending: VecDeque::new(),
            },
        );
        tracing::debug!(window_id = id, "Headless window opened");
        Ok(Box::new(HeadlessWindow {
            id,
            desktop: Arc::clone(&self.desktop),
        }))
    }

    fn pointer_position(&self) -> PipResult<Point> {
        Ok(self.desktop.lock().pointer)
    }
}

/// Handle to one headless window.
pub struct HeadlessWindow {
    id: u64,
    desktop: Arc<Mutex<Desktop>>,
}

impl HeadlessWindow {
    fn with_state<T>(&self, f: impl FnOnce(&mut HeadlessWindowState) -> T) -> PipResult<T> {
        let mut desktop = self.desktop.lock();
        match desktop.windows.get_mut(&self.id) {
            Some(state) if !state.closed => Ok(f(state)),
            _ => Err(PipError::platform(format!("window {} is closed", self.id))),
        }
    }
}

impl HostWindow for HeadlessWindow {
    fn bounds(&self) -> Rect {
        self.desktop
            .lock()
            .windows
            .get(&self.id)
            .map(|w| w.bounds)
            .unwrap_or_default()
    }

    fn set_bounds(&mut self, bounds: Rect) -> PipResult<()> {
        self.with_state(|w| w.bounds = bounds)
    }

    fn scale_factor(&self) -> f64 {
        self.desktop.lock().scale_factor
    }

    fn set_opacity(&mut self, opacity: f64) -> PipResult<()> {
        self.with_state(|w| w.opacity = opacity)
    }

    fn set_always_on_top(&mut self, on_top: bool) -> PipResult<()> {
        self.with_state(|w| w.always_on_top = on_top)
    }

    fn set_aspect_ratio(&mut self, ratio: Option<f64>) -> PipResult<()> {
        self.with_state(|w| w.aspect_ratio = ratio)
    }

    fn set_controls_interactive(&mut self, interactive: bool) -> PipResult<()> {
        self.with_state(|w| w.controls_interactive = interactive)
    }

    fn present(&mut self, frame: &CaptureFrame, plan: &RenderPlan) -> PipResult<()> {
        self.with_state(|w| {
            w.frames_presented += 1;
            w.last_plan = Some(plan.clone());
            w.last_frame_label = frame.label.clone();
        })
    }

    fn drain_events(&mut self) -> Vec<HostEvent> {
        self.with_state(|w| w.pending.drain(..).collect())
            .unwrap_or_default()
    }

    fn close(&mut self) {
        if let Some(state) = self.desktop.lock().windows.get_mut(&self.id) {
            state.closed = true;
            state.pending.clear();
        }
        tracing::debug!(window_id = self.id, "Headless window closed");
    }
}

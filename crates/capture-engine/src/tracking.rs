//! Window strategy selection and bounding-box tracking.
//!
//! Window sources are captured in one of two ranked ways:
//! 1. **Direct** through a native handle, when the window has one and the
//!    backend offers handle capture.
//! 2. **Bounding box**: the window is re-located by title on every tick and
//!    its box is captured as a region.
//!
//! Title re-location takes the first exact title match in the backend's
//! enumeration order.

use pipview_platform_core::{Rect, WindowInfo};
use serde::{Deserialize, Serialize};

/// How a window source is being captured right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum WindowStrategy {
    Direct { handle: u64 },
    BoundingBox,
}

/// Outcome of one re-location attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// Found; `moved` is set when the box changed.
    Found { moved: bool },
    /// No window with the title; carries the consecutive miss count.
    Missing { misses: u32 },
}

/// Tracking state for one window source.
#[derive(Debug, Clone)]
pub struct WindowTracker {
    title: String,
    bbox: Rect,
    strategy: WindowStrategy,
    /// The native handle was reported gone by the backend.
    handle_gone: bool,
    misses: u32,
    lost_after_misses: u32,
}

impl WindowTracker {
    /// Pick the strategy for a window.
    pub fn new(
        title: impl Into<String>,
        bbox: Rect,
        handle: Option<u64>,
        direct_supported: bool,
        lost_after_misses: u32,
    ) -> Self {
        let strategy = match handle {
            Some(handle) if direct_supported => WindowStrategy::Direct { handle },
            _ => WindowStrategy::BoundingBox,
        };
        Self {
            title: title.into(),
            bbox,
            strategy,
            handle_gone: false,
            misses: 0,
            lost_after_misses: lost_after_misses.max(1),
        }
    }

    pub fn strategy(&self) -> WindowStrategy {
        self.strategy
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Last known bounding box.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// The backend reported the native handle gone; fall back to tracking
    /// the bounding box by title.
    pub fn handle_gone(&mut self) {
        self.handle_gone = true;
        self.strategy = WindowStrategy::BoundingBox;
    }

    /// A direct grab succeeded.
    pub fn direct_ok(&mut self) {
        self.misses = 0;
    }

    /// Re-locate the window among `windows` by title.
    pub fn relocate(&mut self, windows: &[WindowInfo]) -> Relocation {
        match windows.iter().find(|w| w.title == self.title) {
            Some(found) => {
                self.misses = 0;
                let moved = found.bounds != self.bbox && !found.bounds.is_empty();
                if moved {
                    self.bbox = found.bounds;
                }
                Relocation::Found { moved }
            }
            None => {
                self.misses = self.misses.saturating_add(1);
                Relocation::Missing {
                    misses: self.misses,
                }
            }
        }
    }

    /// The window is confirmed gone: its handle vanished and title
    /// re-location kept failing. A window tracked only by title is never
    /// declared lost; its last box keeps being captured.
    pub fn is_lost(&self) -> bool {
        self.handle_gone && self.misses >= self.lost_after_misses
    }
}

//! Auto-hide state machine for a surface's control overlay.
//!
//! Driven by a low-frequency hover poll. Entering the surface shows the
//! controls and cancels any pending hide; leaving it starts a countdown
//! that hides them if the pointer is still outside when it elapses.

use std::time::Duration;

use tokio::time::Instant;

/// Visibility change produced by a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChange {
    Shown,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct OverlayState {
    hide_delay: Duration,
    visible: bool,
    pointer_inside: bool,
    hide_at: Option<Instant>,
    /// Input arrived while the pointer was last seen outside.
    rearm: bool,
}

impl OverlayState {
    /// Controls start visible with the pointer assumed outside.
    pub fn new(hide_delay: Duration, now: Instant) -> Self {
        Self {
            hide_delay,
            visible: true,
            pointer_inside: false,
            hide_at: Some(now + hide_delay),
            rearm: false,
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn pointer_inside(&self) -> bool {
        self.pointer_inside
    }

    /// Pending hide deadline, if a countdown is running.
    pub fn hide_at(&self) -> Option<Instant> {
        self.hide_at
    }

    /// Feed one hover-poll result.
    pub fn on_poll(&mut self, inside: bool, now: Instant) -> Option<OverlayChange> {
        let was_inside = self.pointer_inside;
        self.pointer_inside = inside;

        if inside {
            self.hide_at = None;
            self.rearm = false;
            if !self.visible {
                self.visible = true;
                return Some(OverlayChange::Shown);
            }
            return None;
        }

        if was_inside || self.rearm {
            self.rearm = false;
            if self.visible {
                self.hide_at = Some(now + self.hide_delay);
            }
            return None;
        }

        match self.hide_at {
            Some(deadline) if now >= deadline && self.visible => {
                self.visible = false;
                self.hide_at = None;
                Some(OverlayChange::Hidden)
            }
            _ => None,
        }
    }

    /// Input activity on the surface. While the pointer is outside the
    /// countdown restarts at the next poll that confirms it is still
    /// outside.
    pub fn on_activity(&mut self) {
        if !self.pointer_inside {
            self.rearm = true;
        }
    }
}

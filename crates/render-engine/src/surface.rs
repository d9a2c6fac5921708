//! Per-session surface state and its local affordances.
//!
//! [`SurfaceState`] holds everything a surface changes in response to user
//! input or scoped control requests and applies each change to its host
//! window. It owns no timers; the surface task feeds it events, frames,
//! and the current instant.

use std::time::Duration;

use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::{CaptureFrame, HostEvent, HostWindow, MenuAction, RenderPlan};
use pipview_session_model::{CropRect, Opacity, SessionFlags, SourceType, ViewState};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::resize::{self, ResizeEdge, SizeLimits};
use crate::transform::{compute_transform, corner_indicators, output_size};

/// Zoom multiplier per scroll notch.
pub const ZOOM_STEP: f64 = 1.1;
/// Opacity change per `+`/`-` key press.
pub const OPACITY_STEP: f64 = 0.1;

/// What a pointer drag is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drag {
    Idle,
    MoveWindow,
    Resize(ResizeEdge),
    Pan,
}

/// Reported state of a live surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSnapshot {
    pub crop: Option<CropRect>,
    pub view: ViewState,
    pub flags: SessionFlags,
    pub known_aspect_ratio: Option<f64>,
    pub pan_mode: bool,
    pub controls_visible: bool,
}

/// What the task must do after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Handled,
    CloseRequested,
}

#[derive(Debug)]
pub struct SurfaceState {
    source_type: SourceType,
    crop: Option<CropRect>,
    view: ViewState,
    flags: SessionFlags,
    known_aspect_ratio: Option<f64>,
    pan_mode: bool,
    frame_size: Option<(u32, u32)>,
    drag: Drag,
    indicator: Option<(String, Instant)>,
    indicator_duration: Duration,
    limits: SizeLimits,
}

impl SurfaceState {
    pub fn new(
        source_type: SourceType,
        crop: Option<CropRect>,
        view: ViewState,
        limits: SizeLimits,
        indicator_duration: Duration,
    ) -> Self {
        Self {
            source_type,
            crop,
            view,
            flags: SessionFlags::default(),
            known_aspect_ratio: None,
            pan_mode: false,
            frame_size: None,
            drag: Drag::Idle,
            indicator: None,
            indicator_duration,
            limits,
        }
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn crop(&self) -> Option<CropRect> {
        self.crop
    }

    pub fn known_aspect_ratio(&self) -> Option<f64> {
        self.known_aspect_ratio
    }

    pub fn pan_mode(&self) -> bool {
        self.pan_mode
    }

    /// Aspect constraint to hand the host, if one is in force.
    pub fn aspect_constraint(&self) -> Option<f64> {
        if self.flags.maintain_aspect_ratio {
            self.known_aspect_ratio
        } else {
            None
        }
    }

    pub fn snapshot(&self, controls_visible: bool) -> SurfaceSnapshot {
        SurfaceSnapshot {
            crop: self.crop,
            view: self.view,
            flags: self.flags,
            known_aspect_ratio: self.known_aspect_ratio,
            pan_mode: self.pan_mode,
            controls_visible,
        }
    }

    /// Ratio of what the surface shows: the crop if set, else the frame.
    fn content_ratio(&self, width: u32, height: u32) -> Option<f64> {
        match self.crop {
            Some(crop) => Some(crop.fitted(width, height).aspect_ratio()),
            None if width > 0 && height > 0 => Some(width as f64 / height as f64),
            None => None,
        }
    }

    /// Record the size of an incoming frame. The first real frame sets the
    /// known aspect ratio. Returns true when the ratio was set.
    pub fn observe_frame(&mut self, frame: &CaptureFrame, window: &mut dyn HostWindow) -> bool {
        if frame.is_placeholder() {
            return false;
        }
        self.frame_size = Some(frame.size());
        if let Some(crop) = self.crop {
            self.crop = Some(crop.fitted(frame.width, frame.height));
        }
        if self.known_aspect_ratio.is_some() {
            return false;
        }
        self.known_aspect_ratio = self.content_ratio(frame.width, frame.height);
        self.apply_aspect_constraint(window);
        self.known_aspect_ratio.is_some()
    }

    /// Source frames changed size. Updates the known ratio when it moved by
    /// more than the threshold and, for window sources with auto-resize on,
    /// resizes the host window to match. Returns true when the ratio changed.
    pub fn on_source_resized(
        &mut self,
        width: u32,
        height: u32,
        window: &mut dyn HostWindow,
    ) -> PipResult<bool> {
        self.frame_size = Some((width, height));
        if let Some(crop) = self.crop {
            self.crop = Some(crop.fitted(width, height));
        }
        let Some(ratio) = self.content_ratio(width, height) else {
            return Ok(false);
        };
        if !resize::aspect_changed(self.known_aspect_ratio, ratio) {
            return Ok(false);
        }
        self.known_aspect_ratio = Some(ratio);
        self.apply_aspect_constraint(window);

        if self.flags.auto_resize_on_source_change && self.source_type == SourceType::Window {
            let bounds = resize::auto_resize_bounds(window.bounds(), ratio, self.limits);
            window.set_bounds(bounds)?;
            tracing::debug!(width = bounds.width, height = bounds.height, "Surface auto-resized");
        }
        Ok(true)
    }

    fn apply_aspect_constraint(&self, window: &mut dyn HostWindow) {
        if let Err(e) = window.set_aspect_ratio(self.aspect_constraint()) {
            tracing::debug!(error = %e, "Host rejected aspect constraint");
        }
    }

    pub fn set_opacity(
        &mut self,
        value: f64,
        window: &mut dyn HostWindow,
        now: Instant,
    ) -> PipResult<Opacity> {
        let opacity = Opacity::new(value);
        window.set_opacity(opacity.value())?;
        self.flags.opacity = opacity;
        self.indicator = Some((
            format!("Opacity: {}%", opacity.percent()),
            now + self.indicator_duration,
        ));
        Ok(opacity)
    }

    pub fn adjust_opacity(
        &mut self,
        delta: f64,
        window: &mut dyn HostWindow,
        now: Instant,
    ) -> PipResult<Opacity> {
        let target = self.flags.opacity.adjusted(delta).value();
        self.set_opacity(target, window, now)
    }

    pub fn set_always_on_top(&mut self, value: bool, window: &mut dyn HostWindow) -> PipResult<()> {
        window.set_always_on_top(value)?;
        self.flags.always_on_top = value;
        Ok(())
    }

    /// Constrain resizes to `ratio`; `0` clears the constraint.
    pub fn set_aspect_ratio(&mut self, ratio: f64, window: &mut dyn HostWindow) -> PipResult<()> {
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(PipError::invalid_request(format!(
                "aspect ratio must be >= 0, got {ratio}"
            )));
        }
        if ratio == 0.0 {
            window.set_aspect_ratio(None)?;
            self.flags.maintain_aspect_ratio = false;
        } else {
            window.set_aspect_ratio(Some(ratio))?;
            self.known_aspect_ratio = Some(ratio);
            self.flags.maintain_aspect_ratio = true;
        }
        Ok(())
    }

    /// Menu toggle; only offered once the source ratio is known.
    pub fn toggle_maintain_aspect(&mut self, window: &mut dyn HostWindow) -> PipResult<bool> {
        if self.known_aspect_ratio.is_none() {
            return Err(PipError::unsupported("source aspect ratio is not known yet"));
        }
        self.flags.maintain_aspect_ratio = !self.flags.maintain_aspect_ratio;
        window.set_aspect_ratio(self.aspect_constraint())?;
        Ok(self.flags.maintain_aspect_ratio)
    }

    /// Menu toggle; only offered for window sources.
    pub fn toggle_auto_resize(&mut self) -> PipResult<bool> {
        if self.source_type != SourceType::Window {
            return Err(PipError::unsupported(
                "auto-resize applies to window sources only",
            ));
        }
        self.flags.auto_resize_on_source_change = !self.flags.auto_resize_on_source_change;
        Ok(self.flags.auto_resize_on_source_change)
    }

    pub fn toggle_pan_mode(&mut self) -> bool {
        self.pan_mode = !self.pan_mode;
        if self.drag == Drag::MoveWindow || self.drag == Drag::Pan {
            self.drag = Drag::Idle;
        }
        self.pan_mode
    }

    /// Scroll zoom, `ZOOM_STEP` per notch.
    pub fn zoom(&mut self, notches: f64) {
        self.view = self.view.zoomed_by(ZOOM_STEP.powf(notches));
    }

    pub fn reset_view(&mut self) {
        self.view = ViewState::IDENTITY;
    }

    /// Move the crop origin by a delta, clamped inside the source. No-op
    /// without a crop or before the first frame.
    pub fn drag_crop(&mut self, dx: i64, dy: i64) -> Option<CropRect> {
        let (fw, fh) = self.frame_size?;
        let crop = self.crop?.dragged(dx, dy, fw, fh);
        self.crop = Some(crop);
        Some(crop)
    }

    /// Apply one host input event.
    pub fn handle_event(
        &mut self,
        event: HostEvent,
        window: &mut dyn HostWindow,
        now: Instant,
    ) -> PipResult<EventOutcome> {
        match event {
            HostEvent::PointerPressed { local } => {
                let bounds = window.bounds();
                self.drag = match resize::hit_test(local, bounds.width, bounds.height) {
                    Some(edge) => Drag::Resize(edge),
                    None if self.pan_mode => Drag::Pan,
                    None => Drag::MoveWindow,
                };
            }
            HostEvent::PointerDragged { dx, dy } => match self.drag {
                Drag::Idle => {}
                Drag::MoveWindow => {
                    let mut bounds = window.bounds();
                    bounds.x += dx;
                    bounds.y += dy;
                    window.set_bounds(bounds)?;
                }
                Drag::Resize(edge) => {
                    let bounds = resize::resize_bounds(
                        window.bounds(),
                        edge,
                        dx,
                        dy,
                        self.aspect_constraint(),
                        self.limits,
                    );
                    window.set_bounds(bounds)?;
                }
                Drag::Pan => {
                    self.view = self.view.panned_by(dx as f64, dy as f64);
                }
            },
            HostEvent::PointerReleased => self.drag = Drag::Idle,
            HostEvent::Scroll { notches } => self.zoom(notches),
            HostEvent::Key(key) => match key {
                '+' | '=' => {
                    self.adjust_opacity(OPACITY_STEP, window, now)?;
                }
                '-' => {
                    self.adjust_opacity(-OPACITY_STEP, window, now)?;
                }
                '0' => {
                    self.set_opacity(Opacity::MAX, window, now)?;
                }
                _ => {}
            },
            HostEvent::Menu(action) => return self.handle_menu(action, window, now),
            HostEvent::CloseRequested => return Ok(EventOutcome::CloseRequested),
        }
        Ok(EventOutcome::Handled)
    }

    fn handle_menu(
        &mut self,
        action: MenuAction,
        window: &mut dyn HostWindow,
        now: Instant,
    ) -> PipResult<EventOutcome> {
        match action {
            MenuAction::ToggleAlwaysOnTop => {
                let value = !self.flags.always_on_top;
                self.set_always_on_top(value, window)?;
            }
            MenuAction::ToggleAspectRatio => {
                self.toggle_maintain_aspect(window)?;
            }
            MenuAction::ToggleAutoResize => {
                self.toggle_auto_resize()?;
            }
            MenuAction::TogglePanMode => {
                self.toggle_pan_mode();
            }
            MenuAction::SetOpacity { value } => {
                self.set_opacity(value, window, now)?;
            }
            MenuAction::ResetView => self.reset_view(),
            MenuAction::Close => return Ok(EventOutcome::CloseRequested),
        }
        Ok(EventOutcome::Handled)
    }

    /// Indicator text still on screen at `now`.
    pub fn indicator_text(&mut self, now: Instant) -> Option<String> {
        match &self.indicator {
            Some((text, until)) if now < *until => Some(text.clone()),
            Some(_) => {
                self.indicator = None;
                None
            }
            None => None,
        }
    }

    /// Build the draw instructions for `frame` in the window's current
    /// client area.
    pub fn plan(
        &mut self,
        frame: &CaptureFrame,
        window: &dyn HostWindow,
        background: [u8; 3],
        controls_visible: bool,
        now: Instant,
    ) -> Option<RenderPlan> {
        let bounds = window.bounds();
        let scale_factor = window.scale_factor();
        let (out_w, out_h) = output_size(bounds.width, bounds.height, scale_factor);
        // Crops refer to the real source; a placeholder is shown whole.
        let crop = if frame.is_placeholder() {
            None
        } else {
            self.crop.as_ref()
        };
        let view = if frame.is_placeholder() {
            ViewState::IDENTITY
        } else {
            self.view
        };
        let transform = compute_transform(
            frame.width,
            frame.height,
            crop,
            &view,
            out_w,
            out_h,
            scale_factor,
        )?;

        Some(RenderPlan {
            output_width: out_w,
            output_height: out_h,
            background,
            source: transform.source,
            dest: transform.dest,
            corner_indicators: corner_indicators(out_w, out_h, scale_factor),
            indicator_text: self.indicator_text(now),
            controls_visible,
        })
    }
}

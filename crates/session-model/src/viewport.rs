//! Crop and view types for framing a captured source.
//!
//! A [`CropRect`] selects the part of a captured frame that is shown; a
//! [`ViewState`] adds zoom and pan on top of the cover-fitted crop.

use pipview_common::error::{PipError, PipResult};
use serde::{Deserialize, Serialize};

/// Lower zoom bound for interactive zooming.
pub const MIN_ZOOM: f64 = 0.1;
/// Upper zoom bound for interactive zooming.
pub const MAX_ZOOM: f64 = 10.0;

/// A rectangle in source-frame pixels.
///
/// A valid crop for a `source_w x source_h` frame satisfies
/// `1 <= w, h` and `0 <= x <= source_w - w`, `0 <= y <= source_h - h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// The crop covering a whole frame.
    pub fn full(source_w: u32, source_h: u32) -> Self {
        Self::new(0, 0, source_w.max(1), source_h.max(1))
    }

    /// Check the crop against a source size.
    pub fn validate(&self, source_w: u32, source_h: u32) -> PipResult<()> {
        if self.w == 0 || self.h == 0 {
            return Err(PipError::invalid_request(format!(
                "crop must be at least 1x1, got {}x{}",
                self.w, self.h
            )));
        }
        if self.w > source_w
            || self.h > source_h
            || self.x > source_w - self.w
            || self.y > source_h - self.h
        {
            return Err(PipError::invalid_request(format!(
                "crop {}x{}+{}+{} exceeds source {}x{}",
                self.w, self.h, self.x, self.y, source_w, source_h
            )));
        }
        Ok(())
    }

    /// Place the crop origin at `(x, y)`, clamped into
    /// `[0, source_w - w] x [0, source_h - h]`. Out-of-range values are
    /// clamped, never rejected. A crop larger than the source is first
    /// shrunk to fit.
    pub fn with_origin_clamped(&self, x: i64, y: i64, source_w: u32, source_h: u32) -> Self {
        let w = self.w.clamp(1, source_w.max(1));
        let h = self.h.clamp(1, source_h.max(1));
        let max_x = source_w.saturating_sub(w) as i64;
        let max_y = source_h.saturating_sub(h) as i64;
        Self {
            x: x.clamp(0, max_x) as u32,
            y: y.clamp(0, max_y) as u32,
            w,
            h,
        }
    }

    /// Move the crop by a drag delta, keeping it inside the source.
    pub fn dragged(&self, dx: i64, dy: i64, source_w: u32, source_h: u32) -> Self {
        self.with_origin_clamped(
            (self.x as i64).saturating_add(dx),
            (self.y as i64).saturating_add(dy),
            source_w,
            source_h,
        )
    }

    /// The crop made valid for a (possibly resized) source.
    pub fn fitted(&self, source_w: u32, source_h: u32) -> Self {
        self.with_origin_clamped(self.x as i64, self.y as i64, source_w, source_h)
    }

    /// Width / height.
    pub fn aspect_ratio(&self) -> f64 {
        self.w.max(1) as f64 / self.h.max(1) as f64
    }
}

/// Zoom and pan applied on top of the cover-fitted crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewState {
    /// Uniform multiplier, always > 0.
    pub zoom: f64,
    /// Horizontal offset in output-space logical pixels.
    pub pan_x: f64,
    /// Vertical offset in output-space logical pixels.
    pub pan_y: f64,
}

impl ViewState {
    pub const IDENTITY: ViewState = ViewState {
        zoom: 1.0,
        pan_x: 0.0,
        pan_y: 0.0,
    };

    /// Reject non-finite values and non-positive zoom.
    pub fn validate(&self) -> PipResult<()> {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(PipError::invalid_request(format!(
                "zoom must be a positive number, got {}",
                self.zoom
            )));
        }
        if !self.pan_x.is_finite() || !self.pan_y.is_finite() {
            return Err(PipError::invalid_request("pan offsets must be finite"));
        }
        Ok(())
    }

    /// Multiply zoom by `factor`, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoomed_by(&self, factor: f64) -> Self {
        let zoom = if factor.is_finite() && factor > 0.0 {
            (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            self.zoom
        };
        Self { zoom, ..*self }
    }

    /// Shift the pan offsets.
    pub fn panned_by(&self, dx: f64, dy: f64) -> Self {
        Self {
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
            ..*self
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_crop_is_valid() {
        let crop = CropRect::full(1920, 1080);
        assert!(crop.validate(1920, 1080).is_ok());
    }

    #[test]
    fn test_crop_past_edge_is_rejected() {
        assert!(CropRect::new(1900, 0, 40, 40).validate(1920, 1080).is_err());
        assert!(CropRect::new(0, 0, 0, 10).validate(1920, 1080).is_err());
    }

    #[test]
    fn test_drag_clamps_silently() {
        let crop = CropRect::new(100, 100, 640, 480);
        let moved = crop.dragged(-500, 10_000, 1920, 1080);
        assert_eq!(moved, CropRect::new(0, 600, 640, 480));
    }

    #[test]
    fn test_oversized_crop_shrinks_to_source() {
        let crop = CropRect::new(50, 50, 4000, 3000);
        assert_eq!(crop.fitted(1920, 1080), CropRect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_view_validation() {
        assert!(ViewState::IDENTITY.validate().is_ok());
        let bad = ViewState {
            zoom: 0.0,
            ..ViewState::IDENTITY
        };
        assert!(bad.validate().is_err());
        let nan = ViewState {
            pan_x: f64::NAN,
            ..ViewState::IDENTITY
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut view = ViewState::IDENTITY;
        for _ in 0..100 {
            view = view.zoomed_by(1.1);
        }
        assert_eq!(view.zoom, MAX_ZOOM);
        assert_eq!(view.zoomed_by(-1.0).zoom, MAX_ZOOM);
    }

    #[test]
    fn test_view_deserializes_with_defaults() {
        let view: ViewState = serde_json::from_str(r#"{"panX": 12.5}"#).unwrap();
        assert_eq!(view.zoom, 1.0);
        assert_eq!(view.pan_x, 12.5);
    }

    #[test]
    fn test_extreme_drag_deltas_clamp() {
        let crop = CropRect::new(100, 50, 640, 480);
        let far = crop.dragged(i64::MAX, i64::MAX, 1920, 1080);
        assert_eq!((far.x, far.y), (1280, 600));
        let back = far.dragged(i64::MIN, i64::MIN, 1920, 1080);
        assert_eq!((back.x, back.y), (0, 0));
    }

    proptest! {
        #[test]
        fn dragged_origin_stays_in_bounds(
            source_w in 1u32..4000,
            source_h in 1u32..4000,
            w in 1u32..4000,
            h in 1u32..4000,
            x in -10_000i64..10_000,
            y in -10_000i64..10_000,
        ) {
            let crop = CropRect::new(0, 0, w, h).with_origin_clamped(x, y, source_w, source_h);
            prop_assert!(crop.w >= 1 && crop.h >= 1);
            prop_assert!(crop.x <= source_w - crop.w);
            prop_assert!(crop.y <= source_h - crop.h);
            prop_assert!(crop.validate(source_w, source_h).is_ok());
        }
    }
}

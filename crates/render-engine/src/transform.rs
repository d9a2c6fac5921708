//! Transform pipeline: where a captured frame lands in the output.
//!
//! Pure geometry. Given a frame size, the session's crop and view, and the
//! current output size, compute the source sub-rectangle and its
//! destination rectangle for one render tick.

use pipview_platform_core::RectF;
use pipview_session_model::{CropRect, ViewState};

/// Side length of the cosmetic corner resize indicators, logical pixels.
pub const CORNER_INDICATOR_SIZE: f64 = 12.0;

/// Derived placement for one render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// Sub-rectangle of the frame being shown, in frame pixels.
    pub source: RectF,

    /// Cover-fit scale from source to output pixels.
    pub scale: f64,

    /// Source size after cover-fit, before zoom.
    pub base_width: f64,
    pub base_height: f64,

    /// Final placement in output pixels, after zoom and pan.
    pub dest: RectF,
}

/// Compute the placement of a frame in a `out_w x out_h` output.
///
/// The sub-rectangle is the crop (made valid for the frame) or the whole
/// frame. It is scaled uniformly by `max(out_w / sub_w, out_h / sub_h)` so
/// it always covers the output, then zoomed around the output centre
/// shifted by the pan offsets. Pan is in logical pixels and is converted
/// with `scale_factor`.
///
/// Returns `None` when either the frame or the output is empty.
pub fn compute_transform(
    frame_width: u32,
    frame_height: u32,
    crop: Option<&CropRect>,
    view: &ViewState,
    out_width: u32,
    out_height: u32,
    scale_factor: f64,
) -> Option<FrameTransform> {
    if frame_width == 0 || frame_height == 0 || out_width == 0 || out_height == 0 {
        return None;
    }

    let sub = match crop {
        Some(crop) => crop.fitted(frame_width, frame_height),
        None => CropRect::full(frame_width, frame_height),
    };
    let (sub_w, sub_h) = (sub.w as f64, sub.h as f64);
    let (out_w, out_h) = (out_width as f64, out_height as f64);

    let scale = (out_w / sub_w).max(out_h / sub_h);
    let base_width = sub_w * scale;
    let base_height = sub_h * scale;

    let zoom = if view.zoom.is_finite() && view.zoom > 0.0 {
        view.zoom
    } else {
        1.0
    };
    let sf = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    };

    let width = base_width * zoom;
    let height = base_height * zoom;
    let center_x = out_w / 2.0 + view.pan_x * sf;
    let center_y = out_h / 2.0 + view.pan_y * sf;

    Some(FrameTransform {
        source: RectF::new(sub.x as f64, sub.y as f64, sub_w, sub_h),
        scale,
        base_width,
        base_height,
        dest: RectF::new(center_x - width / 2.0, center_y - height / 2.0, width, height),
    })
}

/// Resize affordances in the four output corners, clockwise from top-left.
pub fn corner_indicators(out_width: u32, out_height: u32, scale_factor: f64) -> [RectF; 4] {
    let size = CORNER_INDICATOR_SIZE * scale_factor.max(1.0);
    let (w, h) = (out_width as f64, out_height as f64);
    let size = size.min(w / 2.0).min(h / 2.0);
    [
        RectF::new(0.0, 0.0, size, size),
        RectF::new(w - size, 0.0, size, size),
        RectF::new(w - size, h - size, size, size),
        RectF::new(0.0, h - size, size, size),
    ]
}

/// Physical output size for a window of logical size `width x height`.
pub fn output_size(width: u32, height: u32, scale_factor: f64) -> (u32, u32) {
    let sf = if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    };
    (
        (width as f64 * sf).round() as u32,
        (height as f64 * sf).round() as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn crop_scaled_to_exactly_fill_output() {
        let crop = CropRect::new(0, 0, 640, 480);
        let t = compute_transform(1920, 1080, Some(&crop), &ViewState::IDENTITY, 1280, 960, 1.0)
            .unwrap();
        assert_eq!(t.scale, 2.0);
        assert_eq!((t.base_width, t.base_height), (1280.0, 960.0));
        assert_eq!(t.dest, RectF::new(0.0, 0.0, 1280.0, 960.0));
        assert_eq!(t.source, RectF::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn aspect_mismatch_overflows_instead_of_stretching() {
        // 16:9 frame into a square output: height fits, width overflows.
        let t = compute_transform(1920, 1080, None, &ViewState::IDENTITY, 540, 540, 1.0).unwrap();
        assert!((t.scale - 0.5).abs() < 1e-12);
        assert_eq!(t.base_height, 540.0);
        assert_eq!(t.base_width, 960.0);
        assert_eq!(t.dest.x, -210.0);
    }

    #[test]
    fn zoom_is_centred_and_pan_uses_scale_factor() {
        let view = ViewState {
            zoom: 2.0,
            pan_x: 10.0,
            pan_y: -5.0,
        };
        let t = compute_transform(400, 300, None, &view, 800, 600, 2.0).unwrap();
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.dest.w, 1600.0);
        assert_eq!(t.dest.h, 1200.0);
        assert_eq!(t.dest.center(), (420.0, 290.0));
    }

    #[test]
    fn out_of_range_crop_is_fitted_to_frame() {
        let crop = CropRect::new(900, 700, 400, 300);
        let t = compute_transform(1000, 800, Some(&crop), &ViewState::IDENTITY, 400, 300, 1.0)
            .unwrap();
        assert_eq!(t.source, RectF::new(600.0, 500.0, 400.0, 300.0));
    }

    #[test]
    fn empty_inputs_produce_no_transform() {
        assert!(compute_transform(0, 10, None, &ViewState::IDENTITY, 10, 10, 1.0).is_none());
        assert!(compute_transform(10, 10, None, &ViewState::IDENTITY, 10, 0, 1.0).is_none());
    }

    #[test]
    fn corner_indicators_sit_in_corners() {
        let corners = corner_indicators(400, 300, 1.0);
        assert_eq!(corners[0], RectF::new(0.0, 0.0, 12.0, 12.0));
        assert_eq!(corners[2], RectF::new(388.0, 288.0, 12.0, 12.0));
    }

    #[test]
    fn output_size_follows_scale_factor() {
        assert_eq!(output_size(400, 300, 1.5), (600, 450));
        assert_eq!(output_size(400, 300, f64::NAN), (400, 300));
    }

    proptest! {
        #[test]
        fn cover_fit_always_fills_output(
            sub_w in 1u32..4000,
            sub_h in 1u32..4000,
            out_w in 1u32..4000,
            out_h in 1u32..4000,
        ) {
            let t = compute_transform(sub_w, sub_h, None, &ViewState::IDENTITY, out_w, out_h, 1.0)
                .unwrap();
            let eps = 1e-6;
            prop_assert!(t.base_width + eps >= out_w as f64);
            prop_assert!(t.base_height + eps >= out_h as f64);
            // Uniform scale: aspect of the drawn rect equals the source aspect.
            let drawn = t.dest.w / t.dest.h;
            let source = sub_w as f64 / sub_h as f64;
            prop_assert!((drawn - source).abs() <= source * 1e-9);
        }
    }
}

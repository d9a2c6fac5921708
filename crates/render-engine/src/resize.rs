//! Edge/corner resizing of surface windows under size and aspect limits.

use pipview_common::config::RenderDefaults;
use pipview_platform_core::{Point, Rect};

/// Corner hit area, logical pixels from each corner.
const CORNER_GRIP: i32 = 20;
/// Edge hit area, logical pixels from each edge.
const EDGE_GRIP: i32 = 10;

/// Aspect-ratio changes at or below this are ignored.
pub const ASPECT_EPSILON: f64 = 0.01;

/// Which part of the window frame a resize drag holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeEdge {
    fn north(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    fn south(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    fn east(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }

    fn west(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn is_corner(self) -> bool {
        (self.north() || self.south()) && (self.east() || self.west())
    }
}

/// Minimum window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min_width: u32,
    pub min_height: u32,
}

impl From<&RenderDefaults> for SizeLimits {
    fn from(defaults: &RenderDefaults) -> Self {
        Self {
            min_width: defaults.min_window_width.max(1),
            min_height: defaults.min_window_height.max(1),
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self::from(&RenderDefaults::default())
    }
}

/// Which resize grip, if any, is under a window-local point.
/// Corners take precedence over edges.
pub fn hit_test(local: Point, width: u32, height: u32) -> Option<ResizeEdge> {
    let (w, h) = (width as i32, height as i32);
    let (x, y) = (local.x, local.y);
    if x < 0 || y < 0 || x >= w || y >= h {
        return None;
    }

    let right = x >= w - CORNER_GRIP;
    let left = x <= CORNER_GRIP;
    let bottom = y >= h - CORNER_GRIP;
    let top = y <= CORNER_GRIP;

    match (top, bottom, left, right) {
        (_, true, _, true) => Some(ResizeEdge::SouthEast),
        (_, true, true, _) => Some(ResizeEdge::SouthWest),
        (true, _, _, true) => Some(ResizeEdge::NorthEast),
        (true, _, true, _) => Some(ResizeEdge::NorthWest),
        _ if y <= EDGE_GRIP => Some(ResizeEdge::North),
        _ if y >= h - EDGE_GRIP => Some(ResizeEdge::South),
        _ if x >= w - EDGE_GRIP => Some(ResizeEdge::East),
        _ if x <= EDGE_GRIP => Some(ResizeEdge::West),
        _ => None,
    }
}

/// Apply one drag step to `bounds` while holding `edge`.
///
/// Sizes never drop below `limits`. With an `aspect` ratio, horizontal
/// edges drive the height, vertical edges drive the width, and corners
/// follow whichever dimension changed most. Dragging a north or west grip
/// keeps the opposite edge in place.
pub fn resize_bounds(
    bounds: Rect,
    edge: ResizeEdge,
    dx: i32,
    dy: i32,
    aspect: Option<f64>,
    limits: SizeLimits,
) -> Rect {
    let (cur_w, cur_h) = (bounds.width as i64, bounds.height as i64);
    let (min_w, min_h) = (limits.min_width as i64, limits.min_height as i64);

    let mut width = cur_w;
    let mut height = cur_h;
    if edge.east() {
        width = (cur_w + dx as i64).max(min_w);
    } else if edge.west() {
        width = (cur_w - dx as i64).max(min_w);
    }
    if edge.south() {
        height = (cur_h + dy as i64).max(min_h);
    } else if edge.north() {
        height = (cur_h - dy as i64).max(min_h);
    }

    if let Some(ratio) = aspect.filter(|r| r.is_finite() && *r > 0.0) {
        let width_driven = match edge {
            ResizeEdge::East | ResizeEdge::West => true,
            ResizeEdge::North | ResizeEdge::South => false,
            _ => (width - cur_w).abs() > (height - cur_h).abs(),
        };
        (width, height) = if width_driven {
            fit_height(width, ratio, min_h)
        } else {
            fit_width(height, ratio, min_w)
        };
    }

    let x = if edge.west() {
        bounds.right() as i64 - width
    } else {
        bounds.x as i64
    };
    let y = if edge.north() {
        bounds.bottom() as i64 - height
    } else {
        bounds.y as i64
    };

    Rect::new(x as i32, y as i32, width as u32, height as u32)
}

/// Keep `width`, derive the height, then re-derive the width if the height
/// hit its minimum.
fn fit_height(width: i64, ratio: f64, min_h: i64) -> (i64, i64) {
    let height = ((width as f64 / ratio).round() as i64).max(min_h);
    ((height as f64 * ratio).round() as i64, height)
}

fn fit_width(height: i64, ratio: f64, min_w: i64) -> (i64, i64) {
    let width = ((height as f64 * ratio).round() as i64).max(min_w);
    (width, (width as f64 / ratio).round() as i64)
}

/// Opening size for a surface: `initial_width` wide, height from the
/// aspect ratio. A height below the minimum is raised and the width
/// derived from it instead.
pub fn initial_size(aspect: Option<f64>, initial_width: u32, limits: SizeLimits) -> (u32, u32) {
    let width = initial_width.max(limits.min_width);
    let ratio = match aspect.filter(|r| r.is_finite() && *r > 0.0) {
        Some(ratio) => ratio,
        None => return (width, (width * 3 / 4).max(limits.min_height)),
    };
    let height = (width as f64 / ratio).round() as u32;
    if height < limits.min_height {
        let height = limits.min_height;
        ((height as f64 * ratio).round() as u32, height)
    } else {
        (width, height)
    }
}

/// New bounds after the source aspect ratio changed.
///
/// Keeps the width and derives the height, unless that would change the
/// height by more than half, in which case the height is kept and the
/// width derived. The origin stays put.
pub fn auto_resize_bounds(bounds: Rect, ratio: f64, limits: SizeLimits) -> Rect {
    if !ratio.is_finite() || ratio <= 0.0 {
        return bounds;
    }
    let cur_w = bounds.width as f64;
    let cur_h = bounds.height as f64;

    let mut height = ((cur_w / ratio).round() as u32).max(limits.min_height);
    let width = if (height as f64 - cur_h).abs() > cur_h * 0.5 {
        let width = ((cur_h * ratio).round() as u32).max(limits.min_width);
        height = (width as f64 / ratio).round() as u32;
        width
    } else {
        bounds.width
    };

    Rect::new(bounds.x, bounds.y, width, height)
}

/// Whether two ratios differ enough to act on.
pub fn aspect_changed(old: Option<f64>, new: f64) -> bool {
    match old {
        Some(old) => (new - old).abs() > ASPECT_EPSILON,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> SizeLimits {
        SizeLimits {
            min_width: 200,
            min_height: 150,
        }
    }

    #[test]
    fn hit_test_prefers_corners() {
        assert_eq!(hit_test(Point::new(395, 295), 400, 300), Some(ResizeEdge::SouthEast));
        assert_eq!(hit_test(Point::new(2, 2), 400, 300), Some(ResizeEdge::NorthWest));
        assert_eq!(hit_test(Point::new(200, 3), 400, 300), Some(ResizeEdge::North));
        assert_eq!(hit_test(Point::new(398, 150), 400, 300), Some(ResizeEdge::East));
        assert_eq!(hit_test(Point::new(5, 150), 400, 300), Some(ResizeEdge::West));
        assert_eq!(hit_test(Point::new(200, 150), 400, 300), None);
        assert_eq!(hit_test(Point::new(-1, 150), 400, 300), None);
    }

    #[test]
    fn free_resize_respects_minimums() {
        let b = Rect::new(100, 100, 400, 300);
        let r = resize_bounds(b, ResizeEdge::SouthEast, -500, -500, None, limits());
        assert_eq!(r, Rect::new(100, 100, 200, 150));
    }

    #[test]
    fn west_and_north_edges_keep_opposite_edge_fixed() {
        let b = Rect::new(100, 100, 400, 300);
        let r = resize_bounds(b, ResizeEdge::NorthWest, -50, -20, None, limits());
        assert_eq!(r, Rect::new(50, 80, 450, 320));
        assert_eq!(r.right(), b.right());
        assert_eq!(r.bottom(), b.bottom());

        // Clamped at the minimum, the right edge still holds.
        let r = resize_bounds(b, ResizeEdge::West, 350, 0, None, limits());
        assert_eq!(r.width, 200);
        assert_eq!(r.right(), b.right());
    }

    #[test]
    fn aspect_constrained_edges() {
        let b = Rect::new(0, 0, 400, 300);
        let ratio = Some(4.0 / 3.0);

        let r = resize_bounds(b, ResizeEdge::East, 80, 0, ratio, limits());
        assert_eq!((r.width, r.height), (480, 360));

        let r = resize_bounds(b, ResizeEdge::South, 0, 60, ratio, limits());
        assert_eq!((r.width, r.height), (480, 360));
    }

    #[test]
    fn aspect_constrained_corner_follows_larger_change() {
        let b = Rect::new(0, 0, 400, 300);
        let r = resize_bounds(b, ResizeEdge::SouthEast, 10, 90, Some(4.0 / 3.0), limits());
        assert_eq!((r.width, r.height), (520, 390));
    }

    #[test]
    fn initial_size_from_aspect() {
        assert_eq!(initial_size(Some(16.0 / 9.0), 400, limits()), (400, 225));
        // Very wide source: height floored at the minimum.
        assert_eq!(initial_size(Some(4.0), 400, limits()), (600, 150));
        assert_eq!(initial_size(None, 400, limits()), (400, 300));
    }

    #[test]
    fn auto_resize_keeps_width_for_moderate_change() {
        let b = Rect::new(10, 20, 400, 300);
        let r = auto_resize_bounds(b, 16.0 / 9.0, limits());
        assert_eq!(r, Rect::new(10, 20, 400, 225));
    }

    #[test]
    fn auto_resize_keeps_height_for_drastic_change() {
        let b = Rect::new(0, 0, 400, 300);
        // Tall source: keeping width would make the window 800 high.
        let r = auto_resize_bounds(b, 0.5, limits());
        assert_eq!((r.width, r.height), (200, 400));
    }

    #[test]
    fn aspect_change_threshold() {
        assert!(aspect_changed(None, 1.0));
        assert!(!aspect_changed(Some(1.333), 1.34));
        assert!(aspect_changed(Some(1.333), 1.78));
    }
}

//! Captured frame representation.

use std::sync::Arc;

/// Label carried by the placeholder delivered for minimized windows.
pub const MINIMIZED_LABEL: &str = "minimized";

/// Pixel payload of a captured frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePixels {
    /// Every pixel has the same RGBA value.
    Solid([u8; 4]),
    /// Tightly packed RGBA8 rows.
    Rgba(Arc<[u8]>),
}

/// One captured bitmap. Ephemeral: the render tick borrows the latest one
/// and nothing keeps older frames around.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    /// Nanoseconds since the owning session opened.
    pub timestamp_ns: u64,
    pub pixels: FramePixels,
    /// Set on placeholder frames (e.g. a minimized window).
    pub label: Option<String>,
}

impl CaptureFrame {
    /// A single-colour frame.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], timestamp_ns: u64) -> Self {
        Self {
            width,
            height,
            timestamp_ns,
            pixels: FramePixels::Solid(rgba),
            label: None,
        }
    }

    /// A frame from raw RGBA8 bytes. Returns `None` when the buffer length
    /// does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, bytes: Vec<u8>, timestamp_ns: u64) -> Option<Self> {
        if bytes.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            timestamp_ns,
            pixels: FramePixels::Rgba(bytes.into()),
            label: None,
        })
    }

    /// The dark 400x300 card shown instead of a window that cannot be
    /// captured right now.
    pub fn placeholder(label: impl Into<String>, timestamp_ns: u64) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::solid(400, 300, [40, 40, 40, 255], timestamp_ns)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.label.is_some()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_length_is_checked() {
        assert!(CaptureFrame::from_rgba(2, 2, vec![0; 16], 0).is_some());
        assert!(CaptureFrame::from_rgba(2, 2, vec![0; 15], 0).is_none());
    }

    #[test]
    fn placeholder_is_labelled() {
        let frame = CaptureFrame::placeholder(MINIMIZED_LABEL, 5);
        assert!(frame.is_placeholder());
        assert_eq!(frame.size(), (400, 300));
        assert_eq!(frame.label.as_deref(), Some("minimized"));
    }
}

//! Session identity, source addressing, and per-session flags.

use std::fmt;
use std::str::FromStr;

use pipview_common::error::{PipError, PipResult};
use pipview_platform_core::Rect;
use serde::{Deserialize, Serialize};

use crate::viewport::{CropRect, ViewState};

/// Unique, monotonically assigned session identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of captured source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Monitor,
    Window,
    Region,
}

/// Addressable capture source.
///
/// Textual forms: `monitor:<index>`, `window:<handle>`,
/// `window-title:<title>`, `region:<x>,<y>,<w>,<h>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceId {
    Monitor { index: usize },
    Window { handle: u64 },
    WindowTitle { title: String },
    Region(Rect),
}

impl SourceId {
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Monitor { .. } => SourceType::Monitor,
            Self::Window { .. } | Self::WindowTitle { .. } => SourceType::Window,
            Self::Region(_) => SourceType::Region,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor { index } => write!(f, "monitor:{index}"),
            Self::Window { handle } => write!(f, "window:{handle}"),
            Self::WindowTitle { title } => write!(f, "window-title:{title}"),
            Self::Region(r) => write!(f, "region:{},{},{},{}", r.x, r.y, r.width, r.height),
        }
    }
}

impl FromStr for SourceId {
    type Err = PipError;

    fn from_str(s: &str) -> PipResult<Self> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| PipError::invalid_request(format!("malformed source id '{s}'")))?;

        match kind {
            "monitor" => rest
                .parse()
                .map(|index| Self::Monitor { index })
                .map_err(|_| PipError::invalid_request(format!("bad monitor index in '{s}'"))),
            "window" => rest
                .parse()
                .map(|handle| Self::Window { handle })
                .map_err(|_| PipError::invalid_request(format!("bad window handle in '{s}'"))),
            "window-title" if !rest.is_empty() => Ok(Self::WindowTitle {
                title: rest.to_string(),
            }),
            "region" => parse_region(rest)
                .map(Self::Region)
                .ok_or_else(|| PipError::invalid_request(format!("bad region in '{s}'"))),
            _ => Err(PipError::invalid_request(format!(
                "unknown source id '{s}'"
            ))),
        }
    }
}

fn parse_region(rest: &str) -> Option<Rect> {
    let parts: Vec<&str> = rest.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return None;
    };
    let rect = Rect::new(x.parse().ok()?, y.parse().ok()?, w.parse().ok()?, h.parse().ok()?);
    (!rect.is_empty()).then_some(rect)
}

impl TryFrom<String> for SourceId {
    type Error = PipError;

    fn try_from(value: String) -> PipResult<Self> {
        value.parse()
    }
}

impl From<SourceId> for String {
    fn from(value: SourceId) -> Self {
        value.to_string()
    }
}

/// Surface opacity, always within `[0.1, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Opacity(f64);

impl Opacity {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 1.0;
    pub const OPAQUE: Opacity = Opacity(1.0);

    /// Menu presets, most opaque first.
    pub const PRESETS: [f64; 10] = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.2, 0.1];

    /// Clamp any input into range. NaN is treated as fully opaque.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::OPAQUE;
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn adjusted(self, delta: f64) -> Self {
        Self::new(self.0 + delta)
    }

    /// Whole percent, as shown in the on-surface indicator.
    pub fn percent(self) -> u32 {
        (self.0 * 100.0).round() as u32
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self::OPAQUE
    }
}

impl From<f64> for Opacity {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Opacity> for f64 {
    fn from(value: Opacity) -> Self {
        value.0
    }
}

/// User-adjustable behaviour of a session's surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlags {
    pub always_on_top: bool,
    pub maintain_aspect_ratio: bool,
    /// Only meaningful for window sources.
    pub auto_resize_on_source_change: bool,
    pub opacity: Opacity,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            always_on_top: true,
            maintain_aspect_ratio: true,
            auto_resize_on_source_change: true,
            opacity: Opacity::OPAQUE,
        }
    }
}

/// Snapshot of one live session as reported by `list()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub source_id: SourceId,
    pub source_name: String,
    pub source_type: SourceType,
    pub crop: Option<CropRect>,
    pub view: ViewState,
    pub flags: SessionFlags,
    pub known_aspect_ratio: Option<f64>,
    /// Wall-clock open time (RFC 3339).
    pub opened_at: String,
}

/// Roster snapshot pushed to observers after every registry mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub count: usize,
    pub list: Vec<SessionInfo>,
}

impl Roster {
    pub fn new(list: Vec<SessionInfo>) -> Self {
        Self {
            count: list.len(),
            list,
        }
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.list.iter().map(|s| s.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_source_id_forms_parse() {
        assert_eq!(
            "monitor:0".parse::<SourceId>().unwrap(),
            SourceId::Monitor { index: 0 }
        );
        assert_eq!(
            "window:4242".parse::<SourceId>().unwrap(),
            SourceId::Window { handle: 4242 }
        );
        assert_eq!(
            "window-title:Notes: draft".parse::<SourceId>().unwrap(),
            SourceId::WindowTitle {
                title: "Notes: draft".to_string()
            }
        );
        assert_eq!(
            "region:-100, 20, 640, 480".parse::<SourceId>().unwrap(),
            SourceId::Region(Rect::new(-100, 20, 640, 480))
        );
    }

    #[test]
    fn test_malformed_source_ids_are_invalid_requests() {
        for bad in ["", "monitor", "monitor:x", "region:0,0,0,10", "tab:3", "window-title:"] {
            let err = bad.parse::<SourceId>().unwrap_err();
            assert!(matches!(err, PipError::InvalidRequest { .. }), "{bad}");
        }
    }

    #[test]
    fn test_source_id_serializes_as_string() {
        let json = serde_json::to_string(&SourceId::Monitor { index: 2 }).unwrap();
        assert_eq!(json, "\"monitor:2\"");
        let back: SourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.source_type(), SourceType::Monitor);
    }

    #[test]
    fn test_opacity_extremes_clamp() {
        assert_eq!(Opacity::new(-5.0).value(), 0.1);
        assert_eq!(Opacity::new(5.0).value(), 1.0);
        assert_eq!(Opacity::new(f64::NAN).value(), 1.0);
        assert_eq!(Opacity::new(0.8).percent(), 80);
    }

    #[test]
    fn test_opacity_deserialization_clamps() {
        let flags: SessionFlags = serde_json::from_str(
            r#"{"alwaysOnTop":true,"maintainAspectRatio":false,"autoResizeOnSourceChange":false,"opacity":7}"#,
        )
        .unwrap();
        assert_eq!(flags.opacity.value(), 1.0);
    }

    proptest! {
        #[test]
        fn opacity_always_in_range(v in -1e6f64..1e6) {
            let o = Opacity::new(v).value();
            prop_assert!((Opacity::MIN..=Opacity::MAX).contains(&o));
        }

        #[test]
        fn opacity_is_monotone(a in -2.0f64..2.0, b in -2.0f64..2.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(Opacity::new(lo).value() <= Opacity::new(hi).value());
        }
    }
}

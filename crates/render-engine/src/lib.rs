//! pipview Render Engine
//!
//! Turns the latest captured frame of a session into an on-screen image
//! and owns the per-session surface loop.
//!
//! # Pipeline Architecture
//!
//! ```text
//! provider slot ──┐
//!                 ├── Crop (fitted to frame)
//! crop / view ────┘         │
//!                           ├── Cover-fit scale
//! window size ──────────────┘         │
//!                                     ├── Zoom around centre + pan
//!                                     │
//!                                     ▼
//!                               RenderPlan ──► HostWindow::present
//! ```

pub mod overlay;
pub mod resize;
pub mod surface;
pub mod task;
pub mod transform;

pub use overlay::{OverlayChange, OverlayState};
pub use surface::{SurfaceSnapshot, SurfaceState};
pub use task::*;
pub use transform::{compute_transform, FrameTransform};

//! pipview Capture Engine
//!
//! Turns a source id into a live, most-recent-frame stream. The engine
//! consumes a platform capture backend through the [`CaptureBackend`]
//! capability trait and hides the differences between monitor, region,
//! and window capture behind one provider handle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             Capture Source Provider           │
//! │  ┌──────────┐ ┌──────────┐ ┌───────────────┐ │
//! │  │ Monitor  │ │ Region   │ │ Window        │ │
//! │  │          │ │          │ │ direct | bbox │ │
//! │  └─────┬────┘ └─────┬────┘ └──────┬────────┘ │
//! │        └────────────┼─────────────┘          │
//! │                     ▼                        │
//! │      watch slot (latest frame only)          │
//! │      event channel (resize, lost)            │
//! └──────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod provider;
pub mod tracking;

pub use backend::{select_backend, BackendCapabilities, CaptureBackend, SyntheticBackend, WindowGrab};
pub use provider::*;
pub use tracking::{WindowStrategy, WindowTracker};

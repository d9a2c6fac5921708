//! pipview Control Plane
//!
//! Owns the lifecycle of many concurrent capture+display sessions and
//! exposes it to callers:
//! - **Registry:** the one task allowed to create, close, and list sessions
//! - **Channel:** cloneable request/push handle onto the registry
//! - **Ingress:** loopback TCP listener mapping one JSON request to one open
//!
//! ```text
//! picker UI ──┐                       ┌── session 1: provider ─► surface
//!             ├─► ControlChannel ─► Registry ── session 2: provider ─► surface
//! ingress ────┘        ▲               └── ...
//!                      └──── roster / pushes
//! ```

pub mod channel;
mod host;
pub mod ingress;
pub mod registry;

pub use channel::{ControlChannel, SurfaceLink};
pub use ingress::{handle_request, send_request, IngressServer};
pub use registry::{RegistryConfig, SessionRegistry};

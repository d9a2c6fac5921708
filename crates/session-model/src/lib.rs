//! pipview Session Model
//!
//! Defines the core data contracts shared by the engine and its callers:
//! - **Session:** ids, source identifiers, flags, and roster snapshots
//! - **Viewport:** crop rectangles and the zoom/pan view state
//! - **Message:** the Control Channel request/response/push schema
//! - **Ingress:** the one-shot JSON wire format of the local listener
//!
//! Crop rectangles are expressed in source-frame pixels; pan offsets in
//! output-space logical pixels.

pub mod ingress;
pub mod message;
pub mod session;
pub mod viewport;

pub use ingress::*;
pub use message::*;
pub use session::*;
pub use viewport::*;

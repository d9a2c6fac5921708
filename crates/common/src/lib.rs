//! pipview Common Utilities
//!
//! Shared infrastructure for all pipview crates:
//! - Error taxonomy and result aliases
//! - Clock and tick-rate utilities for capture and render loops
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;

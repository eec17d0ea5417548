//! # Hollowfall Common
//!
//! Common types and shared abstractions for Hollowfall.
//!
//! This crate provides foundational types used across all Hollowfall
//! subsystems:
//! - ID types (`EntityId`)
//! - Flat-plane math helpers for ground movement and facing
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ids;
pub mod math;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::math::*;
}

pub use prelude::*;

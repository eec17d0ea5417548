//! # Hollowfall AI
//!
//! Real-time behavior control for hostile creatures.
//!
//! This crate provides the headless gameplay layer for mobs and bosses:
//! - Per-entity behavior state machine (patrol, chase, tiered attacks,
//!   flee, stun, death)
//! - Health and mana pools with clamped mutation and one-shot death
//!   notification
//! - Distance-based perception over a tracked target
//! - Navigation actuator interface with a straight-line test agent
//! - Melee hit volume with per-arming-window strike sets
//! - Projectiles for casters
//! - Sound cue scheduling (idle vocalizations, one-shot agro and death)
//! - Event bus for observer notifications
//!
//! Everything is engine-agnostic: a host binds the [`nav::NavAgent`] and
//! [`animation::AnimationSink`] traits to its scene, feeds ticks, and
//! reacts to drained [`events::CreatureEvent`]s.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod animation;
pub mod brain;
pub mod creature;
pub mod error;
pub mod events;
pub mod hitbox;
pub mod nav;
pub mod perception;
pub mod projectile;
pub mod resource;
pub mod sound;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::animation::*;
    pub use crate::brain::*;
    pub use crate::creature::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::hitbox::*;
    pub use crate::nav::*;
    pub use crate::perception::*;
    pub use crate::projectile::*;
    pub use crate::resource::*;
    pub use crate::sound::*;
}

pub use prelude::*;

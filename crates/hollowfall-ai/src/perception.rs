//! Distance-based perception over a single tracked target.
//!
//! Perception here is deliberately simple: flat distance checks against the
//! one target the arena exposes. There is no field of view and no memory
//! beyond the sticky provocation flag the brain keeps.

use glam::Vec3;

use hollowfall_common::{flat_distance, EntityId};

/// Snapshot of the tracked target for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    /// Target entity id
    pub entity: EntityId,
    /// Target position this tick
    pub position: Vec3,
    /// Whether the target is still alive
    pub alive: bool,
}

impl TargetView {
    /// Creates a target snapshot.
    #[must_use]
    pub const fn new(entity: EntityId, position: Vec3, alive: bool) -> Self {
        Self {
            entity,
            position,
            alive,
        }
    }
}

/// Source of the current target, consumed by brains each tick.
///
/// Returning `None` forces and holds Patrol/Idle.
pub trait TargetProvider {
    /// The current target, if any.
    fn target(&self) -> Option<TargetView>;
}

impl TargetProvider for Option<TargetView> {
    fn target(&self) -> Option<TargetView> {
        *self
    }
}

/// Whether `target` is within `radius` of `position` on the flat plane.
#[must_use]
pub fn within(position: Vec3, target: Vec3, radius: f32) -> bool {
    flat_distance(position, target) <= radius
}

//! Ranged projectiles.
//!
//! Straight-flying bolts with a time to live. A projectile damages the
//! first target-team entity it overlaps and despawns; otherwise it expires
//! quietly when its ttl runs out.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use hollowfall_common::{flat_segment_distance, EntityId};

use crate::hitbox::{CombatTargets, Team};

/// An active projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Entity that spawned it
    pub source: EntityId,
    /// Current position
    pub position: Vec3,
    /// Velocity, units per second
    pub velocity: Vec3,
    /// Damage on hit
    pub damage: f32,
    /// Seconds of flight remaining
    pub ttl: f32,
    /// Hit radius
    pub radius: f32,
    /// Teams this projectile damages
    pub target_teams: Vec<Team>,
}

impl Projectile {
    /// Creates a projectile.
    #[must_use]
    pub fn new(
        source: EntityId,
        position: Vec3,
        velocity: Vec3,
        damage: f32,
        target_teams: Vec<Team>,
    ) -> Self {
        Self {
            source,
            position,
            velocity,
            damage,
            ttl: 3.0,
            radius: 0.3,
            target_teams,
        }
    }

    /// Sets the time to live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: f32) -> Self {
        self.ttl = ttl.max(0.0);
        self
    }

    /// Advances flight by `dt` seconds, returning the position the
    /// projectile moved from so hit tests can sweep the whole step.
    pub fn tick(&mut self, dt: f32) -> Vec3 {
        let from = self.position;
        self.position += self.velocity * dt;
        self.ttl -= dt;
        from
    }

    /// Whether `point` came within the hit radius of the path travelled
    /// between `from` and the current position. A fast bolt covers more
    /// than its radius per tick, so overlap must be tested against the
    /// swept segment rather than the endpoint alone.
    #[must_use]
    pub fn swept_within(&self, from: Vec3, point: Vec3) -> bool {
        flat_segment_distance(point, from, self.position) <= self.radius
    }

    /// Whether the projectile is still in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.ttl > 0.0
    }

    /// Tests this tick's overlaps; damages the first valid target and
    /// returns it. A hit consumes the projectile (ttl forced to zero).
    pub fn try_hit<T: CombatTargets>(
        &mut self,
        overlaps: &[EntityId],
        targets: &mut T,
    ) -> Option<EntityId> {
        if !self.is_active() {
            return None;
        }
        for &entity in overlaps {
            if entity == self.source {
                continue;
            }
            let Some(team) = targets.team(entity) else {
                continue;
            };
            if !self.target_teams.contains(&team) {
                continue;
            }
            targets.deal_damage(entity, self.damage);
            self.ttl = 0.0;
            return Some(entity);
        }
        None
    }
}

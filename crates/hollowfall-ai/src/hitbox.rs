//! Time-windowed melee hit volume.
//!
//! The volume is armed at attack start and disarmed at attack end. While
//! armed, each overlapping entity on a target team is struck at most once
//! per arming window, regardless of how long the overlap lasts. Arming
//! clears the per-window hit record; callers must always arm at attack
//! start and disarm at attack end.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use hollowfall_common::EntityId;

use crate::error::{SpawnError, SpawnResult};

/// Collision team, the layer equivalent for in-process hit filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    /// The player-controlled entity
    Player,
    /// Hostile mobs and bosses
    Mobs,
    /// Entities nothing targets
    Neutral,
}

/// Cross-entity combat seam.
///
/// This is the only point where one entity's tick reaches into another
/// entity's state. Implementations route damage into the target's health
/// pool and invoke its provocation callback; they must be callable mid-tick
/// of the attacker and must not re-enter the target's own tick.
pub trait CombatTargets {
    /// Team of `entity`, or `None` when unknown.
    fn team(&self, entity: EntityId) -> Option<Team>;
    /// Applies damage to `entity`, routing provocation as appropriate.
    fn deal_damage(&mut self, entity: EntityId, amount: f32);
}

/// One successful strike in an arming window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Entity that was struck
    pub target: EntityId,
    /// Damage applied
    pub damage: f32,
}

/// A melee hit probe with a per-window struck set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitVolume {
    /// Whether the probe is currently active
    armed: bool,
    /// Damage applied per strike in the current window
    damage: f32,
    /// Teams this volume can strike
    target_teams: Vec<Team>,
    /// Entities already struck in the current window
    struck: HashSet<EntityId>,
}

impl HitVolume {
    /// Creates a disarmed hit volume striking the given teams.
    pub fn new(target_teams: Vec<Team>) -> SpawnResult<Self> {
        if target_teams.is_empty() {
            return Err(SpawnError::EmptyTargetFilter);
        }
        Ok(Self {
            armed: false,
            damage: 0.0,
            target_teams,
            struck: HashSet::new(),
        })
    }

    /// Whether the probe is active.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arms the probe for a new window with the active tier's damage.
    /// Clears the struck set.
    pub fn arm(&mut self, damage: f32) {
        self.struck.clear();
        self.damage = damage.max(0.0);
        self.armed = true;
    }

    /// Disarms the probe. The struck set is kept until the next arm so a
    /// late overlap report cannot double-strike.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Processes this tick's overlaps. Each not-yet-struck entity on a
    /// target team takes damage once and is recorded.
    pub fn process_overlaps<T: CombatTargets>(
        &mut self,
        overlaps: &[EntityId],
        targets: &mut T,
    ) -> Vec<HitRecord> {
        let mut hits = Vec::new();
        if !self.armed {
            return hits;
        }
        for &entity in overlaps {
            if self.struck.contains(&entity) {
                continue;
            }
            let Some(team) = targets.team(entity) else {
                continue;
            };
            if !self.target_teams.contains(&team) {
                continue;
            }
            targets.deal_damage(entity, self.damage);
            self.struck.insert(entity);
            hits.push(HitRecord {
                target: entity,
                damage: self.damage,
            });
        }
        hits
    }
}

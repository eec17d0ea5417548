//! Health and mana pools.
//!
//! This module provides:
//! - `HealthPool`: clamped current/max health with one-shot death detection
//! - `ManaPool`: clamped mana with gated regeneration
//!
//! Every mutation goes through a single clamped setter. Net changes publish
//! a change event; crossing to zero health publishes exactly one death
//! event, and all further damage is absorbed silently.

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use hollowfall_common::EntityId;

use crate::error::{SpawnError, SpawnResult};
use crate::events::CreatureEvent;

/// Health container for a single entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPool {
    /// Entity this pool belongs to
    owner: EntityId,
    /// Current health, always in [0, max]
    current: f32,
    /// Maximum health, fixed at creation
    max: f32,
    /// Whether the death notification already fired
    dead: bool,
    /// Observer channel for change/death events
    #[serde(skip)]
    events: Option<Sender<CreatureEvent>>,
}

impl HealthPool {
    /// Creates a health pool at full health.
    ///
    /// A non-positive or non-finite `max` is a configuration error.
    pub fn new(owner: EntityId, max: f32) -> SpawnResult<Self> {
        if !(max.is_finite() && max > 0.0) {
            return Err(SpawnError::InvalidMaxHealth(max));
        }
        Ok(Self {
            owner,
            current: max,
            max,
            dead: false,
            events: None,
        })
    }

    /// Attaches an observer channel. Subsequent mutations publish events.
    #[must_use]
    pub fn with_events(mut self, sender: Sender<CreatureEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Current health.
    #[must_use]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Maximum health.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Health as a ratio in [0, 1].
    #[must_use]
    pub fn ratio(&self) -> f32 {
        (self.current / self.max).clamp(0.0, 1.0)
    }

    /// Whether the entity is dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Applies damage. No-op when already dead.
    ///
    /// Negative amounts are ignored; healing goes through [`Self::heal`].
    pub fn apply_damage(&mut self, amount: f32) {
        if self.dead || !(amount.is_finite() && amount > 0.0) {
            return;
        }
        self.set_clamped(self.current - amount);
    }

    /// Heals. No-op when dead.
    pub fn heal(&mut self, amount: f32) {
        if self.dead || !(amount.is_finite() && amount > 0.0) {
            return;
        }
        self.set_clamped(self.current + amount);
    }

    /// Sets health directly; used by load/restore paths.
    ///
    /// Goes through the same clamped path and may trigger death when
    /// `value <= 0`. Ignored once dead.
    pub fn set_value(&mut self, value: f32) {
        if self.dead || !value.is_finite() {
            return;
        }
        self.set_clamped(value);
    }

    /// The single mutation path: clamp, notify on net change, fire death
    /// exactly once on crossing to zero.
    fn set_clamped(&mut self, value: f32) {
        let clamped = value.clamp(0.0, self.max);
        if (clamped - self.current).abs() < f32::EPSILON {
            return;
        }
        self.current = clamped;
        self.publish(CreatureEvent::HealthChanged {
            entity: self.owner,
            current: self.current,
            max: self.max,
        });
        if self.current <= 0.0 && !self.dead {
            self.dead = true;
            self.publish(CreatureEvent::Died { entity: self.owner });
        }
    }

    fn publish(&self, event: CreatureEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.try_send(event);
        }
    }
}

/// Mana container with gated regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManaPool {
    /// Entity this pool belongs to
    owner: EntityId,
    /// Current mana, always in [0, max]
    current: f32,
    /// Maximum mana
    max: f32,
    /// Regeneration per second while enabled
    regen_rate: f32,
    /// Whether regeneration is currently enabled
    pub can_regen: bool,
    /// Observer channel for change events
    #[serde(skip)]
    events: Option<Sender<CreatureEvent>>,
}

impl ManaPool {
    /// Creates a mana pool at full mana.
    pub fn new(owner: EntityId, max: f32, regen_rate: f32) -> SpawnResult<Self> {
        if !(max.is_finite() && max > 0.0) {
            return Err(SpawnError::InvalidMaxMana(max));
        }
        Ok(Self {
            owner,
            current: max,
            max,
            regen_rate: regen_rate.max(0.0),
            can_regen: true,
            events: None,
        })
    }

    /// Attaches an observer channel.
    #[must_use]
    pub fn with_events(mut self, sender: Sender<CreatureEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Current mana.
    #[must_use]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Maximum mana.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Spends mana. Refuses (returns false) when there is not enough,
    /// rather than clamping a partial spend.
    pub fn reduce(&mut self, amount: f32) -> bool {
        if !(amount.is_finite() && amount >= 0.0) || self.current < amount {
            return false;
        }
        self.set_clamped(self.current - amount);
        true
    }

    /// Regenerates mana over `dt` seconds when enabled.
    pub fn regen(&mut self, dt: f32) {
        if self.can_regen && self.regen_rate > 0.0 {
            self.set_clamped(self.current + self.regen_rate * dt);
        }
    }

    fn set_clamped(&mut self, value: f32) {
        let clamped = value.clamp(0.0, self.max);
        // Quiet no-op for approximately equal values so regen ticks at
        // full mana do not spam observers.
        if (clamped - self.current).abs() < 1e-5 {
            return;
        }
        self.current = clamped;
        if let Some(sender) = &self.events {
            let _ = sender.try_send(CreatureEvent::ManaChanged {
                entity: self.owner,
                current: self.current,
                max: self.max,
            });
        }
    }
}

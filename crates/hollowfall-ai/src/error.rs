//! Error types for creature construction and operation.

use hollowfall_common::EntityId;
use thiserror::Error;

/// Errors surfaced when assembling a creature.
///
/// All of these are configuration errors: they are reported once at
/// construction and never at runtime. A creature that fails to spawn is
/// simply not added to the arena; the simulation keeps running.
#[derive(Debug, Clone, Error)]
pub enum SpawnError {
    /// Maximum health must be positive and finite.
    #[error("invalid max health: {0}")]
    InvalidMaxHealth(f32),
    /// Maximum mana must be positive and finite.
    #[error("invalid max mana: {0}")]
    InvalidMaxMana(f32),
    /// A cooldown or duration must be positive.
    #[error("invalid duration for {field}: {value}")]
    InvalidDuration {
        /// Config field name
        field: &'static str,
        /// Offending value
        value: f32,
    },
    /// A probability must be within [0, 1].
    #[error("invalid probability for {field}: {value}")]
    InvalidProbability {
        /// Config field name
        field: &'static str,
        /// Offending value
        value: f32,
    },
    /// A hit volume was configured with no target teams.
    #[error("hit volume has no target teams")]
    EmptyTargetFilter,
    /// Entity already registered in the arena.
    #[error("entity already spawned: {0:?}")]
    AlreadySpawned(EntityId),
}

/// Result type for spawn operations.
pub type SpawnResult<T> = Result<T, SpawnError>;

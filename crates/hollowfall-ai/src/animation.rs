//! Animation notifier interface.
//!
//! Fire-and-forget parameter pushes to an external animation system. The
//! brain never waits on these; completion comes back through the explicit
//! `on_attack_animation_complete` call on the brain.

use serde::{Deserialize, Serialize};

/// Animation parameter sink consumed by the behavior state machine.
pub trait AnimationSink {
    /// Sets a boolean parameter.
    fn set_bool(&mut self, name: &str, value: bool);
    /// Fires a trigger parameter.
    fn set_trigger(&mut self, name: &str);
    /// Sets a float parameter.
    fn set_float(&mut self, name: &str, value: f32);
}

/// Animator parameter names, configurable per creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimatorNames {
    /// Bool: whether the creature is walking
    pub is_walking: String,
    /// Bool: whether the creature is fleeing
    pub is_fleeing: String,
    /// Trigger: attack swing
    pub attack: String,
    /// Trigger: strong attack swing
    pub strong_attack: String,
    /// Trigger: stun reaction
    pub stun: String,
    /// Trigger: death
    pub death: String,
    /// Float: movement speed
    pub speed: String,
}

impl Default for AnimatorNames {
    fn default() -> Self {
        Self {
            is_walking: "IsWalking".to_string(),
            is_fleeing: "IsFleeing".to_string(),
            attack: "Attack".to_string(),
            strong_attack: "StrongAttack".to_string(),
            stun: "Stun".to_string(),
            death: "Death".to_string(),
            speed: "Speed".to_string(),
        }
    }
}

/// Sink that discards everything. Used by creatures without a rig.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnimator;

impl AnimationSink for NullAnimator {
    fn set_bool(&mut self, _name: &str, _value: bool) {}
    fn set_trigger(&mut self, _name: &str) {}
    fn set_float(&mut self, _name: &str, _value: f32) {}
}

/// A recorded animator call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimatorCall {
    /// `set_bool` call
    Bool(String, bool),
    /// `set_trigger` call
    Trigger(String),
    /// `set_float` call
    Float(String, f32),
}

/// Sink that records every call, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnimator {
    /// All calls in order
    pub calls: Vec<AnimatorCall>,
}

impl RecordingAnimator {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `name` was triggered.
    #[must_use]
    pub fn trigger_count(&self, name: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AnimatorCall::Trigger(n) if n == name))
            .count()
    }

    /// Last recorded value for bool parameter `name`.
    #[must_use]
    pub fn last_bool(&self, name: &str) -> Option<bool> {
        self.calls.iter().rev().find_map(|c| match c {
            AnimatorCall::Bool(n, v) if n == name => Some(*v),
            _ => None,
        })
    }
}

impl AnimationSink for RecordingAnimator {
    fn set_bool(&mut self, name: &str, value: bool) {
        self.calls.push(AnimatorCall::Bool(name.to_string(), value));
    }

    fn set_trigger(&mut self, name: &str) {
        self.calls.push(AnimatorCall::Trigger(name.to_string()));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.calls.push(AnimatorCall::Float(name.to_string(), value));
    }
}

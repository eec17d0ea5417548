//! Navigation actuator interface.
//!
//! The brain never computes paths. It issues destinations and speeds to a
//! [`NavAgent`] and reads back arrival and velocity for animation driving.
//! A real game backs this with a navigation-mesh agent; [`LineNav`] is the
//! in-crate implementation used by tests and headless simulations.

use glam::Vec3;

use hollowfall_common::{flat_direction, flat_distance};

/// Movement actuator contract consumed by the behavior state machine.
pub trait NavAgent {
    /// Sets the movement speed.
    fn set_speed(&mut self, speed: f32);
    /// Requests movement to `point`. Returns false when the destination is
    /// unreachable or the agent is not ready; the caller skips and retries.
    fn set_destination(&mut self, point: Vec3) -> bool;
    /// Halts movement, keeping the current path.
    fn stop(&mut self);
    /// Clears the current path.
    fn reset_path(&mut self);
    /// Whether the agent has reached its destination (or has none).
    fn is_arrived(&self) -> bool;
    /// Current velocity, for animation parameters.
    fn current_velocity(&self) -> Vec3;
    /// Whether the agent is on a traversable surface and able to move.
    fn is_ready(&self) -> bool;
    /// Current agent position.
    fn position(&self) -> Vec3;
    /// Permanently disables the agent. Used once, on death.
    fn disable(&mut self);
}

/// Straight-line navigation agent.
///
/// Integrates directly toward the destination at the set speed with no
/// obstacle awareness. Destinations listed as unreachable are refused, to
/// exercise the fallback paths real navigation meshes produce.
#[derive(Debug, Clone)]
pub struct LineNav {
    position: Vec3,
    destination: Option<Vec3>,
    speed: f32,
    velocity: Vec3,
    stopped: bool,
    ready: bool,
    disabled: bool,
    arrival_threshold: f32,
    unreachable: Vec<Vec3>,
}

impl LineNav {
    /// Creates an agent at `position`.
    #[must_use]
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            destination: None,
            speed: 3.5,
            velocity: Vec3::ZERO,
            stopped: false,
            ready: true,
            disabled: false,
            arrival_threshold: 0.2,
            unreachable: Vec::new(),
        }
    }

    /// Sets the arrival threshold.
    #[must_use]
    pub fn with_arrival_threshold(mut self, threshold: f32) -> Self {
        self.arrival_threshold = threshold.max(1e-3);
        self
    }

    /// Marks the agent as off-mesh; destination requests will be refused
    /// until readiness is restored.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Marks a point as unreachable for this agent.
    pub fn add_unreachable(&mut self, point: Vec3) {
        self.unreachable.push(point);
    }

    /// Current destination, if any.
    #[must_use]
    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    /// Advances the agent by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.velocity = Vec3::ZERO;
        if self.disabled || self.stopped || !self.ready {
            return;
        }
        let Some(dest) = self.destination else {
            return;
        };
        let remaining = flat_distance(self.position, dest);
        if remaining <= self.arrival_threshold {
            return;
        }
        let dir = flat_direction(self.position, dest);
        let step = (self.speed * dt).min(remaining);
        self.position += dir * step;
        if dt > 0.0 {
            self.velocity = dir * (step / dt);
        }
    }
}

impl NavAgent for LineNav {
    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn set_destination(&mut self, point: Vec3) -> bool {
        if self.disabled || !self.ready {
            return false;
        }
        let blocked = self
            .unreachable
            .iter()
            .any(|p| flat_distance(*p, point) < 1e-3);
        if blocked {
            return false;
        }
        self.destination = Some(point);
        self.stopped = false;
        true
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.velocity = Vec3::ZERO;
    }

    fn reset_path(&mut self) {
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }

    fn is_arrived(&self) -> bool {
        match self.destination {
            Some(dest) => flat_distance(self.position, dest) <= self.arrival_threshold,
            None => true,
        }
    }

    fn current_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn is_ready(&self) -> bool {
        self.ready && !self.disabled
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn disable(&mut self) {
        self.disabled = true;
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }
}

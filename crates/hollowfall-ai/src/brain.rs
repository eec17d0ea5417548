//! The behavior state machine.
//!
//! One canonical, configuration-parameterized machine replaces the
//! per-archetype controller copies this codebase used to carry. A brain
//! holds the current state, its timers, and the sticky provocation flag; it
//! reads the owner's health pool and the tracked target, and drives the
//! navigation agent, the animation sink, the sound cue scheduler, and the
//! melee hit volume.
//!
//! Fixed per-tick order: death check, stun check, mode decision, per-state
//! action handler, animator parameter sync. State is a logical concept
//! independent of actuator readiness — when the navigation agent is not on
//! a traversable surface, transitions still happen and movement commands
//! are skipped with a diagnostic and retried next tick.

use crossbeam_channel::Sender;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hollowfall_common::{flat_direction, flat_distance, rotate_towards, yaw_to, EntityId};

use crate::animation::{AnimationSink, AnimatorNames};
use crate::error::{SpawnError, SpawnResult};
use crate::events::CreatureEvent;
use crate::hitbox::HitVolume;
use crate::nav::NavAgent;
use crate::perception::TargetView;
use crate::resource::HealthPool;
use crate::sound::CueScheduler;

/// Melee attack tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackTier {
    /// Regular swing
    Normal,
    /// Slow, heavy swing
    Strong,
}

/// Behavior states. Exactly one is active; `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiState {
    /// Following the patrol route, or standing still without one
    Patrol,
    /// Pursuing the target
    Chase,
    /// Swinging at the target
    Attack(AttackTier),
    /// Disengaging to a point away from the target
    Flee,
    /// Stunned until the timer expires
    Stunned,
    /// Terminal; actuators torn down
    Dead,
}

impl AiState {
    /// Debug name for events and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Patrol => "patrol",
            Self::Chase => "chase",
            Self::Attack(AttackTier::Normal) => "attack",
            Self::Attack(AttackTier::Strong) => "strong_attack",
            Self::Flee => "flee",
            Self::Stunned => "stunned",
            Self::Dead => "dead",
        }
    }
}

/// How a brain acquires aggression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggroMode {
    /// Provoked and within the agro radius; pursuit lapses when the target
    /// leaves the radius unless `sticky_aggro` is set.
    Proximity,
    /// The provocation flag alone; never lapses.
    Provoked,
}

/// Overall behavior policy, injected at spawn and switchable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorPolicy {
    /// Fight until dead.
    Aggressive,
    /// Fight, but disengage below the flee health threshold.
    Peaceful,
}

/// Configuration for a behavior brain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainConfig {
    /// Movement speed while patrolling
    pub patrol_speed: f32,
    /// Movement speed while chasing
    pub chase_speed: f32,
    /// Movement speed while fleeing
    pub flee_speed: f32,
    /// Radius within which a proximity brain pursues
    pub agro_radius: f32,
    /// Stopping distance; at or inside it the brain attacks
    pub attack_range: f32,
    /// Damage and cooldown of the normal attack
    pub normal_damage: f32,
    /// Seconds between normal attacks
    pub normal_cooldown: f32,
    /// Damage of the strong attack
    pub strong_damage: f32,
    /// Seconds between strong attacks
    pub strong_cooldown: f32,
    /// Probability of picking strong when both tiers are ready; zero
    /// disables the strong tier
    pub strong_chance: f32,
    /// Seconds a stun lasts
    pub stun_duration: f32,
    /// Health ratio at or below which a peaceful brain flees
    pub flee_threshold: f32,
    /// How far a flee destination is placed
    pub flee_distance: f32,
    /// Hysteresis band above the flee threshold before flee may re-trigger
    pub flee_recover_margin: f32,
    /// Distance at which a waypoint counts as reached
    pub waypoint_threshold: f32,
    /// Fallback timeout for the attack-complete signal; `None` trusts the
    /// external signal unconditionally
    pub attack_timeout: Option<f32>,
    /// Turn rate toward the target while attacking, radians per second
    pub turn_rate: f32,
    /// Seconds after death before the creature may despawn
    pub despawn_delay: f32,
    /// Aggression acquisition mode
    pub aggro_mode: AggroMode,
    /// Whether proximity aggression persists after the target leaves the
    /// agro radius
    pub sticky_aggro: bool,
    /// Behavior policy
    pub policy: BehaviorPolicy,
    /// Animator parameter names
    pub animator: AnimatorNames,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            patrol_speed: 2.0,
            chase_speed: 3.5,
            flee_speed: 5.0,
            agro_radius: 10.0,
            attack_range: 2.0,
            normal_damage: 10.0,
            normal_cooldown: 1.0,
            strong_damage: 25.0,
            strong_cooldown: 4.0,
            strong_chance: 0.0,
            stun_duration: 1.5,
            flee_threshold: 0.3,
            flee_distance: 15.0,
            flee_recover_margin: 0.1,
            waypoint_threshold: 1.0,
            attack_timeout: Some(2.0),
            turn_rate: std::f32::consts::TAU,
            despawn_delay: 5.0,
            aggro_mode: AggroMode::Proximity,
            sticky_aggro: false,
            policy: BehaviorPolicy::Aggressive,
            animator: AnimatorNames::default(),
        }
    }
}

impl BrainConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the agro radius.
    #[must_use]
    pub fn with_agro_radius(mut self, radius: f32) -> Self {
        self.agro_radius = radius;
        self
    }

    /// Sets the attack range.
    #[must_use]
    pub fn with_attack_range(mut self, range: f32) -> Self {
        self.attack_range = range;
        self
    }

    /// Sets normal attack damage and cooldown.
    #[must_use]
    pub fn with_normal_attack(mut self, damage: f32, cooldown: f32) -> Self {
        self.normal_damage = damage;
        self.normal_cooldown = cooldown;
        self
    }

    /// Enables the strong attack tier.
    #[must_use]
    pub fn with_strong_attack(mut self, damage: f32, cooldown: f32, chance: f32) -> Self {
        self.strong_damage = damage;
        self.strong_cooldown = cooldown;
        self.strong_chance = chance;
        self
    }

    /// Sets the aggression mode.
    #[must_use]
    pub fn with_aggro_mode(mut self, mode: AggroMode) -> Self {
        self.aggro_mode = mode;
        self
    }

    /// Sets sticky aggression.
    #[must_use]
    pub fn with_sticky_aggro(mut self, sticky: bool) -> Self {
        self.sticky_aggro = sticky;
        self
    }

    /// Sets the behavior policy.
    #[must_use]
    pub fn with_policy(mut self, policy: BehaviorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the flee tuning.
    #[must_use]
    pub fn with_flee(mut self, threshold: f32, distance: f32) -> Self {
        self.flee_threshold = threshold;
        self.flee_distance = distance;
        self
    }

    /// Sets the stun duration.
    #[must_use]
    pub fn with_stun_duration(mut self, seconds: f32) -> Self {
        self.stun_duration = seconds;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SpawnResult<()> {
        for (field, value) in [
            ("normal_cooldown", self.normal_cooldown),
            ("strong_cooldown", self.strong_cooldown),
            ("stun_duration", self.stun_duration),
            ("attack_range", self.attack_range),
            ("flee_distance", self.flee_distance),
            ("waypoint_threshold", self.waypoint_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpawnError::InvalidDuration { field, value });
            }
        }
        if let Some(timeout) = self.attack_timeout {
            if !(timeout.is_finite() && timeout > 0.0) {
                return Err(SpawnError::InvalidDuration {
                    field: "attack_timeout",
                    value: timeout,
                });
            }
        }
        for (field, value) in [
            ("strong_chance", self.strong_chance),
            ("flee_threshold", self.flee_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(SpawnError::InvalidProbability { field, value });
            }
        }
        Ok(())
    }
}

/// References to the actuators a brain drives during a call.
///
/// Bundled so the public entry points (`tick`, `take_stun`,
/// `notify_damage`, `on_attack_animation_complete`) share one signature
/// shape; the owning creature assembles this from its own fields.
pub struct Actuators<'a> {
    /// Navigation agent
    pub nav: &'a mut dyn NavAgent,
    /// Animation sink
    pub anim: &'a mut dyn AnimationSink,
    /// Sound cue scheduler
    pub sounds: &'a mut CueScheduler,
    /// Melee hit volume, when the creature has one
    pub hitbox: Option<&'a mut HitVolume>,
}

/// The per-entity behavior state machine.
#[derive(Debug)]
pub struct Brain {
    owner: EntityId,
    config: BrainConfig,
    state: AiState,
    /// Accumulated simulation clock, seconds
    clock: f32,
    /// Facing yaw, radians
    yaw: f32,
    /// Sticky provocation flag; cleared only by reset
    provoked: bool,
    /// Clock time the current stun expires
    stun_until: f32,
    /// Clock times each attack tier comes off cooldown
    normal_ready_at: f32,
    strong_ready_at: f32,
    /// Timeout deadline for the in-progress attack
    attack_deadline: Option<f32>,
    /// Set by the external attack-complete signal
    attack_completed: bool,
    /// Patrol route; empty means stand still
    waypoints: Vec<Vec3>,
    /// Persists across Patrol re-entries
    patrol_index: usize,
    /// Destination that still needs a successful `set_destination`
    pending_destination: Option<Vec3>,
    /// Target snapshot from the most recent tick, for same-call
    /// re-decisions triggered by damage
    last_target: Option<TargetView>,
    /// Flee hysteresis latch; set when flee ends at low health
    flee_latched: bool,
    /// Xorshift state for tier rolls and flee fallback sampling
    rng_state: u64,
    events: Option<Sender<CreatureEvent>>,
}

impl Brain {
    /// Creates a brain in `Patrol` with a validated configuration.
    pub fn new(owner: EntityId, config: BrainConfig) -> SpawnResult<Self> {
        config.validate()?;
        Ok(Self {
            owner,
            config,
            state: AiState::Patrol,
            clock: 0.0,
            yaw: 0.0,
            provoked: false,
            stun_until: 0.0,
            normal_ready_at: 0.0,
            strong_ready_at: 0.0,
            attack_deadline: None,
            attack_completed: false,
            waypoints: Vec::new(),
            patrol_index: 0,
            pending_destination: None,
            last_target: None,
            flee_latched: false,
            rng_state: fastrand::u64(1..),
            events: None,
        })
    }

    /// Sets the patrol route.
    #[must_use]
    pub fn with_waypoints(mut self, waypoints: Vec<Vec3>) -> Self {
        self.waypoints = waypoints;
        self
    }

    /// Reseeds the tier-roll RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed.max(1);
        self
    }

    /// Attaches an observer channel for state-change events.
    #[must_use]
    pub fn with_events(mut self, sender: Sender<CreatureEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AiState {
        self.state
    }

    /// Current facing yaw, radians.
    #[must_use]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Whether the brain has ever taken damage this life.
    #[must_use]
    pub fn is_provoked(&self) -> bool {
        self.provoked
    }

    /// Current patrol waypoint index.
    #[must_use]
    pub fn patrol_index(&self) -> usize {
        self.patrol_index
    }

    /// The brain's configuration.
    #[must_use]
    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    /// Switches the behavior policy at runtime.
    pub fn set_policy(&mut self, policy: BehaviorPolicy) {
        self.config.policy = policy;
    }

    /// One simulation step.
    pub fn tick(
        &mut self,
        dt: f32,
        health: &HealthPool,
        target: Option<TargetView>,
        act: &mut Actuators<'_>,
    ) {
        self.clock += dt;
        self.last_target = target;

        if self.state == AiState::Dead {
            return;
        }

        // 1. Death overrides everything.
        if health.is_dead() {
            self.switch_state(AiState::Dead, act);
            return;
        }

        // 2. Stun gate.
        if self.state == AiState::Stunned {
            if self.clock >= self.stun_until {
                self.switch_state(AiState::Patrol, act);
            }
            // Re-decided next tick either way; no actions while stunned.
            self.sync_animator(act);
            return;
        }

        // 3. Mode decision.
        self.decide(health, target, act);

        // 4. Per-state action handler.
        match self.state {
            AiState::Patrol => self.handle_patrol(act),
            AiState::Chase => self.handle_chase(target, act),
            AiState::Attack(_) => self.handle_attack(dt, target, act),
            AiState::Flee => self.handle_flee(health, target, act),
            AiState::Stunned | AiState::Dead => {}
        }

        // 5. Actuator and animator parameter sync.
        self.sync_animator(act);

        let standing_still = act.nav.current_velocity().length() < 0.1;
        act.sounds.tick_idle(self.clock, standing_still, false);
    }

    /// External stun signal. Refreshes the timer when already stunned,
    /// ignored when dead.
    pub fn take_stun(&mut self, health: &HealthPool, act: &mut Actuators<'_>) {
        if self.state == AiState::Dead || health.is_dead() {
            return;
        }
        self.switch_state(AiState::Stunned, act);
    }

    /// Damage notification from the owning creature's health pool path.
    ///
    /// Sets the sticky provocation flag and forces a re-decision within
    /// the same call, so a one-shot hit produces a visible state change.
    pub fn notify_damage(&mut self, amount: f32, health: &HealthPool, act: &mut Actuators<'_>) {
        if self.state == AiState::Dead {
            return;
        }
        if health.is_dead() {
            self.switch_state(AiState::Dead, act);
            return;
        }
        if !self.provoked {
            self.provoked = true;
            self.publish(CreatureEvent::Provoked {
                entity: self.owner,
                amount,
            });
        }
        if self.state != AiState::Stunned {
            self.decide(health, self.last_target, act);
        }
    }

    /// External attack-complete signal from the animation system.
    ///
    /// Resolves the in-progress attack immediately; arriving late (after
    /// the timeout already resolved it) or in any other state is a no-op.
    pub fn on_attack_animation_complete(&mut self, act: &mut Actuators<'_>) {
        if matches!(self.state, AiState::Attack(_)) {
            self.attack_completed = true;
            self.resolve_attack(act);
        }
    }

    /// Returns the brain to its spawn condition. The only path that clears
    /// the provocation flag.
    pub fn reset(&mut self) {
        self.state = AiState::Patrol;
        self.provoked = false;
        self.stun_until = 0.0;
        self.normal_ready_at = 0.0;
        self.strong_ready_at = 0.0;
        self.attack_deadline = None;
        self.attack_completed = false;
        self.patrol_index = 0;
        self.pending_destination = None;
        self.flee_latched = false;
    }

    // ------------------------------------------------------------------
    // Decision
    // ------------------------------------------------------------------

    fn decide(&mut self, health: &HealthPool, target: Option<TargetView>, act: &mut Actuators<'_>) {
        if matches!(self.state, AiState::Dead | AiState::Stunned) {
            return;
        }

        let ratio = health.ratio();
        if self.flee_latched && ratio > self.config.flee_threshold + self.config.flee_recover_margin
        {
            self.flee_latched = false;
        }

        // Peaceful policy: low health overrides pursuit.
        if self.config.policy == BehaviorPolicy::Peaceful
            && self.state != AiState::Flee
            && !self.flee_latched
            && ratio <= self.config.flee_threshold
            && target.is_some()
        {
            self.switch_state(AiState::Flee, act);
            return;
        }

        // Flee and Attack resolve through their own handlers.
        if matches!(self.state, AiState::Flee | AiState::Attack(_)) {
            return;
        }

        // No target: forced and held in Patrol.
        let Some(target) = target else {
            if self.state != AiState::Patrol {
                act.sounds.reset_agro();
                self.switch_state(AiState::Patrol, act);
            }
            return;
        };

        let dist = flat_distance(act.nav.position(), target.position);
        let aggro = self.provoked
            && target.alive
            && match self.config.aggro_mode {
                AggroMode::Provoked => true,
                AggroMode::Proximity => {
                    dist <= self.config.agro_radius
                        || (self.config.sticky_aggro && self.state == AiState::Chase)
                }
            };

        if aggro {
            act.sounds.play_agro(false);
            if dist <= self.config.attack_range {
                if let Some(tier) = self.select_tier() {
                    self.switch_state(AiState::Attack(tier), act);
                } else if self.state != AiState::Chase {
                    // Neither tier ready: stand at range in Chase.
                    self.switch_state(AiState::Chase, act);
                }
            } else if self.state != AiState::Chase {
                self.switch_state(AiState::Chase, act);
            }
        } else {
            act.sounds.reset_agro();
            if self.state != AiState::Patrol {
                self.switch_state(AiState::Patrol, act);
            }
        }
    }

    /// Picks an attack tier, or `None` when every tier is cooling down.
    fn select_tier(&mut self) -> Option<AttackTier> {
        let normal_ready = self.clock >= self.normal_ready_at;
        let strong_ready = self.config.strong_chance > 0.0 && self.clock >= self.strong_ready_at;
        match (normal_ready, strong_ready) {
            (true, true) => {
                if self.next_random() < self.config.strong_chance {
                    Some(AttackTier::Strong)
                } else {
                    Some(AttackTier::Normal)
                }
            }
            (true, false) => Some(AttackTier::Normal),
            (false, true) => Some(AttackTier::Strong),
            (false, false) => None,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn switch_state(&mut self, new_state: AiState, act: &mut Actuators<'_>) {
        // Re-entry matters for Patrol (destination refresh) and Stunned
        // (timer refresh); every other same-state switch is a no-op.
        if self.state == new_state && !matches!(new_state, AiState::Patrol | AiState::Stunned) {
            return;
        }

        let leaving_attack = matches!(self.state, AiState::Attack(_));
        let changed = self.state != new_state;
        self.state = new_state;

        if changed {
            self.publish(CreatureEvent::StateChanged {
                entity: self.owner,
                state: new_state.name().to_string(),
            });
        }

        if leaving_attack {
            if let Some(hitbox) = act.hitbox.as_deref_mut() {
                hitbox.disarm();
            }
        }

        match new_state {
            AiState::Patrol => {
                act.nav.set_speed(self.config.patrol_speed);
                self.begin_patrol_leg(act);
            }
            AiState::Chase => {
                act.nav.set_speed(self.config.chase_speed);
                self.pending_destination = None;
            }
            AiState::Attack(tier) => {
                act.nav.stop();
                act.nav.reset_path();
                self.begin_attack(tier, act);
            }
            AiState::Flee => {
                act.nav.set_speed(self.config.flee_speed);
                self.initiate_flee(act);
            }
            AiState::Stunned => {
                act.nav.stop();
                act.nav.reset_path();
                self.stun_until = self.clock + self.config.stun_duration;
                act.anim.set_trigger(&self.config.animator.stun);
                act.sounds.play_stun(false);
            }
            AiState::Dead => {
                // The single actuator teardown site.
                if let Some(hitbox) = act.hitbox.as_deref_mut() {
                    hitbox.disarm();
                }
                act.nav.stop();
                act.nav.disable();
                act.anim.set_trigger(&self.config.animator.death);
                act.sounds.play_death();
            }
        }
    }

    fn begin_attack(&mut self, tier: AttackTier, act: &mut Actuators<'_>) {
        let (trigger, damage, cooldown) = match tier {
            AttackTier::Normal => (
                self.config.animator.attack.clone(),
                self.config.normal_damage,
                self.config.normal_cooldown,
            ),
            AttackTier::Strong => (
                self.config.animator.strong_attack.clone(),
                self.config.strong_damage,
                self.config.strong_cooldown,
            ),
        };
        match tier {
            AttackTier::Normal => self.normal_ready_at = self.clock + cooldown,
            AttackTier::Strong => self.strong_ready_at = self.clock + cooldown,
        }
        self.attack_completed = false;
        self.attack_deadline = self.config.attack_timeout.map(|t| self.clock + t);

        act.anim.set_trigger(&trigger);
        act.sounds.play_attack(false);
        if let Some(hitbox) = act.hitbox.as_deref_mut() {
            hitbox.arm(damage);
        }
    }

    fn resolve_attack(&mut self, act: &mut Actuators<'_>) {
        let next = match self.last_target {
            Some(t) if t.alive => AiState::Chase,
            _ => AiState::Patrol,
        };
        self.switch_state(next, act);
    }

    // ------------------------------------------------------------------
    // Per-state handlers
    // ------------------------------------------------------------------

    fn handle_patrol(&mut self, act: &mut Actuators<'_>) {
        if self.waypoints.is_empty() {
            return;
        }
        if !act.nav.is_ready() {
            debug!(entity = self.owner.raw(), "nav agent not ready, patrol move skipped");
            return;
        }

        // Retry a destination that was refused earlier.
        if let Some(dest) = self.pending_destination {
            if act.nav.set_destination(dest) {
                self.pending_destination = None;
            }
            return;
        }

        let wp = self.waypoints[self.patrol_index % self.waypoints.len()];
        if flat_distance(act.nav.position(), wp) < self.config.waypoint_threshold {
            self.patrol_index = (self.patrol_index + 1) % self.waypoints.len();
            let next = self.waypoints[self.patrol_index];
            if !act.nav.set_destination(next) {
                debug!(entity = self.owner.raw(), "waypoint unreachable, retrying next tick");
                self.pending_destination = Some(next);
            }
        } else if act.nav.is_arrived() {
            // No active path toward the current waypoint (fresh spawn, or
            // the path was cleared): restart the leg.
            if !act.nav.set_destination(wp) {
                self.pending_destination = Some(wp);
            }
        }
    }

    /// Patrol (re-)entry always refreshes the destination, supporting
    /// "resume patrol after losing target".
    fn begin_patrol_leg(&mut self, act: &mut Actuators<'_>) {
        self.pending_destination = None;
        if self.waypoints.is_empty() {
            act.nav.reset_path();
            return;
        }
        let wp = self.waypoints[self.patrol_index % self.waypoints.len()];
        if !act.nav.is_ready() || !act.nav.set_destination(wp) {
            debug!(entity = self.owner.raw(), "patrol destination refused, retrying next tick");
            self.pending_destination = Some(wp);
        }
    }

    fn handle_chase(&mut self, target: Option<TargetView>, act: &mut Actuators<'_>) {
        let Some(target) = target else {
            return;
        };
        if !act.nav.is_ready() {
            debug!(entity = self.owner.raw(), "nav agent not ready, chase move skipped");
            return;
        }
        let dist = flat_distance(act.nav.position(), target.position);
        if dist <= self.config.attack_range {
            // At range with no tier ready: stand and wait.
            act.nav.stop();
        } else if !act.nav.set_destination(target.position) {
            debug!(entity = self.owner.raw(), "chase destination refused, retrying next tick");
        }
    }

    fn handle_attack(&mut self, dt: f32, target: Option<TargetView>, act: &mut Actuators<'_>) {
        // Bounded-rate rotation toward the target while the swing plays.
        if let Some(target) = target {
            let desired = yaw_to(act.nav.position(), target.position);
            self.yaw = rotate_towards(self.yaw, desired, self.config.turn_rate * dt);
        }

        let timed_out = self
            .attack_deadline
            .is_some_and(|deadline| self.clock >= deadline);
        if self.attack_completed {
            self.resolve_attack(act);
        } else if timed_out {
            debug!(
                entity = self.owner.raw(),
                "attack-complete signal never arrived, resolving via timeout"
            );
            self.resolve_attack(act);
        }
    }

    fn handle_flee(
        &mut self,
        health: &HealthPool,
        target: Option<TargetView>,
        act: &mut Actuators<'_>,
    ) {
        let Some(target) = target else {
            self.switch_state(AiState::Patrol, act);
            return;
        };
        if !act.nav.is_ready() {
            debug!(entity = self.owner.raw(), "nav agent not ready, flee move skipped");
            return;
        }
        if !act.nav.is_arrived() {
            return;
        }

        let ratio = health.ratio();
        let dist = flat_distance(act.nav.position(), target.position);
        if ratio > self.config.flee_threshold || dist > self.config.flee_distance * 1.5 {
            if ratio <= self.config.flee_threshold {
                // Still hurt; arm the hysteresis latch so flee does not
                // re-trigger until health recovers past the band.
                self.flee_latched = true;
            }
            self.switch_state(AiState::Patrol, act);
        } else {
            // Still low and the target is still near: new flee point.
            self.initiate_flee(act);
        }
    }

    fn initiate_flee(&mut self, act: &mut Actuators<'_>) {
        let Some(target) = self.last_target else {
            self.switch_state(AiState::Patrol, act);
            return;
        };
        if !act.nav.is_ready() {
            debug!(entity = self.owner.raw(), "nav agent not ready, flee deferred");
            return;
        }

        let pos = act.nav.position();
        let away = flat_direction(target.position, pos);
        let primary = if away == Vec3::ZERO {
            self.random_nearby(pos)
        } else {
            pos + away * self.config.flee_distance
        };
        if act.nav.set_destination(primary) {
            return;
        }

        let fallback = self.random_nearby(pos);
        if !act.nav.set_destination(fallback) {
            warn!(
                entity = self.owner.raw(),
                "no reachable flee point, falling back to patrol"
            );
            self.switch_state(AiState::Patrol, act);
        }
    }

    fn random_nearby(&mut self, pos: Vec3) -> Vec3 {
        let angle = self.next_random() * std::f32::consts::TAU;
        let dist = (0.25 + 0.75 * self.next_random()) * self.config.flee_distance;
        pos + Vec3::new(angle.cos(), 0.0, angle.sin()) * dist
    }

    // ------------------------------------------------------------------
    // Output sync
    // ------------------------------------------------------------------

    fn sync_animator(&mut self, act: &mut Actuators<'_>) {
        let speed = act.nav.current_velocity().length();
        let moving = speed > 0.1
            && matches!(self.state, AiState::Patrol | AiState::Chase | AiState::Flee);
        act.anim.set_bool(&self.config.animator.is_walking, moving);
        act.anim
            .set_bool(&self.config.animator.is_fleeing, self.state == AiState::Flee);
        act.anim.set_float(&self.config.animator.speed, speed);
    }

    fn next_random(&mut self) -> f32 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 17;
        self.rng_state ^= self.rng_state << 5;
        ((self.rng_state >> 40) as f32) / (1u64 << 24) as f32
    }

    fn publish(&self, event: CreatureEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.try_send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::RecordingAnimator;
    use crate::hitbox::Team;
    use crate::nav::LineNav;

    const DT: f32 = 0.05;

    struct Rig {
        brain: Brain,
        health: HealthPool,
        nav: LineNav,
        anim: RecordingAnimator,
        sounds: CueScheduler,
        hitbox: HitVolume,
    }

    impl Rig {
        fn new(config: BrainConfig) -> Self {
            let owner = EntityId::new();
            Self {
                brain: Brain::new(owner, config).expect("valid config").with_seed(99),
                health: HealthPool::new(owner, 100.0).expect("valid max"),
                nav: LineNav::new(Vec3::ZERO),
                anim: RecordingAnimator::new(),
                sounds: CueScheduler::new(owner, 5.0, 10.0),
                hitbox: HitVolume::new(vec![Team::Player]).expect("non-empty filter"),
            }
        }

        fn with_waypoints(mut self, waypoints: Vec<Vec3>) -> Self {
            self.brain = self.brain.with_waypoints(waypoints);
            self
        }

        fn tick(&mut self, target: Option<TargetView>) {
            let mut act = Actuators {
                nav: &mut self.nav,
                anim: &mut self.anim,
                sounds: &mut self.sounds,
                hitbox: Some(&mut self.hitbox),
            };
            self.brain.tick(DT, &self.health, target, &mut act);
            self.nav.tick(DT);
        }

        fn run(&mut self, seconds: f32, target: Option<TargetView>) {
            let steps = (seconds / DT).ceil() as usize;
            for _ in 0..steps {
                self.tick(target);
            }
        }

        fn damage(&mut self, amount: f32) {
            self.health.apply_damage(amount);
            let mut act = Actuators {
                nav: &mut self.nav,
                anim: &mut self.anim,
                sounds: &mut self.sounds,
                hitbox: Some(&mut self.hitbox),
            };
            self.brain.notify_damage(amount, &self.health, &mut act);
        }

        fn stun(&mut self) {
            let mut act = Actuators {
                nav: &mut self.nav,
                anim: &mut self.anim,
                sounds: &mut self.sounds,
                hitbox: Some(&mut self.hitbox),
            };
            self.brain.take_stun(&self.health, &mut act);
        }

        fn finish_attack(&mut self) {
            let mut act = Actuators {
                nav: &mut self.nav,
                anim: &mut self.anim,
                sounds: &mut self.sounds,
                hitbox: Some(&mut self.hitbox),
            };
            self.brain.on_attack_animation_complete(&mut act);
        }
    }

    fn target_at(x: f32) -> Option<TargetView> {
        Some(TargetView::new(EntityId::from_raw(999), Vec3::new(x, 0.0, 0.0), true))
    }

    #[test]
    fn test_starts_patrolling() {
        let rig = Rig::new(BrainConfig::default());
        assert_eq!(rig.brain.state(), AiState::Patrol);
        assert!(!rig.brain.is_provoked());
    }

    #[test]
    fn test_unprovoked_never_aggros() {
        // Target walks right up; without provocation the state never moves.
        let mut rig = Rig::new(BrainConfig::default());
        for x in [50.0, 20.0, 8.0, 3.0, 1.0] {
            rig.run(0.5, target_at(x));
            assert_eq!(rig.brain.state(), AiState::Patrol);
        }
    }

    #[test]
    fn test_provoked_within_radius_chases() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        // Same-call re-decision: the state change is visible before any
        // further tick runs.
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);
    }

    #[test]
    fn test_provoked_outside_radius_stays_patrolling() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(50.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_proximity_aggro_lapses_outside_radius() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.tick(target_at(50.0));
        assert_eq!(rig.brain.state(), AiState::Patrol);
        // Provocation stays sticky even after pursuit lapses.
        assert!(rig.brain.is_provoked());
    }

    #[test]
    fn test_sticky_aggro_keeps_chasing() {
        let mut rig = Rig::new(BrainConfig::default().with_sticky_aggro(true));
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(50.0));
        assert_eq!(rig.brain.state(), AiState::Chase);
    }

    #[test]
    fn test_provoked_mode_ignores_distance() {
        let mut rig = Rig::new(BrainConfig::default().with_aggro_mode(AggroMode::Provoked));
        rig.tick(target_at(80.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.tick(target_at(200.0));
        assert_eq!(rig.brain.state(), AiState::Chase);
    }

    #[test]
    fn test_chase_to_attack_to_chase() {
        // Scenario C.
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.tick(target_at(1.5));
        assert_eq!(rig.brain.state(), AiState::Attack(AttackTier::Normal));
        assert!(rig.hitbox.is_armed());
        assert_eq!(rig.anim.trigger_count("Attack"), 1);

        rig.finish_attack();
        assert_eq!(rig.brain.state(), AiState::Chase);
        assert!(!rig.hitbox.is_armed());
    }

    #[test]
    fn test_attack_timeout_fallback() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(1.5));
        assert!(matches!(rig.brain.state(), AiState::Attack(_)));

        // Never send the completion signal; the target backs out of range
        // and the timeout resolves the attack into Chase.
        rig.run(2.5, target_at(8.0));
        assert_eq!(rig.brain.state(), AiState::Chase);
    }

    #[test]
    fn test_late_completion_signal_ignored() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(1.5));
        rig.run(2.5, target_at(8.0));
        let state = rig.brain.state();
        rig.finish_attack();
        assert_eq!(rig.brain.state(), state);
    }

    #[test]
    fn test_neither_tier_ready_waits_in_chase() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(1.5));
        rig.finish_attack();

        // Cooldown is 1s; immediately back in range, no tier ready.
        rig.tick(target_at(1.5));
        assert_eq!(rig.brain.state(), AiState::Chase);
        assert!(rig.nav.current_velocity().length() < 0.1);

        // After the cooldown passes the attack comes back.
        rig.run(1.2, target_at(1.5));
        assert!(matches!(rig.brain.state(), AiState::Attack(_)));
    }

    #[test]
    fn test_tier_split_converges_to_strong_chance() {
        let mut brain = Brain::new(
            EntityId::new(),
            BrainConfig::default().with_strong_attack(25.0, 0.1, 0.3),
        )
        .expect("valid config")
        .with_seed(12345);

        // Both tiers always ready: clock far beyond any cooldown.
        brain.clock = 1_000.0;
        let trials = 10_000;
        let mut strong = 0;
        for _ in 0..trials {
            brain.normal_ready_at = 0.0;
            brain.strong_ready_at = 0.0;
            match brain.select_tier() {
                Some(AttackTier::Strong) => strong += 1,
                Some(AttackTier::Normal) => {}
                None => panic!("both tiers ready"),
            }
        }
        let freq = f64::from(strong) / f64::from(trials);
        assert!((freq - 0.3).abs() < 0.05, "strong frequency {freq}");
    }

    #[test]
    fn test_stun_interrupts_and_expires() {
        // Scenario D.
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.stun();
        assert_eq!(rig.brain.state(), AiState::Stunned);
        assert_eq!(rig.anim.trigger_count("Stun"), 1);

        // Default stun lasts 1.5s.
        rig.run(1.0, target_at(8.0));
        assert_eq!(rig.brain.state(), AiState::Stunned);
        rig.run(0.7, target_at(8.0));
        // Expired to Patrol, then re-decided back to Chase.
        rig.tick(target_at(8.0));
        assert_eq!(rig.brain.state(), AiState::Chase);
    }

    #[test]
    fn test_stun_refreshes_timer() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.stun();
        rig.run(1.0, None);
        assert_eq!(rig.brain.state(), AiState::Stunned);

        rig.stun(); // refresh
        rig.run(1.0, None);
        assert_eq!(rig.brain.state(), AiState::Stunned);
        rig.run(0.7, None);
        assert_eq!(rig.brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_stun_interrupts_attack_and_disarms() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(1.5));
        assert!(rig.hitbox.is_armed());

        rig.stun();
        assert_eq!(rig.brain.state(), AiState::Stunned);
        assert!(!rig.hitbox.is_armed());
    }

    #[test]
    fn test_dead_is_terminal() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.health.apply_damage(100.0);
        rig.tick(target_at(8.0));
        assert_eq!(rig.brain.state(), AiState::Dead);
        assert!(!rig.nav.is_ready());
        assert_eq!(rig.anim.trigger_count("Death"), 1);

        // No input leaves Dead.
        rig.stun();
        rig.damage(10.0);
        rig.finish_attack();
        rig.run(5.0, target_at(1.0));
        assert_eq!(rig.brain.state(), AiState::Dead);
        assert_eq!(rig.anim.trigger_count("Death"), 1);
    }

    #[test]
    fn test_patrol_cycles_waypoints() {
        // Scenario B.
        let a = Vec3::new(4.0, 0.0, 0.0);
        let b = Vec3::new(4.0, 0.0, 4.0);
        let c = Vec3::new(0.0, 0.0, 4.0);
        let mut rig = Rig::new(BrainConfig::default()).with_waypoints(vec![a, b, c]);

        let mut visited = Vec::new();
        for _ in 0..2_000 {
            rig.tick(None);
            let idx = rig.brain.patrol_index();
            if visited.last() != Some(&idx) {
                visited.push(idx);
            }
        }
        // Heads to A (index 0), then B, C, and wraps back to A.
        assert!(visited.len() >= 4, "visited {visited:?}");
        assert_eq!(&visited[..4], &[0, 1, 2, 0]);
    }

    #[test]
    fn test_empty_waypoints_stand_still() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.run(2.0, None);
        assert_eq!(rig.brain.state(), AiState::Patrol);
        assert_eq!(rig.nav.position(), Vec3::ZERO);
    }

    #[test]
    fn test_patrol_reentry_refreshes_destination() {
        let a = Vec3::new(10.0, 0.0, 0.0);
        let mut rig = Rig::new(BrainConfig::default()).with_waypoints(vec![a]);
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        // Target leaves: back to Patrol, destination restored to the
        // current waypoint even though the index never changed.
        rig.tick(target_at(50.0));
        assert_eq!(rig.brain.state(), AiState::Patrol);
        assert_eq!(rig.nav.destination(), Some(a));
    }

    #[test]
    fn test_flee_at_low_health_and_recover() {
        // Scenario E.
        let mut rig = Rig::new(
            BrainConfig::default()
                .with_policy(BehaviorPolicy::Peaceful)
                .with_flee(0.3, 15.0),
        );
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.damage(70.0); // ratio 0.25
        assert_eq!(rig.brain.state(), AiState::Flee);
        // Destination is away from the target (target at +x, flee to -x).
        let dest = rig.nav.destination().expect("flee destination set");
        assert!(dest.x < 0.0);

        // Walk to the flee point; target stays far beyond 1.5x flee range.
        rig.run(10.0, target_at(200.0));
        assert_eq!(rig.brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_flee_repicks_when_target_still_near() {
        let mut rig = Rig::new(
            BrainConfig::default()
                .with_policy(BehaviorPolicy::Peaceful)
                .with_flee(0.3, 5.0),
        );
        rig.tick(target_at(3.0));
        rig.damage(80.0);
        assert_eq!(rig.brain.state(), AiState::Flee);

        // Target sticks one unit behind the whole way; every arrival
        // re-picks a fresh flee point instead of giving up.
        for _ in 0..160 {
            let behind = rig.nav.position() + Vec3::new(1.0, 0.0, 0.0);
            rig.tick(Some(TargetView::new(EntityId::from_raw(999), behind, true)));
        }
        assert_eq!(rig.brain.state(), AiState::Flee);
    }

    #[test]
    fn test_flee_hysteresis_blocks_retrigger() {
        let mut rig = Rig::new(
            BrainConfig::default()
                .with_policy(BehaviorPolicy::Peaceful)
                .with_flee(0.3, 15.0),
        );
        rig.tick(target_at(8.0));
        rig.damage(75.0); // ratio 0.25, flees
        assert_eq!(rig.brain.state(), AiState::Flee);

        // Escape: far target, arrive, back to Patrol while still hurt.
        rig.run(10.0, target_at(500.0));
        assert_eq!(rig.brain.state(), AiState::Patrol);

        // Target near again, health unchanged: latch holds Patrol-side
        // behavior (chase resumes, flee does not immediately re-trigger).
        rig.tick(target_at(8.0));
        assert_ne!(rig.brain.state(), AiState::Flee);

        // Heal past the band, drop low again: flee re-arms.
        rig.health.heal(50.0);
        rig.tick(target_at(8.0));
        rig.damage(60.0);
        assert_eq!(rig.brain.state(), AiState::Flee);
    }

    /// Nav agent that refuses every destination while claiming readiness,
    /// the shape a navigation mesh produces around an unroutable island.
    struct RefusingNav;

    impl NavAgent for RefusingNav {
        fn set_speed(&mut self, _speed: f32) {}
        fn set_destination(&mut self, _point: Vec3) -> bool {
            false
        }
        fn stop(&mut self) {}
        fn reset_path(&mut self) {}
        fn is_arrived(&self) -> bool {
            true
        }
        fn current_velocity(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn position(&self) -> Vec3 {
            Vec3::ZERO
        }
        fn disable(&mut self) {}
    }

    #[test]
    fn test_flee_unreachable_falls_back_to_patrol() {
        let owner = EntityId::new();
        let mut brain = Brain::new(
            owner,
            BrainConfig::default()
                .with_policy(BehaviorPolicy::Peaceful)
                .with_flee(0.3, 15.0),
        )
        .expect("valid config")
        .with_seed(7);
        let mut health = HealthPool::new(owner, 100.0).expect("valid max");
        let mut nav = RefusingNav;
        let mut anim = RecordingAnimator::new();
        let mut sounds = CueScheduler::new(owner, 5.0, 10.0);

        let mut act = Actuators {
            nav: &mut nav,
            anim: &mut anim,
            sounds: &mut sounds,
            hitbox: None,
        };
        brain.tick(DT, &health, target_at(8.0), &mut act);
        health.apply_damage(80.0);
        brain.notify_damage(80.0, &health, &mut act);

        // Primary flee point and the random fallback both refused: the
        // brain lands in Patrol instead of spinning in Flee.
        assert_eq!(brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_no_target_holds_patrol() {
        let mut rig = Rig::new(BrainConfig::default().with_aggro_mode(AggroMode::Provoked));
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.tick(None);
        assert_eq!(rig.brain.state(), AiState::Patrol);
        rig.run(3.0, None);
        assert_eq!(rig.brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_attack_rotates_toward_target() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        rig.tick(target_at(1.5));
        assert!(matches!(rig.brain.state(), AiState::Attack(_)));

        let before = rig.brain.yaw();
        // Target due +x, desired yaw is atan2(1,0) = PI/2.
        rig.tick(target_at(1.5));
        let after = rig.brain.yaw();
        assert!((after - before).abs() > 0.0);
        assert!((after - before).abs() <= rig.brain.config().turn_rate * DT + 1e-4);
    }

    #[test]
    fn test_policy_switch_at_runtime() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(75.0);
        // Aggressive: low health does not matter.
        assert_eq!(rig.brain.state(), AiState::Chase);

        rig.brain.set_policy(BehaviorPolicy::Peaceful);
        rig.tick(target_at(8.0));
        assert_eq!(rig.brain.state(), AiState::Flee);
    }

    #[test]
    fn test_reset_clears_provocation() {
        let mut rig = Rig::new(BrainConfig::default());
        rig.tick(target_at(8.0));
        rig.damage(5.0);
        assert!(rig.brain.is_provoked());

        rig.brain.reset();
        assert!(!rig.brain.is_provoked());
        assert_eq!(rig.brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_config_validation() {
        assert!(BrainConfig::default().validate().is_ok());

        let bad = BrainConfig {
            strong_chance: 1.5,
            ..BrainConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SpawnError::InvalidProbability { .. })
        ));

        let bad = BrainConfig {
            normal_cooldown: 0.0,
            ..BrainConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(SpawnError::InvalidDuration { .. })
        ));
    }
}

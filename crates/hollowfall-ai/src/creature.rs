//! Creature assembly and the arena simulation driver.
//!
//! A [`Creature`] wires a brain to its resource pools and actuators. The
//! actuators are injected at construction; a creature is never half-built,
//! and a bad configuration fails the spawn instead of producing an entity
//! that needs null checks on every call.
//!
//! The [`Arena`] owns the live creatures for one scene, routes the tracked
//! player to every brain, resolves melee and projectile strikes through
//! the [`CombatTargets`] seam, and culls corpses once their despawn delay
//! runs out.

use std::collections::HashMap;

use crossbeam_channel::Sender;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use hollowfall_common::EntityId;

use crate::animation::AnimationSink;
use crate::brain::{Actuators, AiState, BehaviorPolicy, Brain, BrainConfig};
use crate::error::{SpawnError, SpawnResult};
use crate::events::{CreatureEvent, EventBus};
use crate::hitbox::{CombatTargets, HitRecord, HitVolume, Team};
use crate::nav::NavAgent;
use crate::perception::{within, TargetProvider, TargetView};
use crate::projectile::Projectile;
use crate::resource::{HealthPool, ManaPool};
use crate::sound::CueScheduler;

/// Ranged attack parameters for creatures that cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    /// Damage on hit
    pub damage: f32,
    /// Flight speed, units per second
    pub speed: f32,
    /// Seconds of flight before the projectile expires
    pub ttl: f32,
    /// Mana consumed per cast; refused when the pool cannot cover it
    pub mana_cost: f32,
}

impl Default for ProjectileSpec {
    fn default() -> Self {
        Self {
            damage: 15.0,
            speed: 12.0,
            ttl: 3.0,
            mana_cost: 10.0,
        }
    }
}

/// Everything needed to spawn one creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureConfig {
    /// Display name, for logs
    pub name: String,
    /// Collision team
    pub team: Team,
    /// Maximum health
    pub max_health: f32,
    /// Maximum mana; `None` for creatures without a pool
    pub max_mana: Option<f32>,
    /// Mana regenerated per second
    pub mana_regen: f32,
    /// Behavior configuration
    pub brain: BrainConfig,
    /// Patrol route; empty means stand still
    pub waypoints: Vec<Vec3>,
    /// Teams the melee hit volume strikes; empty disables melee
    pub melee_targets: Vec<Team>,
    /// Radius of the melee overlap probe
    pub melee_reach: f32,
    /// Ranged attack, for casters
    pub projectile: Option<ProjectileSpec>,
    /// Idle vocalization interval bounds, seconds
    pub idle_sound_interval: (f32, f32),
}

impl Default for CreatureConfig {
    fn default() -> Self {
        Self {
            name: "creature".to_string(),
            team: Team::Mobs,
            max_health: 100.0,
            max_mana: None,
            mana_regen: 5.0,
            brain: BrainConfig::default(),
            waypoints: Vec::new(),
            melee_targets: vec![Team::Player],
            melee_reach: 2.5,
            projectile: None,
            idle_sound_interval: (6.0, 12.0),
        }
    }
}

impl CreatureConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the maximum health.
    #[must_use]
    pub fn with_max_health(mut self, max: f32) -> Self {
        self.max_health = max;
        self
    }

    /// Gives the creature a mana pool.
    #[must_use]
    pub fn with_mana(mut self, max: f32, regen: f32) -> Self {
        self.max_mana = Some(max);
        self.mana_regen = regen;
        self
    }

    /// Sets the behavior configuration.
    #[must_use]
    pub fn with_brain(mut self, brain: BrainConfig) -> Self {
        self.brain = brain;
        self
    }

    /// Sets the patrol route.
    #[must_use]
    pub fn with_waypoints(mut self, waypoints: Vec<Vec3>) -> Self {
        self.waypoints = waypoints;
        self
    }

    /// Removes the melee hit volume.
    #[must_use]
    pub fn without_melee(mut self) -> Self {
        self.melee_targets.clear();
        self
    }

    /// Gives the creature a ranged attack.
    #[must_use]
    pub fn with_projectile(mut self, spec: ProjectileSpec) -> Self {
        self.projectile = Some(spec);
        self
    }
}

/// A live hostile entity: brain, pools, and injected actuators.
pub struct Creature {
    id: EntityId,
    name: String,
    team: Team,
    health: HealthPool,
    mana: Option<ManaPool>,
    brain: Brain,
    hitbox: Option<HitVolume>,
    sounds: CueScheduler,
    nav: Box<dyn NavAgent>,
    anim: Box<dyn AnimationSink>,
    melee_reach: f32,
    projectile: Option<ProjectileSpec>,
    /// Seconds spent in the Dead state
    dead_for: f32,
}

impl Creature {
    /// Builds a creature from its configuration and injected actuators.
    ///
    /// Every component is constructed here; an invalid configuration fails
    /// the spawn and nothing is left behind.
    pub fn spawn(
        config: CreatureConfig,
        nav: Box<dyn NavAgent>,
        anim: Box<dyn AnimationSink>,
        events: Option<Sender<CreatureEvent>>,
    ) -> SpawnResult<Self> {
        let id = EntityId::new();

        let mut health = HealthPool::new(id, config.max_health)?;
        let mut mana = config
            .max_mana
            .map(|max| ManaPool::new(id, max, config.mana_regen))
            .transpose()?;
        let mut brain = Brain::new(id, config.brain)?.with_waypoints(config.waypoints);
        let (min_idle, max_idle) = config.idle_sound_interval;
        let mut sounds = CueScheduler::new(id, min_idle, max_idle);
        let hitbox = if config.melee_targets.is_empty() {
            None
        } else {
            Some(HitVolume::new(config.melee_targets)?)
        };

        if let Some(sender) = events {
            health = health.with_events(sender.clone());
            mana = mana.map(|pool| pool.with_events(sender.clone()));
            brain = brain.with_events(sender.clone());
            sounds = sounds.with_events(sender);
        }

        info!(entity = id.raw(), name = %config.name, "creature spawned");
        Ok(Self {
            id,
            name: config.name,
            team: config.team,
            health,
            mana,
            brain,
            hitbox,
            sounds,
            nav,
            anim,
            melee_reach: config.melee_reach,
            projectile: config.projectile,
            dead_for: 0.0,
        })
    }

    /// Reseeds the brain and cue scheduler RNGs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.brain = self.brain.with_seed(seed);
        self.sounds = self.sounds.with_seed(seed.rotate_left(17));
        self
    }

    /// Entity id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collision team.
    #[must_use]
    pub fn team(&self) -> Team {
        self.team
    }

    /// Current behavior state.
    #[must_use]
    pub fn state(&self) -> AiState {
        self.brain.state()
    }

    /// Current position, read from the navigation agent.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.nav.position()
    }

    /// Health pool.
    #[must_use]
    pub fn health(&self) -> &HealthPool {
        &self.health
    }

    /// Mana pool, when the creature has one.
    #[must_use]
    pub fn mana(&self) -> Option<&ManaPool> {
        self.mana.as_ref()
    }

    /// Whether the creature has died.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.health.is_dead()
    }

    /// Whether the melee probe is currently armed.
    #[must_use]
    pub fn melee_armed(&self) -> bool {
        self.hitbox.as_ref().is_some_and(HitVolume::is_armed)
    }

    /// Melee overlap radius.
    #[must_use]
    pub fn melee_reach(&self) -> f32 {
        self.melee_reach
    }

    /// Target snapshot of this creature, for other entities' perception.
    #[must_use]
    pub fn target_view(&self) -> TargetView {
        TargetView::new(self.id, self.nav.position(), !self.health.is_dead())
    }

    /// Switches the behavior policy at runtime.
    pub fn set_policy(&mut self, policy: BehaviorPolicy) {
        self.brain.set_policy(policy);
    }

    /// One simulation step. The target the brain perceives comes from
    /// `targets`, queried once at the top of the step.
    pub fn tick(&mut self, dt: f32, targets: &impl TargetProvider) {
        let target = targets.target();
        let Self {
            health,
            mana,
            brain,
            hitbox,
            sounds,
            nav,
            anim,
            dead_for,
            ..
        } = self;
        let mut act = Actuators {
            nav: nav.as_mut(),
            anim: anim.as_mut(),
            sounds,
            hitbox: hitbox.as_mut(),
        };
        brain.tick(dt, health, target, &mut act);

        if !health.is_dead() {
            if let Some(pool) = mana {
                pool.regen(dt);
            }
        }
        if brain.state() == AiState::Dead {
            *dead_for += dt;
        }
    }

    /// Applies damage, routing it through the health pool and the brain's
    /// provocation path in one call.
    pub fn apply_damage(&mut self, amount: f32) {
        let Self {
            health,
            brain,
            hitbox,
            sounds,
            nav,
            anim,
            ..
        } = self;
        health.apply_damage(amount);
        let mut act = Actuators {
            nav: nav.as_mut(),
            anim: anim.as_mut(),
            sounds,
            hitbox: hitbox.as_mut(),
        };
        brain.notify_damage(amount, health, &mut act);
    }

    /// Stuns the creature.
    pub fn take_stun(&mut self) {
        let Self {
            health,
            brain,
            hitbox,
            sounds,
            nav,
            anim,
            ..
        } = self;
        let mut act = Actuators {
            nav: nav.as_mut(),
            anim: anim.as_mut(),
            sounds,
            hitbox: hitbox.as_mut(),
        };
        brain.take_stun(health, &mut act);
    }

    /// Attack-complete signal from the animation system.
    pub fn finish_attack(&mut self) {
        let Self {
            brain,
            hitbox,
            sounds,
            nav,
            anim,
            ..
        } = self;
        let mut act = Actuators {
            nav: nav.as_mut(),
            anim: anim.as_mut(),
            sounds,
            hitbox: hitbox.as_mut(),
        };
        brain.on_attack_animation_complete(&mut act);
    }

    /// Processes this tick's melee overlaps through the hit volume.
    pub fn process_melee<T: CombatTargets>(
        &mut self,
        overlaps: &[EntityId],
        targets: &mut T,
    ) -> Vec<HitRecord> {
        match self.hitbox.as_mut() {
            Some(hitbox) => hitbox.process_overlaps(overlaps, targets),
            None => Vec::new(),
        }
    }

    /// Launches a projectile toward `direction`, paying the mana cost.
    /// Returns `None` for melee-only creatures, the dead, or an empty pool.
    pub fn launch_projectile(&mut self, direction: Vec3) -> Option<Projectile> {
        let spec = self.projectile?;
        if self.health.is_dead() {
            return None;
        }
        if let Some(pool) = self.mana.as_mut() {
            if !pool.reduce(spec.mana_cost) {
                return None;
            }
        }
        let dir = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        if dir == Vec3::ZERO {
            return None;
        }
        let teams = if self.team == Team::Player {
            vec![Team::Mobs]
        } else {
            vec![Team::Player]
        };
        Some(
            Projectile::new(self.id, self.nav.position(), dir * spec.speed, spec.damage, teams)
                .with_ttl(spec.ttl),
        )
    }

    /// Whether the despawn delay has fully elapsed after death.
    #[must_use]
    pub fn should_despawn(&self) -> bool {
        self.brain.state() == AiState::Dead && self.dead_for >= self.brain.config().despawn_delay
    }
}

impl std::fmt::Debug for Creature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Creature")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("team", &self.team)
            .field("state", &self.brain.state())
            .field("health", &self.health.current())
            .finish_non_exhaustive()
    }
}

/// The tracked player avatar, as the arena sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    /// Player entity id
    pub id: EntityId,
    /// Player position
    pub position: Vec3,
    /// Whether the player is alive
    pub alive: bool,
}

/// Damage resolver that defers application until all strikes for the tick
/// are collected, so resolving one creature's hits never aliases another
/// creature mid-iteration.
struct DeferredTargets {
    teams: HashMap<EntityId, Team>,
    queue: Vec<(EntityId, f32)>,
}

impl CombatTargets for DeferredTargets {
    fn team(&self, entity: EntityId) -> Option<Team> {
        self.teams.get(&entity).copied()
    }

    fn deal_damage(&mut self, entity: EntityId, amount: f32) {
        self.queue.push((entity, amount));
    }
}

/// Per-scene simulation driver.
pub struct Arena {
    creatures: HashMap<EntityId, Creature>,
    projectiles: Vec<Projectile>,
    bus: EventBus,
    player: Option<PlayerState>,
    player_damage: f32,
    clock: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            creatures: HashMap::new(),
            projectiles: Vec::new(),
            bus: EventBus::new(1024),
            player: None,
            player_damage: 0.0,
            clock: 0.0,
        }
    }

    /// Spawns a creature from its configuration, wiring it to the arena's
    /// event bus.
    pub fn spawn(
        &mut self,
        config: CreatureConfig,
        nav: Box<dyn NavAgent>,
        anim: Box<dyn AnimationSink>,
    ) -> SpawnResult<EntityId> {
        let creature = Creature::spawn(config, nav, anim, Some(self.bus.sender()))?;
        self.insert(creature)
    }

    /// Inserts an already-built creature.
    pub fn insert(&mut self, creature: Creature) -> SpawnResult<EntityId> {
        let id = creature.id();
        if self.creatures.contains_key(&id) {
            return Err(SpawnError::AlreadySpawned(id));
        }
        self.creatures.insert(id, creature);
        Ok(id)
    }

    /// Removes a creature immediately, bypassing the despawn delay.
    pub fn despawn(&mut self, id: EntityId) -> Option<Creature> {
        self.creatures.remove(&id)
    }

    /// Updates the tracked player.
    pub fn set_player(&mut self, player: PlayerState) {
        self.player = Some(player);
    }

    /// Clears the tracked player; every brain falls back to patrol.
    pub fn clear_player(&mut self) {
        self.player = None;
    }

    /// Number of live creatures.
    #[must_use]
    pub fn creature_count(&self) -> usize {
        self.creatures.len()
    }

    /// A spawned creature, by id.
    #[must_use]
    pub fn creature(&self, id: EntityId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    /// Mutable access to a spawned creature.
    pub fn creature_mut(&mut self, id: EntityId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    /// Drains the events published since the last call.
    pub fn drain_events(&self) -> Vec<CreatureEvent> {
        self.bus.drain()
    }

    /// Total damage melee and projectiles have dealt to the player.
    #[must_use]
    pub fn player_damage_taken(&self) -> f32 {
        self.player_damage
    }

    /// Routes damage into a creature. Returns false for unknown ids.
    pub fn damage_creature(&mut self, id: EntityId, amount: f32) -> bool {
        match self.creatures.get_mut(&id) {
            Some(creature) => {
                creature.apply_damage(amount);
                true
            }
            None => false,
        }
    }

    /// Stuns a creature. Returns false for unknown ids.
    pub fn stun_creature(&mut self, id: EntityId) -> bool {
        match self.creatures.get_mut(&id) {
            Some(creature) => {
                creature.take_stun();
                true
            }
            None => false,
        }
    }

    /// Forwards an attack-complete signal. Returns false for unknown ids.
    pub fn finish_attack(&mut self, id: EntityId) -> bool {
        match self.creatures.get_mut(&id) {
            Some(creature) => {
                creature.finish_attack();
                true
            }
            None => false,
        }
    }

    /// Launches a creature's projectile toward a point. Returns false when
    /// the creature is unknown, melee-only, or out of mana.
    pub fn launch_projectile(&mut self, id: EntityId, toward: Vec3) -> bool {
        let Some(creature) = self.creatures.get_mut(&id) else {
            return false;
        };
        let direction = toward - creature.position();
        match creature.launch_projectile(direction) {
            Some(projectile) => {
                self.projectiles.push(projectile);
                true
            }
            None => false,
        }
    }

    /// One simulation step: brains, melee resolution, projectiles, corpse
    /// culling. Returns the strikes landed this tick.
    pub fn tick(&mut self, dt: f32) -> Vec<HitRecord> {
        self.clock += dt;
        let target = self.player.map(|p| TargetView::new(p.id, p.position, p.alive));

        // Stable iteration order keeps replays deterministic.
        let mut ids: Vec<EntityId> = self.creatures.keys().copied().collect();
        ids.sort_by_key(|id| id.raw());

        for id in &ids {
            if let Some(creature) = self.creatures.get_mut(id) {
                creature.tick(dt, &target);
            }
        }

        let mut resolver = self.build_resolver();
        let hits = self.resolve_melee(&ids, &mut resolver);
        self.resolve_projectiles(dt, &mut resolver);
        self.apply_damage_queue(resolver.queue);

        self.creatures.retain(|_, creature| !creature.should_despawn());
        hits
    }

    fn build_resolver(&self) -> DeferredTargets {
        let mut teams: HashMap<EntityId, Team> = self
            .creatures
            .values()
            .filter(|c| !c.is_dead())
            .map(|c| (c.id(), c.team()))
            .collect();
        if let Some(player) = self.player {
            if player.alive {
                teams.insert(player.id, Team::Player);
            }
        }
        DeferredTargets {
            teams,
            queue: Vec::new(),
        }
    }

    fn resolve_melee(&mut self, ids: &[EntityId], resolver: &mut DeferredTargets) -> Vec<HitRecord> {
        let positions: HashMap<EntityId, Vec3> = self
            .creatures
            .values()
            .map(|c| (c.id(), c.position()))
            .collect();

        let mut hits = Vec::new();
        for id in ids {
            let Some(creature) = self.creatures.get(id) else {
                continue;
            };
            if !creature.melee_armed() {
                continue;
            }
            let reach = creature.melee_reach();
            let origin = creature.position();

            let mut overlaps: Vec<EntityId> = positions
                .iter()
                .filter(|(other, pos)| **other != *id && within(origin, **pos, reach))
                .map(|(other, _)| *other)
                .collect();
            if let Some(player) = self.player {
                if within(origin, player.position, reach) {
                    overlaps.push(player.id);
                }
            }
            overlaps.sort_by_key(|id| id.raw());

            if let Some(creature) = self.creatures.get_mut(id) {
                hits.extend(creature.process_melee(&overlaps, resolver));
            }
        }
        hits
    }

    fn resolve_projectiles(&mut self, dt: f32, resolver: &mut DeferredTargets) {
        let positions: Vec<(EntityId, Vec3)> = self
            .creatures
            .values()
            .map(|c| (c.id(), c.position()))
            .chain(self.player.map(|p| (p.id, p.position)))
            .collect();

        for projectile in &mut self.projectiles {
            let from = projectile.tick(dt);
            if !projectile.is_active() {
                continue;
            }
            // Sweep the whole step so fast bolts cannot pass between
            // per-tick overlap checks.
            let overlaps: Vec<EntityId> = positions
                .iter()
                .filter(|(_, pos)| projectile.swept_within(from, *pos))
                .map(|(id, _)| *id)
                .collect();
            projectile.try_hit(&overlaps, resolver);
        }
        self.projectiles.retain(Projectile::is_active);
    }

    fn apply_damage_queue(&mut self, queue: Vec<(EntityId, f32)>) {
        for (target, amount) in queue {
            if let Some(creature) = self.creatures.get_mut(&target) {
                creature.apply_damage(amount);
            } else if self.player.is_some_and(|p| p.id == target) {
                self.player_damage += amount;
            }
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("creatures", &self.creatures.len())
            .field("projectiles", &self.projectiles.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

//! Sound cue scheduling.
//!
//! Playback is external; this module only decides *when* a cue should
//! fire and publishes it as a [`CreatureEvent::Sound`]. It reproduces the
//! original zombie vocal behavior: idle groans at randomized intervals
//! while standing still, one aggression roar per aggression episode, one
//! death cue ever, and no cues at all once dead (death cue aside).

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use hollowfall_common::EntityId;

use crate::events::CreatureEvent;

/// Sound cues a creature can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCue {
    /// Periodic idle vocalization
    Idle,
    /// Aggression roar on first noticing the target
    Agro,
    /// Attack grunt
    Attack,
    /// Stun reaction
    Stun,
    /// Death rattle
    Death,
}

/// Per-creature cue scheduler.
#[derive(Debug, Clone)]
pub struct CueScheduler {
    owner: EntityId,
    /// Randomized idle interval bounds in seconds
    min_idle_interval: f32,
    max_idle_interval: f32,
    /// Clock time when the next idle cue may fire
    next_idle_at: f32,
    /// One agro cue per aggression episode
    agro_played: bool,
    /// Death cue fires at most once ever
    death_played: bool,
    /// Xorshift state for interval jitter
    rng_state: u64,
    events: Option<Sender<CreatureEvent>>,
}

impl CueScheduler {
    /// Creates a scheduler with the given idle interval bounds.
    #[must_use]
    pub fn new(owner: EntityId, min_idle_interval: f32, max_idle_interval: f32) -> Self {
        let min = min_idle_interval.max(0.1);
        Self {
            owner,
            min_idle_interval: min,
            max_idle_interval: max_idle_interval.max(min),
            next_idle_at: 0.0,
            agro_played: false,
            death_played: false,
            rng_state: fastrand::u64(1..),
            events: None,
        }
    }

    /// Attaches an observer channel.
    #[must_use]
    pub fn with_events(mut self, sender: Sender<CreatureEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Reseeds the jitter RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_state = seed.max(1);
        self
    }

    /// Called every tick while alive. Fires an idle cue when the creature
    /// is standing still and the randomized interval has elapsed.
    pub fn tick_idle(&mut self, clock: f32, standing_still: bool, dead: bool) {
        if dead {
            return;
        }
        if self.next_idle_at == 0.0 {
            self.schedule_next_idle(clock);
            return;
        }
        if standing_still && clock >= self.next_idle_at {
            self.publish(SoundCue::Idle);
            self.agro_played = false;
            self.schedule_next_idle(clock);
        }
    }

    /// Fires the aggression cue, at most once per episode.
    pub fn play_agro(&mut self, dead: bool) {
        if dead || self.agro_played {
            return;
        }
        self.agro_played = true;
        self.publish(SoundCue::Agro);
    }

    /// Clears the per-episode agro latch when aggression is lost.
    pub fn reset_agro(&mut self) {
        self.agro_played = false;
    }

    /// Fires the attack cue unless dead.
    pub fn play_attack(&mut self, dead: bool) {
        if !dead {
            self.publish(SoundCue::Attack);
        }
    }

    /// Fires the stun cue unless dead.
    pub fn play_stun(&mut self, dead: bool) {
        if !dead {
            self.publish(SoundCue::Stun);
        }
    }

    /// Fires the death cue, at most once ever.
    pub fn play_death(&mut self) {
        if !self.death_played {
            self.death_played = true;
            self.publish(SoundCue::Death);
        }
    }

    fn schedule_next_idle(&mut self, clock: f32) {
        let span = self.max_idle_interval - self.min_idle_interval;
        self.next_idle_at = clock + self.min_idle_interval + self.next_random() * span;
    }

    fn next_random(&mut self) -> f32 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 17;
        self.rng_state ^= self.rng_state << 5;
        ((self.rng_state >> 40) as f32) / (1u64 << 24) as f32
    }

    fn publish(&self, cue: SoundCue) {
        if let Some(sender) = &self.events {
            let _ = sender.try_send(CreatureEvent::Sound {
                entity: self.owner,
                cue,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    fn cues(bus: &EventBus) -> Vec<SoundCue> {
        bus.drain()
            .into_iter()
            .filter_map(|e| match e {
                CreatureEvent::Sound { cue, .. } => Some(cue),
                _ => None,
            })
            .collect()
    }

    fn scheduler(bus: &EventBus) -> CueScheduler {
        CueScheduler::new(EntityId::new(), 5.0, 10.0)
            .with_events(bus.sender())
            .with_seed(7)
    }

    #[test]
    fn test_idle_cue_needs_interval_and_stillness() {
        let bus = EventBus::new(64);
        let mut cues_sched = scheduler(&bus);

        cues_sched.tick_idle(0.0, true, false); // schedules only
        cues_sched.tick_idle(1.0, true, false);
        assert!(cues(&bus).is_empty());

        // Past the max interval but moving: no cue.
        cues_sched.tick_idle(20.0, false, false);
        assert!(cues(&bus).is_empty());

        cues_sched.tick_idle(20.0, true, false);
        assert_eq!(cues(&bus), vec![SoundCue::Idle]);
    }

    #[test]
    fn test_agro_once_per_episode() {
        let bus = EventBus::new(64);
        let mut sched = scheduler(&bus);

        sched.play_agro(false);
        sched.play_agro(false);
        assert_eq!(cues(&bus), vec![SoundCue::Agro]);

        sched.reset_agro();
        sched.play_agro(false);
        assert_eq!(cues(&bus), vec![SoundCue::Agro]);
    }

    #[test]
    fn test_idle_cue_resets_agro_latch() {
        let bus = EventBus::new(64);
        let mut sched = scheduler(&bus);

        sched.play_agro(false);
        sched.tick_idle(0.0, true, false);
        sched.tick_idle(30.0, true, false); // idle cue fires, latch clears
        sched.play_agro(false);

        let fired = cues(&bus);
        assert_eq!(
            fired
                .iter()
                .filter(|c| matches!(c, SoundCue::Agro))
                .count(),
            2
        );
    }

    #[test]
    fn test_death_cue_once_and_silence_after() {
        let bus = EventBus::new(64);
        let mut sched = scheduler(&bus);

        sched.play_death();
        sched.play_death();
        sched.play_attack(true);
        sched.play_stun(true);
        sched.tick_idle(100.0, true, true);

        assert_eq!(cues(&bus), vec![SoundCue::Death]);
    }
}

//! Event bus for observer notification.
//!
//! Health changes, deaths, provocation, state switches, and sound cues are
//! published here for UI, audio, and higher-level controllers to consume.
//! Publishing is synchronous and non-blocking; observers drain the bus on
//! their own schedule and never run inside the mutator that published.

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use hollowfall_common::EntityId;

use crate::sound::SoundCue;

/// Events emitted by creatures and their sub-systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CreatureEvent {
    /// A health pool changed value.
    HealthChanged {
        /// Entity whose health changed
        entity: EntityId,
        /// Current health after the change
        current: f32,
        /// Maximum health
        max: f32,
    },
    /// A health pool crossed to zero. Fired exactly once per life.
    Died {
        /// Entity that died
        entity: EntityId,
    },
    /// A mana pool changed value.
    ManaChanged {
        /// Entity whose mana changed
        entity: EntityId,
        /// Current mana after the change
        current: f32,
        /// Maximum mana
        max: f32,
    },
    /// A creature took damage for the first time and is now provoked.
    Provoked {
        /// Entity that was provoked
        entity: EntityId,
        /// Damage amount that provoked it
        amount: f32,
    },
    /// A brain switched behavior state.
    StateChanged {
        /// Entity whose brain switched
        entity: EntityId,
        /// Debug name of the new state
        state: String,
    },
    /// A sound cue should play for an entity.
    Sound {
        /// Entity the cue belongs to
        entity: EntityId,
        /// Which cue to play
        cue: SoundCue,
    },
}

/// Event bus for broadcasting creature events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<CreatureEvent>,
    /// Receiver for collecting events
    receiver: Receiver<CreatureEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    ///
    /// Non-blocking; if the bus is full the event is dropped.
    pub fn publish(&self, event: CreatureEvent) {
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CreatureEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CreatureEvent> {
        self.sender.clone()
    }
}

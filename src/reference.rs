//! Classified references between tracked objects.

use crate::object::ObjectId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub id: u64,
}

impl SlotId {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self { id }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.id)
    }
}

/// How strongly a slot holds on to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    /// Keeps the target alive.
    Strong,
    /// Keeps the target alive unless the pass runs under memory pressure.
    Soft,
    /// Never keeps the target alive; readable until the target is reclaimed.
    Weak,
    /// Never readable; reclamation of the target produces a notification.
    Phantom,
}

impl Strength {
    pub const ALL: [Strength; 4] = [
        Strength::Strong,
        Strength::Soft,
        Strength::Weak,
        Strength::Phantom,
    ];

    /// Whether traversal may follow a slot of this strength.
    pub fn keeps_alive(self, memory_pressure: bool) -> bool {
        match self {
            Strength::Strong => true,
            Strength::Soft => !memory_pressure,
            Strength::Weak | Strength::Phantom => false,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Strength::Strong => 0,
            Strength::Soft => 1,
            Strength::Weak => 2,
            Strength::Phantom => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Live,
    Cleared,
    /// Phantom slot whose target is gone and whose notification was queued.
    Enqueued,
}

#[derive(Debug, Clone)]
pub struct ReferenceSlot {
    pub id: SlotId,
    pub source: ObjectId,
    pub target: ObjectId,
    strength: Strength,
    state: SlotState,
}

impl ReferenceSlot {
    pub(crate) fn new(id: SlotId, source: ObjectId, target: ObjectId, strength: Strength) -> Self {
        Self {
            id,
            source,
            target,
            strength,
            state: SlotState::Live,
        }
    }

    pub fn strength(&self) -> Strength {
        self.strength
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn read(&self) -> Option<ObjectId> {
        match (self.strength, self.state) {
            (Strength::Phantom, _) => None,
            (_, SlotState::Live) => Some(self.target),
            _ => None,
        }
    }

    /// A slot still waiting for its target to be resolved by a pass.
    pub fn is_pending(&self) -> bool {
        self.state == SlotState::Live
    }

    pub(crate) fn clear(&mut self) {
        self.state = SlotState::Cleared;
    }

    pub(crate) fn mark_enqueued(&mut self) {
        self.state = SlotState::Enqueued;
    }
}

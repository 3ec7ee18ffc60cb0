//! Game Events
//!
//! Events generated by the reducer for the UI layer and for replay logs.

use serde::{Serialize, Deserialize};

use crate::game::deck::{CardId, FaceId};
use crate::game::session::{Outcome, SessionStatus};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Session status changed
    PhaseChanged {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// A card was turned face up
    CardFlipped {
        card_id: CardId,
        face_id: FaceId,
    },

    /// Two flipped cards shared a face
    PairMatched {
        first: CardId,
        second: CardId,
        face_id: FaceId,
        matched_pairs: u32,
    },

    /// Two flipped cards differed and were turned back
    PairMissed {
        first: CardId,
        second: CardId,
    },

    /// Countdown stepped
    TimeTick {
        remaining: u32,
    },

    /// Session resolved
    SessionCompleted {
        outcome: Outcome,
    },
}

/// A game event with its position in the session's event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Monotonic sequence number within one session generation
    pub sequence: u32,

    /// Session generation that produced it
    pub generation: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(sequence: u32, generation: u64, data: GameEventData) -> Self {
        Self {
            sequence,
            generation,
            data,
        }
    }

    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, GameEventData::SessionCompleted { .. })
    }
}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: generation, then sequence
        self.generation
            .cmp(&other.generation)
            .then(self.sequence.cmp(&other.sequence))
    }
}

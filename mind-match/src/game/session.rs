//! Game Session State
//!
//! The card-flip state machine for one level:
//!
//! ```text
//! Idle ──start──▶ Intro ──intro elapsed──▶ Playing ⇄ Evaluating ──▶ Complete
//! ```
//!
//! Every mutation goes through the methods below; the host never touches
//! cards directly. Rejected selections are values, not errors.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::deck::{face_counts, Card, CardId, FaceId};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::level::LevelDefinition;

// =============================================================================
// STATUS & OUTCOME
// =============================================================================

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionStatus {
    /// Dealt, not started
    #[default]
    Idle = 0,
    /// Intro screen, no input accepted
    Intro = 1,
    /// Waiting for a selection
    Playing = 2,
    /// Two cards face up, waiting for the reveal delay
    Evaluating = 3,
    /// Won or timed out; terminal
    Complete = 4,
}

impl SessionStatus {
    /// Whether the countdown runs in this status.
    #[inline]
    pub fn is_timed(self) -> bool {
        matches!(self, SessionStatus::Playing | SessionStatus::Evaluating)
    }
}

/// How a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Every pair found
    Matched,
    /// Countdown reached zero first
    Timeout,
}

/// Terminal result of a session, produced exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    /// Win or timeout
    pub kind: OutcomeKind,
    /// Completed two-card comparisons
    pub attempts: u32,
    /// Level that was played
    pub level_index: u32,
    /// Pairs found before the end
    pub matched_pairs: u32,
    /// Seconds left on the countdown
    pub time_remaining: Option<u32>,
}

impl Outcome {
    /// Whether the level was won.
    #[inline]
    pub fn is_win(&self) -> bool {
        self.kind == OutcomeKind::Matched
    }
}

// =============================================================================
// SELECTION RESULTS
// =============================================================================

/// Why a selection was ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Session is not accepting input (intro, evaluating, complete...)
    NotPlaying(SessionStatus),
    /// Two cards are already face up
    TwoFlipped,
    /// No card with that id in this session
    UnknownCard,
    /// Card already belongs to a found pair
    AlreadyMatched,
    /// Card is already face up
    AlreadyFlipped,
}

/// Result of `select_card`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectResult {
    /// First card of an attempt turned up
    Flipped,
    /// Second card turned up; resolution waits for the reveal delay
    Revealing {
        /// Whether the two faces match
        is_match: bool,
    },
    /// Ignored, nothing changed
    Rejected(RejectReason),
}

impl SelectResult {
    /// Whether the selection was ignored.
    #[inline]
    pub fn is_rejected(&self) -> bool {
        matches!(self, SelectResult::Rejected(_))
    }
}

/// Session construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Deck size does not match the level.
    #[error("deck has {actual} cards, level needs {expected}")]
    WrongCardCount {
        /// `2 * pair_count`
        expected: u32,
        /// Cards handed in
        actual: u32,
    },

    /// A face does not appear exactly twice.
    #[error("face {face} appears {count} times")]
    UnpairedFace {
        /// Offending face
        face: FaceId,
        /// Times it appears
        count: u32,
    },

    /// Two cards share an id.
    #[error("duplicate card id {0:?}")]
    DuplicateCardId(CardId),

    /// A dealt card is already face up or matched.
    #[error("card {0:?} was dealt face up")]
    CardNotFaceDown(CardId),
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only view handed to the UI after every mutating call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Level being played
    pub level_index: u32,
    /// Grid rows
    pub rows: u32,
    /// Grid columns
    pub cols: u32,
    /// Cards in board order
    pub cards: Vec<Card>,
    /// Pairs found
    pub matched_pairs: u32,
    /// Pairs on the board
    pub pair_count: u32,
    /// Completed comparisons
    pub attempts: u32,
    /// Seconds left
    pub time_remaining: Option<u32>,
    /// Current status
    pub status: SessionStatus,
    /// Matched pairs per attempt, as a percentage
    pub accuracy_pct: u8,
    /// Terminal outcome, once complete
    pub outcome: Option<Outcome>,
}

// =============================================================================
// SESSION
// =============================================================================

/// All mutable puzzle state for one level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameSession {
    level: LevelDefinition,
    cards: Vec<Card>,
    flipped_ids: Vec<CardId>,
    matched_pairs: u32,
    attempts: u32,
    time_remaining: Option<u32>,
    elapsed_seconds: u32,
    status: SessionStatus,
    outcome: Option<Outcome>,

    /// Bumped on every start so stale timers can be told apart
    generation: u64,

    next_sequence: u32,

    #[serde(skip)]
    pending_events: Vec<GameEvent>,
}

impl GameSession {
    /// Create an idle session over a dealt deck.
    pub fn new(level: LevelDefinition, deck: Vec<Card>) -> Result<Self, SessionError> {
        validate_deck(&level, &deck)?;
        Ok(Self {
            level,
            cards: deck,
            flipped_ids: Vec::with_capacity(2),
            matched_pairs: 0,
            attempts: 0,
            time_remaining: level.time_limit_seconds,
            elapsed_seconds: 0,
            status: SessionStatus::Idle,
            outcome: None,
            generation: 0,
            next_sequence: 0,
            pending_events: Vec::new(),
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Level being played.
    pub fn level(&self) -> &LevelDefinition {
        &self.level
    }

    /// Cards in board order.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Look a card up by id.
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Card at a grid position (row-major).
    pub fn card_at(&self, row: u32, col: u32) -> Option<&Card> {
        if row >= self.level.rows || col >= self.level.cols {
            return None;
        }
        self.cards.get((row * self.level.cols + col) as usize)
    }

    /// Ids of the face-up, unresolved cards (0..=2).
    pub fn flipped_ids(&self) -> &[CardId] {
        &self.flipped_ids
    }

    /// Pairs found so far.
    pub fn matched_pairs(&self) -> u32 {
        self.matched_pairs
    }

    /// Completed comparisons.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Seconds left, `None` on untimed levels.
    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    /// Seconds counted since play began.
    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Terminal outcome, once complete.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the session has resolved.
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    /// Matched pairs as a percentage of attempts (100 before any attempt).
    pub fn accuracy_pct(&self) -> u8 {
        if self.attempts == 0 {
            return 100;
        }
        ((self.matched_pairs as u64 * 100) / self.attempts as u64).min(100) as u8
    }

    /// Read-only copy of the board and counters.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            level_index: self.level.index,
            rows: self.level.rows,
            cols: self.level.cols,
            cards: self.cards.clone(),
            matched_pairs: self.matched_pairs,
            pair_count: self.level.pair_count,
            attempts: self.attempts,
            time_remaining: self.time_remaining,
            status: self.status,
            accuracy_pct: self.accuracy_pct(),
            outcome: self.outcome,
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Enter the intro, resetting the board and all counters.
    pub fn start(&mut self) {
        for card in &mut self.cards {
            card.flipped = false;
            card.matched = false;
        }
        self.flipped_ids.clear();
        self.matched_pairs = 0;
        self.attempts = 0;
        self.time_remaining = self.level.time_limit_seconds;
        self.elapsed_seconds = 0;
        self.outcome = None;
        self.generation += 1;
        self.next_sequence = 0;
        self.set_status(SessionStatus::Intro);
    }

    /// Swap in a freshly dealt deck and start again.
    pub fn restart(&mut self, deck: Vec<Card>) -> Result<(), SessionError> {
        validate_deck(&self.level, &deck)?;
        self.cards = deck;
        self.start();
        Ok(())
    }

    /// Intro finished. Returns true if play began.
    pub fn intro_elapsed(&mut self) -> bool {
        if self.status != SessionStatus::Intro {
            return false;
        }
        self.set_status(SessionStatus::Playing);
        true
    }

    /// Turn a card face up.
    pub fn select_card(&mut self, id: CardId) -> SelectResult {
        if self.status != SessionStatus::Playing {
            return SelectResult::Rejected(RejectReason::NotPlaying(self.status));
        }
        if self.flipped_ids.len() >= 2 {
            return SelectResult::Rejected(RejectReason::TwoFlipped);
        }

        let Some(card) = self.cards.iter_mut().find(|c| c.id == id) else {
            return SelectResult::Rejected(RejectReason::UnknownCard);
        };
        if card.matched {
            return SelectResult::Rejected(RejectReason::AlreadyMatched);
        }
        if card.flipped {
            return SelectResult::Rejected(RejectReason::AlreadyFlipped);
        }

        card.flipped = true;
        let face_id = card.face_id.clone();
        self.flipped_ids.push(id);
        self.push_event(GameEventData::CardFlipped { card_id: id, face_id });

        if self.flipped_ids.len() < 2 {
            return SelectResult::Flipped;
        }

        self.attempts += 1;
        self.set_status(SessionStatus::Evaluating);
        SelectResult::Revealing {
            is_match: self.flipped_faces_match(),
        }
    }

    /// Reveal delay finished: commit the match or turn both cards back.
    ///
    /// Ignored unless evaluating. A countdown already at zero wins over the
    /// match, so a same-edge timeout is never reported as a win.
    pub fn reveal_elapsed(&mut self) -> bool {
        if self.status != SessionStatus::Evaluating || self.flipped_ids.len() != 2 {
            return false;
        }
        if self.time_remaining == Some(0) {
            self.complete(OutcomeKind::Timeout);
            return true;
        }

        let first = self.flipped_ids[0];
        let second = self.flipped_ids[1];
        let is_match = self.flipped_faces_match();

        if is_match {
            let mut face = None;
            for card in self.cards.iter_mut().filter(|c| c.id == first || c.id == second) {
                card.matched = true;
                face = Some(card.face_id.clone());
            }
            self.flipped_ids.clear();
            self.matched_pairs += 1;
            if let Some(face_id) = face {
                self.push_event(GameEventData::PairMatched {
                    first,
                    second,
                    face_id,
                    matched_pairs: self.matched_pairs,
                });
            }

            if self.matched_pairs >= self.level.pair_count {
                self.complete(OutcomeKind::Matched);
            } else {
                self.set_status(SessionStatus::Playing);
            }
        } else {
            for card in self.cards.iter_mut().filter(|c| c.id == first || c.id == second) {
                card.flipped = false;
            }
            self.flipped_ids.clear();
            self.push_event(GameEventData::PairMissed { first, second });
            self.set_status(SessionStatus::Playing);
        }

        true
    }

    /// One countdown second. Reaching zero ends the session immediately,
    /// even with an evaluation pending.
    pub fn tick(&mut self) -> bool {
        if !self.status.is_timed() {
            return false;
        }
        self.elapsed_seconds += 1;

        let Some(remaining) = self.time_remaining else {
            return true;
        };
        let remaining = remaining.saturating_sub(1);
        self.time_remaining = Some(remaining);
        self.push_event(GameEventData::TimeTick { remaining });

        if remaining == 0 {
            self.complete(OutcomeKind::Timeout);
        }
        true
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Compute hash of current state for replay verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.level.index, self.generation, |hasher| {
            for card in &self.cards {
                hasher.update_u32(card.id.0);
                hasher.update_str(card.face_id.as_str());
                hasher.update_bool(card.flipped);
                hasher.update_bool(card.matched);
            }
            hasher.update_u32(self.flipped_ids.len() as u32);
            for id in &self.flipped_ids {
                hasher.update_u32(id.0);
            }
            hasher.update_u32(self.matched_pairs);
            hasher.update_u32(self.attempts);
            hasher.update_opt_u32(self.time_remaining);
            hasher.update_u32(self.elapsed_seconds);
            hasher.update_u8(self.status as u8);
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn flipped_faces_match(&self) -> bool {
        match self.flipped_ids.as_slice() {
            [a, b] => match (self.card(*a), self.card(*b)) {
                (Some(x), Some(y)) => x.face_id == y.face_id,
                _ => false,
            },
            _ => false,
        }
    }

    fn complete(&mut self, kind: OutcomeKind) {
        let outcome = Outcome {
            kind,
            attempts: self.attempts,
            level_index: self.level.index,
            matched_pairs: self.matched_pairs,
            time_remaining: self.time_remaining,
        };
        self.outcome = Some(outcome);
        self.set_status(SessionStatus::Complete);
        self.push_event(GameEventData::SessionCompleted { outcome });
    }

    fn set_status(&mut self, to: SessionStatus) {
        let from = self.status;
        if from == to {
            return;
        }
        self.status = to;
        self.push_event(GameEventData::PhaseChanged { from, to });
    }

    fn push_event(&mut self, data: GameEventData) {
        let event = GameEvent::new(self.next_sequence, self.generation, data);
        self.next_sequence += 1;
        self.pending_events.push(event);
    }
}

/// Check the pairing invariant on a dealt deck.
pub fn validate_deck(level: &LevelDefinition, deck: &[Card]) -> Result<(), SessionError> {
    let expected = level.card_count();
    if deck.len() as u32 != expected {
        return Err(SessionError::WrongCardCount {
            expected,
            actual: deck.len() as u32,
        });
    }

    let mut ids = BTreeSet::new();
    for card in deck {
        if !ids.insert(card.id) {
            return Err(SessionError::DuplicateCardId(card.id));
        }
        if card.flipped || card.matched {
            return Err(SessionError::CardNotFaceDown(card.id));
        }
    }

    if let Some((face, count)) = face_counts(deck).into_iter().find(|(_, n)| *n != 2) {
        return Err(SessionError::UnpairedFace {
            face: face.clone(),
            count,
        });
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

//! Game Logic Module
//!
//! Everything that decides what happens on the board. Deterministic: no
//! clocks, no I/O, randomness only through an injected `RandomSource`.
//!
//! ## Module Structure
//!
//! - `level`: Level catalog (index -> definition)
//! - `deck`: Faces, cards and deck dealing
//! - `session`: Per-level state machine
//! - `step`: Event reducer and replay
//! - `events`: Game events for observers and verification

pub mod level;
pub mod deck;
pub mod session;
pub mod step;
pub mod events;

// Re-export key types
pub use level::{grid_shape, LevelCatalog, LevelDefinition, CATALOG_SIZE};
pub use deck::{Card, CardId, DeckBuilder, DeckError, Face, FaceId, FacePool};
pub use session::{
    GameSession, Outcome, OutcomeKind, RejectReason, SelectResult, SessionError,
    SessionSnapshot, SessionStatus,
};
pub use step::{replay_session, step, Effect, SessionEvent, StepResult};
pub use events::{GameEvent, GameEventData};

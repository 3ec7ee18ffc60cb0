//! Core deterministic primitives.
//!
//! Randomness, time and state hashing. Everything the game layer needs from
//! the outside world comes through these seams so tests stay reproducible.

pub mod rng;
pub mod hash;
pub mod clock;

// Re-export core types
pub use rng::{DeterministicRng, RandomSource};
pub use hash::{compute_state_hash, StateHash};
pub use clock::{CancelHandle, Clock, Fired, ManualClock, SystemClock, Timer, TimerKind};

//! # Mind Match Engine
//!
//! Deterministic memory-matching puzzle engine: level catalog, deck dealing,
//! per-level session state machine and persistent level progression.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MIND MATCH ENGINE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ behind RandomSource          │
//! │  ├── clock.rs    - Clock trait, manual + system clocks       │
//! │  └── hash.rs     - Session state hashing                     │
//! │                                                              │
//! │  game/           - Game logic (deterministic)                │
//! │  ├── level.rs    - Level catalog                             │
//! │  ├── deck.rs     - Faces, cards, deck builder                │
//! │  ├── session.rs  - Session state machine                     │
//! │  ├── step.rs     - Event reducer and replay                  │
//! │  └── events.rs   - Observer events                           │
//! │                                                              │
//! │  progress/       - Persistence (non-deterministic)           │
//! │  ├── store.rs    - ProgressStore, memory + JSON file         │
//! │  └── controller.rs - Monotonic unlock                        │
//! │                                                              │
//! │  controller.rs   - Host driver wiring clock to session       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules never read the system clock and never
//! draw randomness on their own:
//! - Shuffles use the injected `RandomSource`
//! - Timers are requested as `Effect`s and delivered by a `Clock`
//! - Ordered collections only (BTreeMap)
//!
//! Given the same seed and the same event list, a session produces an
//! identical state hash on every platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod progress;
pub mod config;
pub mod error;
pub mod controller;

// Re-export commonly used types
pub use core::rng::{DeterministicRng, RandomSource};
pub use core::clock::{Clock, ManualClock, SystemClock};
pub use game::level::{LevelCatalog, LevelDefinition};
pub use game::deck::{Card, CardId, DeckBuilder, FacePool};
pub use game::session::{GameSession, Outcome, OutcomeKind, SelectResult, SessionStatus};
pub use progress::{JsonFileStore, MemoryStore, ProgressController, ProgressStore};
pub use config::EngineConfig;
pub use error::EngineError;
pub use controller::GameController;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

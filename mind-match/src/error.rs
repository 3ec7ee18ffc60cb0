//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::game::deck::DeckError;
use crate::game::session::SessionError;
use crate::progress::store::StoreError;

/// Any failure surfaced by the engine's host-facing API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Deck could not be dealt.
    #[error("deck error: {0}")]
    Deck(#[from] DeckError),

    /// Session rejected its deck.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Progress could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Bad configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Operation needs a running session.
    #[error("no active session")]
    NoActiveSession,
}

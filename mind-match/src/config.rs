//! Engine Configuration
//!
//! Defaults suit the companion app; every knob can be overridden from the
//! environment.

use std::path::PathBuf;

use thiserror::Error;

use crate::game::level::CATALOG_SIZE;
use crate::progress::store::PROGRESS_KEY;

/// Intro screen length before input opens (ms).
pub const DEFAULT_INTRO_MS: u64 = 2_000;

/// How long two face-up cards stay visible before resolving (ms).
pub const DEFAULT_REVEAL_DELAY_MS: u64 = 1_000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held something unparsable.
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Intro duration (ms)
    pub intro_ms: u64,
    /// Reveal delay (ms)
    pub reveal_delay_ms: u64,
    /// Number of catalog levels
    pub catalog_size: u32,
    /// Fixed deal seed; `None` draws entropy per controller
    pub seed: Option<u64>,
    /// Progress file location; `None` keeps progress in memory
    pub progress_path: Option<PathBuf>,
    /// Store key for the unlocked level
    pub progress_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intro_ms: DEFAULT_INTRO_MS,
            reveal_delay_ms: DEFAULT_REVEAL_DELAY_MS,
            catalog_size: CATALOG_SIZE,
            seed: None,
            progress_path: None,
            progress_key: PROGRESS_KEY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// - `MINDMATCH_INTRO_MS`
    /// - `MINDMATCH_REVEAL_MS`
    /// - `MINDMATCH_SEED`
    /// - `MINDMATCH_PROGRESS_PATH`
    /// - `MINDMATCH_PROGRESS_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            intro_ms: parse_var(&lookup, "MINDMATCH_INTRO_MS")?.unwrap_or(defaults.intro_ms),
            reveal_delay_ms: parse_var(&lookup, "MINDMATCH_REVEAL_MS")?
                .unwrap_or(defaults.reveal_delay_ms),
            catalog_size: defaults.catalog_size,
            seed: parse_var(&lookup, "MINDMATCH_SEED")?,
            progress_path: lookup("MINDMATCH_PROGRESS_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            progress_key: lookup("MINDMATCH_PROGRESS_KEY")
                .filter(|k| !k.trim().is_empty())
                .unwrap_or(defaults.progress_key),
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}

//! Session Digests
//!
//! SHA-256 over a fixed field order. Two sessions that saw the same deal and
//! the same inputs hash identically, which is what replay checks compare.

use sha2::{Sha256, Digest};

/// 32-byte SHA-256 digest.
pub type StateHash = [u8; 32];

/// Field-by-field SHA-256 builder. Integers are little-endian, strings
/// length-prefixed; callers must feed fields in a stable order.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Start a digest under `domain`.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Digest for [`GameSession`](crate::game::session::GameSession) state.
    pub fn for_session_state() -> Self {
        Self::new(b"MIND_MATCH_SESSION_V1")
    }

    /// One byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Little-endian u32.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Little-endian u64.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// 0 or 1.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Tagged so that `None` and `Some(0)` differ.
    #[inline]
    pub fn update_opt_u32(&mut self, value: Option<u32>) {
        match value {
            Some(v) => {
                self.update_u8(1);
                self.update_u32(v);
            }
            None => self.update_u8(0),
        }
    }

    /// Length-prefixed UTF-8.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Consume the builder.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Session digest: level index and generation first, then whatever
/// `add_state` feeds.
pub fn compute_state_hash<F>(level_index: u32, generation: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_session_state();

    hasher.update_u32(level_index);
    hasher.update_u64(generation);

    add_state(&mut hasher);

    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================

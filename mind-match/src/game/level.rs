//! Level Catalog
//!
//! Pure mapping from a level index to its definition. No stored state, so
//! callers are free to cache or recompute.

use serde::{Serialize, Deserialize};

/// Number of levels in the catalog.
pub const CATALOG_SIZE: u32 = 50;

/// Pairs on the first level.
pub const BASE_PAIRS: u32 = 2;

/// Countdown on the first level (seconds).
pub const BASE_TIME_LIMIT_SECS: u32 = 60;

/// Shortest countdown any level gets (seconds).
pub const MIN_TIME_LIMIT_SECS: u32 = 15;

/// First level that adds distracting animations.
pub const DISTRACT_FROM_LEVEL: u32 = 10;

/// First level that deals look-alike faces.
pub const SIMILAR_FACES_FROM_LEVEL: u32 = 20;

/// Immutable description of one puzzle level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelDefinition {
    /// Zero-based catalog index
    pub index: u32,
    /// Number of face pairs on the board
    pub pair_count: u32,
    /// Grid rows (presentation hint)
    pub rows: u32,
    /// Grid columns (presentation hint)
    pub cols: u32,
    /// Countdown length, `None` for untimed levels
    pub time_limit_seconds: Option<u32>,
    /// UI should add distracting motion
    pub distract_animations: bool,
    /// Faces are drawn from a look-alike set
    pub similar_faces: bool,
}

impl LevelDefinition {
    /// Total cards on the board.
    #[inline]
    pub fn card_count(&self) -> u32 {
        self.pair_count * 2
    }

    /// Human-facing level number (1-based).
    #[inline]
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

/// Deterministic level generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelCatalog {
    max_faces: u32,
    size: u32,
}

impl LevelCatalog {
    /// Create a catalog capped by the size of the configured face pool.
    pub fn new(max_faces: u32) -> Self {
        Self::with_size(max_faces, CATALOG_SIZE)
    }

    /// Create a catalog with a custom number of levels (at least one).
    pub fn with_size(max_faces: u32, size: u32) -> Self {
        Self {
            max_faces: max_faces.max(1),
            size: size.max(1),
        }
    }

    /// Number of levels.
    pub fn len(&self) -> u32 {
        self.size
    }

    /// Always false; a catalog has at least one level.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the final level.
    pub fn last_index(&self) -> u32 {
        self.size - 1
    }

    /// Clamp an index into catalog bounds.
    #[inline]
    pub fn clamp(&self, index: u32) -> u32 {
        index.min(self.last_index())
    }

    /// Definition for `index`. Out-of-range indices reuse the last level.
    pub fn get(&self, index: u32) -> LevelDefinition {
        let index = self.clamp(index);
        let pair_count = (BASE_PAIRS + index / 2).min(self.max_faces);
        let (rows, cols) = grid_shape(pair_count);

        LevelDefinition {
            index,
            pair_count,
            rows,
            cols,
            time_limit_seconds: Some(
                BASE_TIME_LIMIT_SECS.saturating_sub(index).max(MIN_TIME_LIMIT_SECS),
            ),
            distract_animations: index >= DISTRACT_FROM_LEVEL,
            similar_faces: index >= SIMILAR_FACES_FROM_LEVEL,
        }
    }

    /// Every level in order.
    pub fn iter(&self) -> impl Iterator<Item = LevelDefinition> + '_ {
        (0..self.size).map(move |i| self.get(i))
    }
}

/// Preferred layout for a pair count, before reconciling with the card count.
fn shape_hint(pair_count: u32) -> (u32, u32) {
    match pair_count {
        0..=2 => (2, 2),
        3 => (2, 3),
        4 => (2, 4),
        5..=6 => (3, 4),
        7..=8 => (4, 4),
        9..=10 => (4, 5),
        _ => (4 + (pair_count - 10) / 3, 6),
    }
}

/// Grid shape with `rows * cols == 2 * pair_count`.
///
/// Uses the hint when it fits; otherwise the factorisation of the card count
/// (rows <= cols) nearest to the hint, ties going to the squarer grid.
pub fn grid_shape(pair_count: u32) -> (u32, u32) {
    let cards = pair_count * 2;
    let (hint_rows, hint_cols) = shape_hint(pair_count);
    if hint_rows * hint_cols == cards {
        return (hint_rows, hint_cols);
    }

    (1..=cards)
        .take_while(|r| r * r <= cards)
        .filter(|r| cards % r == 0)
        .map(|r| (r, cards / r))
        .min_by_key(|&(r, c)| (r.abs_diff(hint_rows) + c.abs_diff(hint_cols), c - r))
        .unwrap_or((1, cards))
}

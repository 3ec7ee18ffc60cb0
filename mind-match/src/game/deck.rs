//! Deck Building
//!
//! Turns a level definition and a face pool into a shuffled board where every
//! face appears exactly twice.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::RandomSource;
use crate::game::level::LevelDefinition;

// =============================================================================
// IDS
// =============================================================================

/// Unique card identifier (monotonic, never reused by a builder).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub u32);

/// Face identity shared by the two cards of a pair.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub String);

impl FaceId {
    /// Create from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// FACES
// =============================================================================

/// A face token: what the player has to match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    /// Stable identity
    pub id: FaceId,
    /// Display glyph (usually an emoji)
    pub glyph: String,
    /// Background colour as `#rrggbb`
    pub color: String,
}

impl Face {
    /// Create a face.
    pub fn new(id: impl Into<String>, glyph: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: FaceId::new(id),
            glyph: glyph.into(),
            color: color.into(),
        }
    }
}

/// Built-in faces: (id, glyph, colour).
const DEFAULT_FACES: [(&str, &str, &str); 24] = [
    ("cat", "🐱", "#f4a261"),
    ("dog", "🐶", "#e9c46a"),
    ("sun", "☀️", "#ffd166"),
    ("flower", "🌸", "#f7a1c4"),
    ("apple", "🍎", "#e63946"),
    ("tree", "🌳", "#52b788"),
    ("fish", "🐟", "#48cae4"),
    ("bird", "🐦", "#90e0ef"),
    ("house", "🏠", "#cdb4db"),
    ("star", "⭐", "#ffba08"),
    ("heart", "❤️", "#ef476f"),
    ("moon", "🌙", "#adb5bd"),
    ("car", "🚗", "#4361ee"),
    ("boat", "⛵", "#4cc9f0"),
    ("cake", "🎂", "#ffafcc"),
    ("tea", "🍵", "#a7c957"),
    ("book", "📖", "#bc6c25"),
    ("music", "🎵", "#7209b7"),
    ("umbrella", "☂️", "#3a0ca3"),
    ("key", "🔑", "#fca311"),
    ("bell", "🔔", "#f9c74f"),
    ("leaf", "🍃", "#2d6a4f"),
    ("clock", "🕰️", "#6c757d"),
    ("butterfly", "🦋", "#4895ef"),
];

/// Ordered list of distinct faces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacePool {
    faces: Vec<Face>,
}

impl Default for FacePool {
    fn default() -> Self {
        Self {
            faces: DEFAULT_FACES
                .iter()
                .map(|(id, glyph, color)| Face::new(*id, *glyph, *color))
                .collect(),
        }
    }
}

impl FacePool {
    /// Build a pool, rejecting duplicate face ids.
    pub fn new(faces: Vec<Face>) -> Result<Self, DeckError> {
        let mut seen = BTreeSet::new();
        for face in &faces {
            if !seen.insert(face.id.clone()) {
                return Err(DeckError::DuplicateFace(face.id.clone()));
            }
        }
        Ok(Self { faces })
    }

    /// Pool from bare ids, with the id doubling as glyph.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, DeckError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let faces = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                Face::new(id.clone(), id, "#ffffff")
            })
            .collect();
        Self::new(faces)
    }

    /// Number of faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Faces in pool order.
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Look a face up by id.
    pub fn get(&self, id: &FaceId) -> Option<&Face> {
        self.faces.iter().find(|f| &f.id == id)
    }
}

// =============================================================================
// CARDS
// =============================================================================

/// A single card on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique card id
    pub id: CardId,
    /// Face shared with exactly one other card
    pub face_id: FaceId,
    /// Face-up (selected or matched)
    pub flipped: bool,
    /// Pair found; never reverts
    pub matched: bool,
}

impl Card {
    /// Create a face-down card.
    pub fn new(id: CardId, face_id: FaceId) -> Self {
        Self {
            id,
            face_id,
            flipped: false,
            matched: false,
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Deck construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    /// The pool cannot cover the level.
    #[error("face pool has {available} faces, level needs {required}")]
    FacePoolTooSmall {
        /// Pairs the level needs
        required: u32,
        /// Faces the pool has
        available: u32,
    },

    /// Two faces in the pool share an id.
    #[error("duplicate face id in pool: {0}")]
    DuplicateFace(FaceId),
}

/// Builds shuffled decks with ids that are unique across every deck it deals.
#[derive(Clone, Debug, Default)]
pub struct DeckBuilder {
    next_card_id: u32,
}

impl DeckBuilder {
    /// Create a builder starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next dealt card will get.
    pub fn next_card_id(&self) -> u32 {
        self.next_card_id
    }

    /// Deal a deck for `level`.
    ///
    /// Takes the first `pair_count` faces, emits two face-down cards per face
    /// and applies a Fisher-Yates shuffle with `rng`.
    pub fn build<R: RandomSource>(
        &mut self,
        level: &LevelDefinition,
        pool: &FacePool,
        rng: &mut R,
    ) -> Result<Vec<Card>, DeckError> {
        let required = level.pair_count as usize;
        if pool.len() < required {
            return Err(DeckError::FacePoolTooSmall {
                required: level.pair_count,
                available: pool.len() as u32,
            });
        }

        let mut cards = Vec::with_capacity(required * 2);
        for face in &pool.faces()[..required] {
            for _ in 0..2 {
                cards.push(Card::new(self.allocate_id(), face.id.clone()));
            }
        }

        rng.shuffle(&mut cards);
        Ok(cards)
    }

    fn allocate_id(&mut self) -> CardId {
        let id = CardId(self.next_card_id);
        self.next_card_id = self.next_card_id.wrapping_add(1);
        id
    }
}

/// Count how many cards carry each face.
pub fn face_counts(cards: &[Card]) -> std::collections::BTreeMap<&FaceId, u32> {
    let mut counts = std::collections::BTreeMap::new();
    for card in cards {
        *counts.entry(&card.face_id).or_insert(0) += 1;
    }
    counts
}

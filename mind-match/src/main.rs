//! Mind Match Demo
//!
//! Plays a run of levels with a memory-keeping auto-player on virtual time,
//! records outcomes through the progress controller and checks that every
//! session replays to the same state hash.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mind_match::{
    VERSION,
    config::EngineConfig,
    controller::GameController,
    core::clock::ManualClock,
    game::{
        deck::{Card, CardId, FaceId, FacePool},
        events::{GameEvent, GameEventData},
    },
    progress::{JsonFileStore, MemoryStore, ProgressStore},
};

/// Levels the demo plays before stopping.
const DEMO_LEVELS: u32 = 8;

/// Selections allowed per level before the demo gives up.
const MAX_SELECTIONS: u32 = 1_000;

type DemoController = GameController<ManualClock, Box<dyn ProgressStore>>;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Mind Match v{}", VERSION);

    let config = EngineConfig::from_env().context("reading MINDMATCH_* environment")?;
    info!(
        "Intro: {} ms, reveal delay: {} ms, {} levels",
        config.intro_ms, config.reveal_delay_ms, config.catalog_size
    );

    let store: Box<dyn ProgressStore> = match &config.progress_path {
        Some(path) => {
            info!("Progress file: {}", path.display());
            Box::new(
                JsonFileStore::open(path.clone())
                    .with_context(|| format!("opening progress file {}", path.display()))?,
            )
        }
        None => {
            info!("Progress kept in memory (set MINDMATCH_PROGRESS_PATH to persist)");
            Box::new(MemoryStore::new())
        }
    };

    let mut controller = GameController::from_config(
        config.clone(),
        FacePool::default(),
        ManualClock::new(),
        store,
    )?;

    info!("Resuming at level {}", controller.resume_level() + 1);

    for _ in 0..DEMO_LEVELS {
        let index = controller.resume_level();
        play_level(&mut controller, index, &config)?;
    }

    if controller.progress().has_pending_write() {
        if let Err(e) = controller.flush_progress() {
            warn!("Progress still unsaved: {}", e);
        }
    }

    info!("=== Done ===");
    info!("Highest unlocked level: {}", controller.progress().max_unlocked() + 1);
    Ok(())
}

/// Play one level to completion, then verify it by replay.
fn play_level(controller: &mut DemoController, index: u32, config: &EngineConfig) -> Result<()> {
    let snapshot = controller.start_level(index)?;
    info!(
        "=== Level {}: {} pairs on {}x{}, {:?}s ===",
        index + 1,
        snapshot.pair_count,
        snapshot.rows,
        snapshot.cols,
        snapshot.time_remaining,
    );

    let mut player = AutoPlayer::default();
    controller.advance(config.intro_ms);

    let mut selections = 0;
    let outcome = loop {
        let snapshot = controller.snapshot().context("session vanished mid-level")?;
        if let Some(outcome) = snapshot.outcome {
            break outcome;
        }
        if selections >= MAX_SELECTIONS {
            bail!("auto-player stalled on level {}", index + 1);
        }

        let Some(first) = player.pick_first(&snapshot.cards) else {
            bail!("no selectable card on level {}", index + 1);
        };
        controller.select_card(first)?;
        player.observe(&controller.take_events());

        let Some(second) = player.pick_second(&snapshot.cards, first) else {
            bail!("no partner card on level {}", index + 1);
        };
        controller.select_card(second)?;
        player.observe(&controller.take_events());
        selections += 2;

        controller.advance(config.reveal_delay_ms);
        player.observe(&controller.take_events());
    };

    info!(
        "Level {} finished: {:?} after {} attempts ({} of {} pairs, {:?}s left)",
        index + 1,
        outcome.kind,
        outcome.attempts,
        outcome.matched_pairs,
        snapshot.pair_count,
        outcome.time_remaining,
    );

    // Verify determinism by replaying
    let live = controller
        .session()
        .map(|s| s.compute_hash())
        .context("session vanished after completion")?;
    let journal = controller.journal().context("no journal for finished session")?;
    let replayed = journal.replay_hash()?;

    info!("Final State Hash:  {}", hex::encode(live));
    info!("Replay State Hash: {}", hex::encode(replayed));

    if live != replayed {
        bail!("DETERMINISM FAILURE on level {}: hashes differ", index + 1);
    }
    info!("DETERMINISM VERIFIED: {} inputs replayed", journal.events.len());
    Ok(())
}

/// Remembers every face it has seen and pairs them up when it can.
///
/// Only learns faces from flip events, never by peeking at face-down cards.
#[derive(Default)]
struct AutoPlayer {
    seen: BTreeMap<CardId, FaceId>,
}

impl AutoPlayer {
    fn observe(&mut self, events: &[GameEvent]) {
        for event in events {
            match &event.data {
                GameEventData::CardFlipped { card_id, face_id } => {
                    self.seen.insert(*card_id, face_id.clone());
                }
                GameEventData::PairMatched { face_id, matched_pairs, .. } => {
                    debug!("Matched {} ({} pairs)", face_id, matched_pairs);
                }
                _ => {}
            }
        }
    }

    /// Half of a known pair, else a card never seen, else anything open.
    fn pick_first(&self, cards: &[Card]) -> Option<CardId> {
        let open: Vec<&Card> = cards.iter().filter(|c| !c.matched).collect();

        for card in &open {
            if let Some(face) = self.seen.get(&card.id) {
                if self.partner_of(&open, card.id, face).is_some() {
                    return Some(card.id);
                }
            }
        }

        open.iter()
            .find(|c| !self.seen.contains_key(&c.id))
            .or_else(|| open.first())
            .map(|c| c.id)
    }

    /// The remembered partner of `first`, else a card never seen.
    fn pick_second(&self, cards: &[Card], first: CardId) -> Option<CardId> {
        let open: Vec<&Card> = cards.iter().filter(|c| !c.matched && c.id != first).collect();

        if let Some(face) = self.seen.get(&first) {
            if let Some(partner) = self.partner_of(&open, first, face) {
                return Some(partner);
            }
        }

        open.iter()
            .find(|c| !self.seen.contains_key(&c.id))
            .or_else(|| open.first())
            .map(|c| c.id)
    }

    fn partner_of(&self, open: &[&Card], card: CardId, face: &FaceId) -> Option<CardId> {
        open.iter()
            .map(|c| c.id)
            .find(|id| *id != card && self.seen.get(id) == Some(face))
    }
}

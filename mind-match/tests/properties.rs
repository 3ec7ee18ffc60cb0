//! Invariants over arbitrary seeds, levels and input sequences.

use proptest::prelude::*;

use mind_match::{
    core::rng::{DeterministicRng, RandomSource},
    game::{
        deck::{face_counts, CardId, DeckBuilder, FacePool},
        level::{LevelCatalog, CATALOG_SIZE},
        session::{GameSession, Outcome, OutcomeKind, SessionStatus},
        step::{replay_session, step, SessionEvent},
    },
    progress::{MemoryStore, ProgressController},
};

fn check_board(session: &GameSession) {
    assert!(session.flipped_ids().len() <= 2);
    for card in session.cards() {
        let expected = card.matched || session.flipped_ids().contains(&card.id);
        assert_eq!(card.flipped, expected);
    }
    let matched = session.cards().iter().filter(|c| c.matched).count() as u32;
    assert_eq!(matched, session.matched_pairs() * 2);
    if session.status() == SessionStatus::Complete {
        assert!(session.outcome().is_some());
    }
}

/// Map an arbitrary byte onto a session input, biased towards selections.
fn to_event(op: u8, arg: u8, card_count: u32) -> SessionEvent {
    match op % 8 {
        0 => SessionEvent::IntroElapsed,
        1 => SessionEvent::RevealElapsed,
        2 => SessionEvent::Tick,
        // A few ids past the deck to exercise UnknownCard.
        _ => SessionEvent::SelectCard(CardId(arg as u32 % (card_count + 2))),
    }
}

proptest! {
    #[test]
    fn catalog_is_pure_and_consistent(index in 0u32..200, faces in 2u32..64) {
        let catalog = LevelCatalog::new(faces);
        let level = catalog.get(index);
        prop_assert_eq!(level, catalog.get(index));
        prop_assert_eq!(level.rows * level.cols, level.pair_count * 2);
        prop_assert!(level.pair_count >= 2 || faces < 2);
        prop_assert!(level.pair_count <= faces);
        prop_assert!(level.index < CATALOG_SIZE);
        prop_assert!(level.time_limit_seconds.unwrap_or(u32::MAX) >= 15);
    }

    #[test]
    fn every_face_appears_exactly_twice(seed in any::<u64>(), index in 0u32..CATALOG_SIZE) {
        let pool = FacePool::default();
        let level = LevelCatalog::new(pool.len() as u32).get(index);
        let deck = DeckBuilder::new()
            .build(&level, &pool, &mut DeterministicRng::new(seed))
            .unwrap();

        prop_assert_eq!(deck.len() as u32, level.card_count());
        let counts = face_counts(&deck);
        prop_assert_eq!(counts.len() as u32, level.pair_count);
        prop_assert!(counts.values().all(|n| *n == 2));

        let mut ids: Vec<u32> = deck.iter().map(|c| c.id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), deck.len());
    }

    #[test]
    fn shuffle_is_a_permutation(seed in any::<u64>(), mut items in prop::collection::vec(any::<u16>(), 0..64)) {
        let mut shuffled = items.clone();
        DeterministicRng::new(seed).shuffle(&mut shuffled);
        items.sort_unstable();
        shuffled.sort_unstable();
        prop_assert_eq!(items, shuffled);
    }

    #[test]
    fn board_invariants_hold_under_any_input(
        seed in any::<u64>(),
        index in 0u32..12,
        ops in prop::collection::vec((any::<u8>(), any::<u8>()), 0..200),
    ) {
        let pool = FacePool::default();
        let level = LevelCatalog::new(pool.len() as u32).get(index);
        let deck = DeckBuilder::new()
            .build(&level, &pool, &mut DeterministicRng::new(seed))
            .unwrap();
        let mut session = GameSession::new(level, deck.clone()).unwrap();

        let mut events = vec![SessionEvent::Start];
        step(&mut session, SessionEvent::Start).unwrap();
        let mut outcomes = 0;

        for (op, arg) in ops {
            let event = to_event(op, arg, level.card_count());
            let before = session.matched_pairs();
            let result = step(&mut session, event.clone()).unwrap();
            events.push(event);

            prop_assert!(session.matched_pairs() >= before);
            if result.outcome.is_some() {
                outcomes += 1;
            }
            check_board(&session);
        }

        prop_assert!(outcomes <= 1);
        if let Some(outcome) = session.outcome() {
            if outcome.kind == OutcomeKind::Matched {
                prop_assert_eq!(outcome.matched_pairs, level.pair_count);
            }
        }

        // Same inputs, same state.
        let (replayed, _) = replay_session(level, deck, &events).unwrap();
        prop_assert_eq!(replayed.compute_hash(), session.compute_hash());
    }

    #[test]
    fn progress_never_regresses(results in prop::collection::vec((0u32..60, any::<bool>()), 0..50)) {
        let mut progress = ProgressController::load(MemoryStore::new(), CATALOG_SIZE);
        let mut previous = progress.max_unlocked();

        for (level_index, won) in results {
            let outcome = Outcome {
                kind: if won { OutcomeKind::Matched } else { OutcomeKind::Timeout },
                attempts: 1,
                level_index,
                matched_pairs: 0,
                time_remaining: None,
            };
            progress.on_outcome(&outcome).unwrap();

            let now = progress.max_unlocked();
            prop_assert!(now >= previous);
            prop_assert!(progress.resume() < CATALOG_SIZE);
            if !won {
                prop_assert_eq!(now, previous);
            }
            previous = now;
        }

        let store = progress.into_store();
        let reloaded = ProgressController::load(store, CATALOG_SIZE);
        prop_assert_eq!(reloaded.max_unlocked(), previous);
    }
}

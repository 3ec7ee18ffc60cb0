//! Game Controller
//!
//! Host-side driver for one player. Owns the active session, the clock
//! handles, the RNG and the progress controller, and routes clock firings
//! into the reducer.
//!
//! Every timer is stamped with the controller's epoch. Starting, restarting
//! or leaving a level cancels the outstanding handles and bumps the epoch, so
//! a firing that slips through anyway is dropped instead of mutating the new
//! session.

use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::clock::{CancelHandle, Clock, Fired, Timer, TimerKind};
use crate::core::hash::StateHash;
use crate::core::rng::{DeterministicRng, RandomSource};
use crate::error::EngineError;
use crate::game::deck::{Card, CardId, DeckBuilder, DeckError, FacePool};
use crate::game::events::GameEvent;
use crate::game::level::{LevelCatalog, LevelDefinition, BASE_PAIRS};
use crate::game::session::{
    GameSession, Outcome, RejectReason, SelectResult, SessionError, SessionSnapshot,
};
use crate::game::step::{replay_session, step, Effect, SessionEvent, StepResult};
use crate::progress::controller::ProgressController;
use crate::progress::store::ProgressStore;

#[derive(Debug, Default)]
struct TimerHandles {
    intro: Option<CancelHandle>,
    reveal: Option<CancelHandle>,
    countdown: Option<CancelHandle>,
}

impl TimerHandles {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<CancelHandle> {
        match kind {
            TimerKind::Intro => &mut self.intro,
            TimerKind::Reveal => &mut self.reveal,
            TimerKind::Countdown => &mut self.countdown,
        }
    }
}

/// Everything fed into the current session since it was dealt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionJournal {
    /// Level played
    pub level: LevelDefinition,
    /// Deck as first dealt
    pub deck: Vec<Card>,
    /// Reducer inputs in delivery order
    pub events: Vec<SessionEvent>,
}

impl SessionJournal {
    /// Re-run the journal from scratch and hash the result.
    pub fn replay_hash(&self) -> Result<StateHash, SessionError> {
        let (session, _) = replay_session(self.level, self.deck.clone(), &self.events)?;
        Ok(session.compute_hash())
    }
}

/// Drives sessions against a clock and persists progress.
pub struct GameController<C, S, R = DeterministicRng> {
    config: EngineConfig,
    catalog: LevelCatalog,
    pool: FacePool,
    builder: DeckBuilder,
    rng: R,
    clock: C,
    progress: ProgressController<S>,
    session: Option<GameSession>,
    journal: Option<SessionJournal>,
    handles: TimerHandles,
    epoch: u64,
    events: Vec<GameEvent>,
    last_outcome: Option<Outcome>,
}

impl<C: Clock, S: ProgressStore> GameController<C, S, DeterministicRng> {
    /// Create a controller seeded from config (or entropy if unset).
    pub fn from_config(
        config: EngineConfig,
        pool: FacePool,
        clock: C,
        store: S,
    ) -> Result<Self, EngineError> {
        let rng = match config.seed {
            Some(seed) => DeterministicRng::new(seed),
            None => DeterministicRng::from_entropy(),
        };
        Self::new(config, pool, clock, store, rng)
    }
}

impl<C: Clock, S: ProgressStore, R: RandomSource> GameController<C, S, R> {
    /// Create a controller.
    ///
    /// Fails if the face pool cannot deal the first level.
    pub fn new(
        config: EngineConfig,
        pool: FacePool,
        clock: C,
        store: S,
        rng: R,
    ) -> Result<Self, EngineError> {
        if pool.len() < BASE_PAIRS as usize {
            return Err(DeckError::FacePoolTooSmall {
                required: BASE_PAIRS,
                available: pool.len() as u32,
            }
            .into());
        }

        let catalog = LevelCatalog::with_size(pool.len() as u32, config.catalog_size);
        let progress = ProgressController::load_with_key(store, config.progress_key.clone(), catalog.len());
        info!(
            levels = catalog.len(),
            faces = pool.len(),
            unlocked = progress.max_unlocked(),
            "game controller ready"
        );

        Ok(Self {
            config,
            catalog,
            pool,
            builder: DeckBuilder::new(),
            rng,
            clock,
            progress,
            session: None,
            journal: None,
            handles: TimerHandles::default(),
            epoch: 0,
            events: Vec::new(),
            last_outcome: None,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Level catalog in use.
    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    /// Face pool in use.
    pub fn face_pool(&self) -> &FacePool {
        &self.pool
    }

    /// Active session, if any.
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    /// Snapshot of the active session.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(GameSession::snapshot)
    }

    /// Progress controller.
    pub fn progress(&self) -> &ProgressController<S> {
        &self.progress
    }

    /// Clock in use.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Inputs recorded for the active session.
    pub fn journal(&self) -> Option<&SessionJournal> {
        self.journal.as_ref()
    }

    /// Most recent terminal outcome.
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// Level to resume at.
    pub fn resume_level(&self) -> u32 {
        self.progress.resume()
    }

    /// Drain session events produced since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // -------------------------------------------------------------------------
    // Level lifecycle
    // -------------------------------------------------------------------------

    /// Deal and start a level. Any running session is abandoned first.
    pub fn start_level(&mut self, index: u32) -> Result<SessionSnapshot, EngineError> {
        let level = self.catalog.get(index);
        let deck = self.builder.build(&level, &self.pool, &mut self.rng)?;
        let session = GameSession::new(level, deck.clone())?;

        self.leave();
        info!(level = level.index, pairs = level.pair_count, "starting level");

        self.session = Some(session);
        self.journal = Some(SessionJournal { level, deck, events: Vec::new() });
        let result = self.run(SessionEvent::Start)?;
        self.absorb(result);
        self.snapshot().ok_or(EngineError::NoActiveSession)
    }

    /// Start at the highest unlocked level.
    pub fn resume(&mut self) -> Result<SessionSnapshot, EngineError> {
        self.start_level(self.resume_level())
    }

    /// Same level, fresh shuffle.
    pub fn restart(&mut self) -> Result<SessionSnapshot, EngineError> {
        let level = *self
            .session
            .as_ref()
            .ok_or(EngineError::NoActiveSession)?
            .level();
        let deck = self.builder.build(&level, &self.pool, &mut self.rng)?;

        self.cancel_timers();
        self.epoch += 1;
        info!(level = level.index, "restarting level");

        let result = self.run(SessionEvent::Restart(deck))?;
        self.absorb(result);
        self.snapshot().ok_or(EngineError::NoActiveSession)
    }

    /// Move on to the next level (the last level repeats).
    pub fn advance_level(&mut self) -> Result<SessionSnapshot, EngineError> {
        let current = self
            .session
            .as_ref()
            .ok_or(EngineError::NoActiveSession)?
            .level()
            .index;
        self.start_level(self.catalog.clamp(current + 1))
    }

    /// Abandon the current session, cancelling its timers.
    pub fn leave(&mut self) {
        self.cancel_timers();
        self.epoch += 1;
        self.journal = None;
        if let Some(session) = self.session.take() {
            debug!(level = session.level().index, status = ?session.status(), "session discarded");
        }
    }

    // -------------------------------------------------------------------------
    // Input & time
    // -------------------------------------------------------------------------

    /// Forward a card tap to the session.
    pub fn select_card(&mut self, id: CardId) -> Result<SelectResult, EngineError> {
        let mut result = self.run(SessionEvent::SelectCard(id))?;
        let selection = match result.selection.take() {
            Some(selection) => selection,
            None => {
                warn!(card = id.0, "select step returned no selection");
                let status = self.session.as_ref().map(GameSession::status).unwrap_or_default();
                SelectResult::Rejected(RejectReason::NotPlaying(status))
            }
        };
        if let SelectResult::Rejected(reason) = selection {
            debug!(card = id.0, ?reason, "selection rejected");
        }
        self.absorb(result);
        Ok(selection)
    }

    /// Let `ms` milliseconds pass, delivering every timer that comes due.
    ///
    /// Returns the outcome if the session resolved during this window.
    pub fn advance(&mut self, ms: u64) -> Option<Outcome> {
        let deadline = self.clock.now_ms().saturating_add(ms);
        let mut outcome = None;
        while let Some(fired) = self.clock.pop_due(deadline) {
            if let Some(o) = self.dispatch(fired) {
                outcome = Some(o);
            }
        }
        self.clock.advance_to(deadline);
        outcome
    }

    /// Deliver whatever is due right now (wall-clock hosts).
    pub fn pump(&mut self) -> Option<Outcome> {
        self.advance(0)
    }

    /// Retry a progress write that failed earlier.
    pub fn flush_progress(&mut self) -> Result<(), EngineError> {
        self.progress.flush().map_err(EngineError::from)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn dispatch(&mut self, fired: Fired) -> Option<Outcome> {
        let kind = fired.timer.kind;
        let current = *self.handles.slot(kind);
        if fired.timer.generation != self.epoch || current != Some(fired.handle) {
            debug!(?kind, handle = fired.handle.0, "dropping stale timer");
            return None;
        }

        #[cfg(feature = "debug-tracing")]
        tracing::trace!(?kind, at_ms = fired.at_ms, "timer fired");

        let event = match kind {
            TimerKind::Intro => {
                self.handles.intro = None;
                SessionEvent::IntroElapsed
            }
            TimerKind::Reveal => {
                self.handles.reveal = None;
                SessionEvent::RevealElapsed
            }
            TimerKind::Countdown => SessionEvent::Tick,
        };

        match self.run(event) {
            Ok(result) => {
                let outcome = result.outcome;
                self.absorb(result);
                outcome
            }
            Err(e) => {
                warn!(error = %e, "timer step failed");
                None
            }
        }
    }

    /// Step the active session and journal the input.
    fn run(&mut self, event: SessionEvent) -> Result<StepResult, EngineError> {
        let session = self.session.as_mut().ok_or(EngineError::NoActiveSession)?;
        if let Some(journal) = self.journal.as_mut() {
            journal.events.push(event.clone());
        }
        Ok(step(session, event)?)
    }

    fn absorb(&mut self, result: StepResult) {
        for effect in &result.effects {
            self.apply_effect(*effect);
        }
        self.events.extend(result.events);

        if let Some(outcome) = result.outcome {
            self.on_outcome(outcome);
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleIntro => {
                self.cancel(TimerKind::Intro);
                let timer = Timer::new(TimerKind::Intro, self.epoch);
                self.handles.intro = Some(self.clock.after(self.config.intro_ms, timer));
            }
            Effect::ScheduleReveal => {
                self.cancel(TimerKind::Reveal);
                let timer = Timer::new(TimerKind::Reveal, self.epoch);
                self.handles.reveal = Some(self.clock.after(self.config.reveal_delay_ms, timer));
            }
            Effect::StartCountdown => {
                self.cancel(TimerKind::Countdown);
                let timer = Timer::new(TimerKind::Countdown, self.epoch);
                self.handles.countdown = Some(self.clock.every_second(timer));
            }
            Effect::StopCountdown => self.cancel(TimerKind::Countdown),
            Effect::CancelReveal => self.cancel(TimerKind::Reveal),
        }
    }

    fn on_outcome(&mut self, outcome: Outcome) {
        info!(
            level = outcome.level_index,
            kind = ?outcome.kind,
            attempts = outcome.attempts,
            "session complete"
        );
        self.last_outcome = Some(outcome);

        match self.progress.on_outcome(&outcome) {
            Ok(true) => debug!(unlocked = self.progress.max_unlocked(), "new level unlocked"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "progress kept in memory, save will be retried"),
        }
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles.slot(kind).take() {
            self.clock.cancel(handle);
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel(TimerKind::Intro);
        self.cancel(TimerKind::Reveal);
        self.cancel(TimerKind::Countdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::{ManualClock, SystemClock};
    use crate::game::session::{OutcomeKind, SessionStatus};
    use crate::progress::store::MemoryStore;

    fn controller() -> GameController<ManualClock, MemoryStore> {
        controller_on(ManualClock::new())
    }

    fn controller_on<C: Clock>(clock: C) -> GameController<C, MemoryStore> {
        let config = EngineConfig {
            seed: Some(11),
            ..EngineConfig::default()
        };
        GameController::from_config(config, FacePool::default(), clock, MemoryStore::new()).unwrap()
    }

    /// Acknowledges cancellations but keeps delivering the timers.
    #[derive(Default)]
    struct LeakyClock(ManualClock);

    impl Clock for LeakyClock {
        fn now_ms(&self) -> u64 {
            self.0.now_ms()
        }

        fn after(&mut self, delay_ms: u64, timer: Timer) -> CancelHandle {
            self.0.after(delay_ms, timer)
        }

        fn every_second(&mut self, timer: Timer) -> CancelHandle {
            self.0.every_second(timer)
        }

        fn cancel(&mut self, _handle: CancelHandle) -> bool {
            true
        }

        fn pop_due(&mut self, deadline_ms: u64) -> Option<Fired> {
            self.0.pop_due(deadline_ms)
        }

        fn advance_to(&mut self, deadline_ms: u64) {
            self.0.advance_to(deadline_ms)
        }
    }

    fn pair_of(cards: &[Card], first: &Card) -> CardId {
        cards
            .iter()
            .find(|c| c.id != first.id && c.face_id == first.face_id)
            .unwrap()
            .id
    }

    #[test]
    fn test_intro_then_playing() {
        let mut ctl = controller();
        let snapshot = ctl.start_level(0).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Intro);

        ctl.advance(1_999);
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Intro);

        ctl.advance(1);
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Playing);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, Some(60));

        ctl.advance(1_000);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, Some(59));
    }

    #[test]
    fn test_select_without_session() {
        let mut ctl = controller();
        assert!(matches!(
            ctl.select_card(CardId(0)),
            Err(EngineError::NoActiveSession)
        ));
        assert!(matches!(ctl.restart(), Err(EngineError::NoActiveSession)));
    }

    #[test]
    fn test_timeout_outcome_reported() {
        let mut ctl = controller();
        ctl.start_level(0).unwrap();

        let outcome = ctl.advance(2_000 + 60_000).unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Timeout);
        assert_eq!(ctl.progress().max_unlocked(), 0);
        assert_eq!(ctl.clock().pending(), 0);
    }

    #[test]
    fn test_leave_cancels_everything() {
        let mut ctl = controller();
        ctl.start_level(0).unwrap();
        ctl.advance(2_000);
        assert!(ctl.clock().pending() > 0);

        ctl.leave();
        assert!(ctl.session().is_none());
        assert_eq!(ctl.clock().pending(), 0);
        assert!(ctl.advance(120_000).is_none());
    }

    #[test]
    fn test_journal_replays_to_same_hash() {
        let mut ctl = controller();
        let snapshot = ctl.start_level(3).unwrap();
        ctl.advance(2_000);
        ctl.select_card(snapshot.cards[0].id).unwrap();
        ctl.select_card(snapshot.cards[1].id).unwrap();
        ctl.advance(1_500);
        ctl.restart().unwrap();
        ctl.advance(4_000);

        let live = ctl.session().unwrap().compute_hash();
        let journal = ctl.journal().unwrap();
        assert_eq!(journal.events.first(), Some(&SessionEvent::Start));
        assert_eq!(journal.replay_hash().unwrap(), live);
    }

    #[test]
    fn test_tiny_pool_rejected() {
        let pool = FacePool::from_ids(["cat"]).unwrap();
        let result = GameController::from_config(
            EngineConfig::default(),
            pool,
            ManualClock::new(),
            MemoryStore::new(),
        );
        assert!(matches!(
            result,
            Err(EngineError::Deck(DeckError::FacePoolTooSmall { .. }))
        ));
    }

    #[test]
    fn test_select_after_completion_rejected() {
        let mut ctl = controller();
        let snapshot = ctl.start_level(0).unwrap();
        ctl.advance(2_000 + 60_000);

        let result = ctl.select_card(snapshot.cards[0].id).unwrap();
        assert_eq!(
            result,
            SelectResult::Rejected(RejectReason::NotPlaying(SessionStatus::Complete))
        );
    }

    #[test]
    fn test_old_timers_ignored_after_restart() {
        let mut ctl = controller_on(LeakyClock::default());
        let snapshot = ctl.start_level(2).unwrap();
        assert_eq!(snapshot.time_remaining, Some(58));
        ctl.advance(2_000);

        let first = &snapshot.cards[0];
        let other = snapshot.cards.iter().find(|c| c.face_id != first.face_id).unwrap();
        ctl.select_card(first.id).unwrap();
        assert_eq!(
            ctl.select_card(other.id).unwrap(),
            SelectResult::Revealing { is_match: false }
        );

        // Old reveal and countdown both fire inside the new intro.
        ctl.restart().unwrap();
        ctl.advance(1_999);
        let snapshot = ctl.snapshot().unwrap();
        assert_eq!(snapshot.status, SessionStatus::Intro);
        assert_eq!(snapshot.attempts, 0);
        assert_eq!(snapshot.time_remaining, Some(58));
        assert!(snapshot.cards.iter().all(|c| !c.flipped));

        ctl.advance(1);
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Playing);

        // One second off the clock per second, not two.
        ctl.advance(3_000);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, Some(55));
        let live = ctl.session().unwrap().compute_hash();
        assert_eq!(ctl.journal().unwrap().replay_hash().unwrap(), live);
    }

    #[test]
    fn test_old_timers_ignored_after_leave() {
        let mut ctl = controller_on(LeakyClock::default());
        let snapshot = ctl.start_level(0).unwrap();
        ctl.advance(2_000);
        ctl.select_card(snapshot.cards[0].id).unwrap();
        ctl.take_events();

        ctl.leave();
        assert!(ctl.clock().0.pending() > 0);
        assert!(ctl.advance(120_000).is_none());
        assert!(ctl.session().is_none());
        assert!(ctl.last_outcome().is_none());
        assert!(ctl.take_events().is_empty());
    }

    #[test]
    fn test_finished_session_timers_ignored_on_next_level() {
        let mut ctl = controller_on(LeakyClock::default());
        let snapshot = ctl.start_level(0).unwrap();
        ctl.advance(2_000);

        let mut outcome = None;
        let mut done: Vec<CardId> = Vec::new();
        for card in &snapshot.cards {
            if done.contains(&card.id) {
                continue;
            }
            let partner = pair_of(&snapshot.cards, card);
            ctl.select_card(card.id).unwrap();
            ctl.select_card(partner).unwrap();
            outcome = ctl.advance(1_000).or(outcome);
            done.extend([card.id, partner]);
        }
        let outcome = outcome.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Matched);
        let left = outcome.time_remaining;

        // Countdown was only told to stop; it still fires on the finished board.
        ctl.advance(3_000);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, left);
        assert_eq!(ctl.last_outcome(), Some(outcome));

        let next = ctl.advance_level().unwrap();
        assert_eq!(next.level_index, 1);
        ctl.advance(2_000);
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Playing);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, Some(59));

        ctl.advance(3_000);
        assert_eq!(ctl.snapshot().unwrap().time_remaining, Some(56));
        assert_eq!(ctl.progress().max_unlocked(), 1);
    }

    #[test]
    fn test_pump_delivers_due_timers_on_system_clock() {
        let config = EngineConfig {
            seed: Some(11),
            intro_ms: 0,
            ..EngineConfig::default()
        };
        let mut ctl =
            GameController::from_config(config, FacePool::default(), SystemClock::new(), MemoryStore::new())
                .unwrap();
        assert_eq!(ctl.start_level(0).unwrap().status, SessionStatus::Intro);

        assert!(ctl.pump().is_none());
        assert_eq!(ctl.snapshot().unwrap().status, SessionStatus::Playing);
    }
}

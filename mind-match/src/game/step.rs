//! Session Reducer
//!
//! `(session, event) -> session'` plus the timer effects the host has to
//! apply. The reducer never touches a clock; it only says what to schedule
//! or cancel, so it can be replayed and tested without any time source.

use serde::{Serialize, Deserialize};

use crate::game::deck::{Card, CardId};
use crate::game::events::GameEvent;
use crate::game::level::LevelDefinition;
use crate::game::session::{GameSession, Outcome, SelectResult, SessionError, SessionStatus};

/// Inputs the session reacts to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Begin the intro
    Start,
    /// Intro delay elapsed
    IntroElapsed,
    /// Player tapped a card
    SelectCard(CardId),
    /// Reveal delay elapsed
    RevealElapsed,
    /// One countdown second
    Tick,
    /// Start over with a freshly dealt deck
    Restart(Vec<Card>),
}

/// Timer work the host must perform after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Schedule the intro delay
    ScheduleIntro,
    /// Schedule the reveal delay
    ScheduleReveal,
    /// Start the one-second countdown
    StartCountdown,
    /// Stop the countdown
    StopCountdown,
    /// Drop a pending reveal
    CancelReveal,
}

/// Result of one step.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Set for `SelectCard` events
    pub selection: Option<SelectResult>,
    /// Timer work for the host, in order
    pub effects: Vec<Effect>,
    /// Events generated this step
    pub events: Vec<GameEvent>,
    /// Set on the step that completed the session
    pub outcome: Option<Outcome>,
}

impl StepResult {
    /// Whether the session resolved in this step.
    pub fn completed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Apply one event to the session.
///
/// Only `Restart` with a malformed deck can fail; every other rejected input
/// is reported through `StepResult::selection` or simply changes nothing.
pub fn step(session: &mut GameSession, event: SessionEvent) -> Result<StepResult, SessionError> {
    let mut result = StepResult::default();
    let before = session.status();

    match event {
        SessionEvent::Start => {
            session.start();
            result.effects.extend([Effect::CancelReveal, Effect::StopCountdown, Effect::ScheduleIntro]);
        }
        SessionEvent::Restart(deck) => {
            session.restart(deck)?;
            result.effects.extend([Effect::CancelReveal, Effect::StopCountdown, Effect::ScheduleIntro]);
        }
        SessionEvent::IntroElapsed => {
            if session.intro_elapsed() && session.time_remaining().is_some() {
                result.effects.push(Effect::StartCountdown);
            }
        }
        SessionEvent::SelectCard(id) => {
            let selection = session.select_card(id);
            if matches!(selection, SelectResult::Revealing { .. }) {
                result.effects.push(Effect::ScheduleReveal);
            }
            result.selection = Some(selection);
        }
        SessionEvent::RevealElapsed => {
            session.reveal_elapsed();
        }
        SessionEvent::Tick => {
            session.tick();
        }
    }

    if session.status() == SessionStatus::Complete && before != SessionStatus::Complete {
        result.effects.extend([Effect::CancelReveal, Effect::StopCountdown]);
        result.outcome = session.outcome();
    }

    result.events = session.take_events();
    Ok(result)
}

/// Value-level reducer: leaves `session` untouched and returns the next state.
pub fn reduce(
    session: &GameSession,
    event: SessionEvent,
) -> Result<(GameSession, StepResult), SessionError> {
    let mut next = session.clone();
    let result = step(&mut next, event)?;
    Ok((next, result))
}

/// Replay a session from a recorded event list.
///
/// Returns final session and all events.
pub fn replay_session(
    level: LevelDefinition,
    deck: Vec<Card>,
    events: &[SessionEvent],
) -> Result<(GameSession, Vec<GameEvent>), SessionError> {
    let mut session = GameSession::new(level, deck)?;
    let mut all_events = Vec::new();

    for event in events {
        let result = step(&mut session, event.clone())?;
        all_events.extend(result.events);
    }

    Ok((session, all_events))
}

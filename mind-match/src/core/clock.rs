//! Clock Abstraction
//!
//! Delayed and periodic timers for the intro, the reveal delay and the
//! countdown. The engine never sleeps: timers are queued here and delivered
//! to the session driver through [`Clock::pop_due`].
//!
//! ## Ordering
//!
//! Timers due at the same instant are delivered by [`TimerKind`] priority,
//! countdown first. This is what makes a timeout win over a match that
//! resolves on the same clock edge.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Serialize, Deserialize};

/// Milliseconds per countdown step.
pub const SECOND_MS: u64 = 1000;

/// Handle returned for every scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CancelHandle(pub u64);

/// What a timer is for.
///
/// Declaration order is delivery priority at equal due times.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TimerKind {
    /// One-second countdown step
    Countdown = 0,
    /// End of the two-card reveal window
    Reveal = 1,
    /// End of the intro screen
    Intro = 2,
}

/// A scheduled timer token, stamped with the session generation it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Timer purpose
    pub kind: TimerKind,
    /// Session generation that scheduled it
    pub generation: u64,
}

impl Timer {
    /// Create a timer token.
    pub const fn new(kind: TimerKind, generation: u64) -> Self {
        Self { kind, generation }
    }
}

/// A timer that came due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    /// Handle it was scheduled under
    pub handle: CancelHandle,
    /// The token
    pub timer: Timer,
    /// Instant it was due at
    pub at_ms: u64,
}

/// Time source and timer scheduler consumed by the engine.
///
/// Contract: each one-shot timer is delivered at most once, periodic timers
/// once per period, and nothing is delivered after [`Clock::cancel`].
pub trait Clock {
    /// Current time in milliseconds since the clock's origin.
    fn now_ms(&self) -> u64;

    /// Schedule a one-shot timer `delay_ms` from now.
    fn after(&mut self, delay_ms: u64, timer: Timer) -> CancelHandle;

    /// Schedule a timer firing every second, starting one second from now.
    fn every_second(&mut self, timer: Timer) -> CancelHandle;

    /// Cancel a timer. Returns false if it was unknown or already spent.
    fn cancel(&mut self, handle: CancelHandle) -> bool;

    /// Deliver the earliest timer due at or before `deadline_ms`.
    fn pop_due(&mut self, deadline_ms: u64) -> Option<Fired>;

    /// Move to `deadline_ms` once everything due has been delivered.
    ///
    /// Virtual clocks jump; wall clocks ignore it.
    fn advance_to(&mut self, deadline_ms: u64);
}

// =============================================================================
// TIMER QUEUE
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    due_ms: u64,
    kind: TimerKind,
    handle: CancelHandle,
}

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    timer: Timer,
    period_ms: Option<u64>,
}

/// Pending timers ordered by due time, then priority, then scheduling order.
#[derive(Clone, Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    pending: BTreeMap<QueueKey, Scheduled>,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a timer due at `due_ms`, repeating every `period_ms` if set.
    pub fn schedule(&mut self, due_ms: u64, timer: Timer, period_ms: Option<u64>) -> CancelHandle {
        let handle = CancelHandle(self.next_handle);
        self.next_handle += 1;
        let key = QueueKey { due_ms, kind: timer.kind, handle };
        self.pending.insert(key, Scheduled { timer, period_ms });
        handle
    }

    /// Remove a timer. Periodic timers keep their handle across periods.
    pub fn cancel(&mut self, handle: CancelHandle) -> bool {
        let key = self.pending.keys().find(|k| k.handle == handle).copied();
        match key {
            Some(key) => self.pending.remove(&key).is_some(),
            None => false,
        }
    }

    /// Pop the earliest timer due at or before `deadline_ms`.
    pub fn pop_due(&mut self, deadline_ms: u64) -> Option<Fired> {
        let key = *self.pending.keys().next()?;
        if key.due_ms > deadline_ms {
            return None;
        }
        let scheduled = self.pending.remove(&key)?;

        if let Some(period) = scheduled.period_ms {
            let next = QueueKey { due_ms: key.due_ms + period, ..key };
            self.pending.insert(next, scheduled);
        }

        Some(Fired {
            handle: key.handle,
            timer: scheduled.timer,
            at_ms: key.due_ms,
        })
    }

    /// Due time of the next pending timer.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|k| k.due_ms)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// =============================================================================
// MANUAL CLOCK
// =============================================================================

/// Virtual-time clock. Time only moves when the driver delivers timers or
/// calls [`Clock::advance_to`], so tests never sleep.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: u64,
    queue: TimerQueue,
}

impl ManualClock {
    /// Create a clock at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Due time of the next pending timer.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.next_due()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn after(&mut self, delay_ms: u64, timer: Timer) -> CancelHandle {
        self.queue.schedule(self.now_ms + delay_ms, timer, None)
    }

    fn every_second(&mut self, timer: Timer) -> CancelHandle {
        self.queue.schedule(self.now_ms + SECOND_MS, timer, Some(SECOND_MS))
    }

    fn cancel(&mut self, handle: CancelHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn pop_due(&mut self, deadline_ms: u64) -> Option<Fired> {
        let fired = self.queue.pop_due(deadline_ms)?;
        self.now_ms = self.now_ms.max(fired.at_ms);
        Some(fired)
    }

    fn advance_to(&mut self, deadline_ms: u64) {
        self.now_ms = self.now_ms.max(deadline_ms);
    }
}

// =============================================================================
// SYSTEM CLOCK
// =============================================================================

/// Wall-clock implementation backed by a monotonic [`Instant`].
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
    queue: TimerQueue,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            queue: TimerQueue::new(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn after(&mut self, delay_ms: u64, timer: Timer) -> CancelHandle {
        let now = self.now_ms();
        self.queue.schedule(now + delay_ms, timer, None)
    }

    fn every_second(&mut self, timer: Timer) -> CancelHandle {
        let now = self.now_ms();
        self.queue.schedule(now + SECOND_MS, timer, Some(SECOND_MS))
    }

    fn cancel(&mut self, handle: CancelHandle) -> bool {
        self.queue.cancel(handle)
    }

    fn pop_due(&mut self, deadline_ms: u64) -> Option<Fired> {
        self.queue.pop_due(deadline_ms)
    }

    fn advance_to(&mut self, _deadline_ms: u64) {}
}

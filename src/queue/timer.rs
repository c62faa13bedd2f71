//! Countdown timer scheduling.
//!
//! Provides:
//! - `TimerHandle` - opaque platform handle minted by the buffer
//! - `TimerFired` - payload carried by synthetic TIMER events
//! - `TimerQueue` - priority queue of repeating and one-shot timers

use std::collections::HashSet;
use std::time::Duration;

use super::clock::Stopwatch;
use super::event::{Event, EventType, Target};

/// Opaque handle identifying a timer.
///
/// Minted by the buffer, passed back on deletion, and embedded in
/// [`TimerFired`] payloads so clients can tell their timers apart. The
/// queue never uses the handle for scheduling decisions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a raw id. Buffer implementations use this to mint handles.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

/// Payload of a synthetic TIMER event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TimerFired {
    /// Handle of the timer that expired.
    pub timer: TimerHandle,
    /// Full periods that elapsed beyond the one being delivered, so a
    /// client that fell behind can coalesce.
    pub count: u32,
}

/// What the get loop should do about timers before its next wait.
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum TimerHint {
    /// No timers exist; wait for a post.
    Idle,
    /// The nearest timer is already due.
    Due,
    /// Seconds until the nearest timer expires.
    In(f64),
}

struct TimerRecord {
    handle: TimerHandle,
    period: f64,
    remaining: f64,
    target: Target,
    one_shot: bool,
}

impl TimerRecord {
    fn fired_event(&self) -> Event {
        // (period - remaining) / period is the number of expiries owed
        // since arming; everything beyond the one being delivered is
        // reported as missed so clients can coalesce.
        let count = if self.remaining <= 0.0 {
            let owed = ((self.period - self.remaining) / self.period) as u32;
            owed.saturating_sub(1)
        } else {
            0
        };
        Event::with_data(
            EventType::TIMER,
            self.target,
            TimerFired {
                timer: self.handle,
                count,
            },
        )
    }
}

/// Priority queue of live timers, ordered by ascending remaining time.
///
/// A flat handle set rides alongside so deletion is unconditional. The
/// queue owns its clock: elapsed time accumulates between sweeps and is
/// subtracted uniformly from every entry, which preserves relative order
/// without re-sorting.
pub(crate) struct TimerQueue {
    entries: Vec<TimerRecord>,
    live: HashSet<TimerHandle>,
    clock: Stopwatch,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            live: HashSet::new(),
            clock: Stopwatch::new(),
        }
    }

    /// Add a timer. `period` must be strictly positive.
    pub(crate) fn insert(
        &mut self,
        handle: TimerHandle,
        period: Duration,
        target: Target,
        one_shot: bool,
    ) {
        assert!(!period.is_zero(), "timer period must be positive");
        let now = self.clock.elapsed_secs();
        self.insert_at(handle, period.as_secs_f64(), target, one_shot, now);
    }

    fn insert_at(
        &mut self,
        handle: TimerHandle,
        period: f64,
        target: Target,
        one_shot: bool,
        now: f64,
    ) {
        // The clock's current reading will be subtracted wholesale on the
        // next sweep, so fold it in up front: the effective first expiry
        // lands one period from now.
        self.push_sorted(TimerRecord {
            handle,
            period,
            remaining: period + now,
            target,
            one_shot,
        });
        self.live.insert(handle);
    }

    fn push_sorted(&mut self, record: TimerRecord) {
        let at = self
            .entries
            .partition_point(|entry| entry.remaining <= record.remaining);
        self.entries.insert(at, record);
    }

    /// Remove a timer from the queue and the live set.
    ///
    /// Returns whether the handle was live.
    pub(crate) fn remove(&mut self, handle: TimerHandle) -> bool {
        self.entries.retain(|entry| entry.handle != handle);
        self.live.remove(&handle)
    }

    /// Fire the most-expired timer, if any is due.
    ///
    /// Subtracts the elapsed time from every entry, then pops at most one
    /// expired timer and returns its synthetic event. Further expired
    /// timers keep their negative remaining time, sort ahead of live ones,
    /// and fire on subsequent sweeps.
    pub(crate) fn sweep(&mut self) -> Option<Event> {
        if self.entries.is_empty() {
            return None;
        }
        let elapsed = self.clock.elapsed_secs();
        self.clock.reset();
        self.sweep_by(elapsed)
    }

    fn sweep_by(&mut self, elapsed: f64) -> Option<Event> {
        for entry in &mut self.entries {
            entry.remaining -= elapsed;
        }

        if self.entries.first()?.remaining > 0.0 {
            return None;
        }

        let mut timer = self.entries.remove(0);
        let event = timer.fired_event();
        timer.remaining = timer.period;
        if timer.one_shot {
            self.live.remove(&timer.handle);
        } else {
            self.push_sorted(timer);
        }
        Some(event)
    }

    /// -1 / 0 / remaining, expressed as a [`TimerHint`].
    pub(crate) fn hint(&self) -> TimerHint {
        match self.entries.first() {
            None => TimerHint::Idle,
            Some(entry) if entry.remaining <= 0.0 => TimerHint::Due,
            Some(entry) => TimerHint::In(entry.remaining),
        }
    }
}

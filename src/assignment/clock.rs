//! Period boundary arithmetic with one remembered duration change.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// One accounting period, bounds inclusive. Covers
/// `[start, start + duration)` of wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Period {
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// The persisted clock state: the active `(start, duration)` pair plus at
/// most one superseded pair. A timestamp before `current_start` resolves
/// under the previous pair; everything else uses the current one.
///
/// Invariants:
/// - `current_duration > 0` and any remembered previous duration `> 0`
///   (enforced at the facade before the record is mutated);
/// - for any timestamp, exactly one enclosing period exists under
///   whichever pair applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRecord {
    current_start: Timestamp,
    current_duration: u64,
    previous: Option<(Timestamp, u64)>,
}

impl ClockRecord {
    /// Starts the clock at `genesis` with fixed-length periods of
    /// `duration` seconds and no remembered prior regime.
    pub fn new(genesis: Timestamp, duration: u64) -> Self {
        Self {
            current_start: genesis,
            current_duration: duration,
            previous: None,
        }
    }

    pub fn current_start(&self) -> Timestamp {
        self.current_start
    }
    pub fn current_duration(&self) -> u64 {
        self.current_duration
    }
    pub fn previous(&self) -> Option<(Timestamp, u64)> {
        self.previous
    }

    /// Returns the period enclosing `ts`.
    ///
    /// Timestamps before the chosen regime's start saturate to its first
    /// period rather than panicking; the caller is expected to stay at or
    /// after genesis.
    pub fn period_at(&self, ts: Timestamp) -> Period {
        let (start, duration) = match self.previous {
            Some(prev) if ts < self.current_start => prev,
            _ => (self.current_start, self.current_duration),
        };
        let remainder = ts.saturating_sub(start) % duration;
        let period_start = ts.saturating_sub(remainder).max(start);
        Period {
            start: period_start,
            end: period_start + duration - 1,
        }
    }

    /// Returns the period enclosing `now`.
    pub fn current_period(&self, now: Timestamp) -> Period {
        self.period_at(now)
    }

    /// Switches to `new_duration` starting with the first period after the
    /// one enclosing `now`. The active pair is snapshotted so timestamps
    /// before the switch still resolve correctly; only one prior pair is
    /// remembered.
    pub fn change_duration(&mut self, now: Timestamp, new_duration: u64) {
        let boundary = self.current_period(now).end + 1;
        self.previous = Some((self.current_start, self.current_duration));
        self.current_start = boundary;
        self.current_duration = new_duration;
    }
}

use std::time::{Instant, SystemTime};

use serde::Serialize;

/// Time source for record timestamps, fixed for the life of a pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockKind {
    /// Free-running monotonic clock. Unaffected by system clock changes.
    #[default]
    Monotonic,
    /// System wall clock. Steps backwards are clamped away.
    WallClock,
}

#[derive(Debug, Clone, Copy)]
enum Epoch {
    Monotonic(Instant),
    WallClock(SystemTime),
}

impl Epoch {
    fn now(kind: ClockKind) -> Self {
        match kind {
            ClockKind::Monotonic => Self::Monotonic(Instant::now()),
            ClockKind::WallClock => Self::WallClock(SystemTime::now()),
        }
    }

    fn seconds_since(&self) -> f64 {
        match self {
            Self::Monotonic(t0) => t0.elapsed().as_secs_f64(),
            // An error here means the clock stepped backwards.
            Self::WallClock(t0) => t0.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.0),
        }
    }
}

/// Session clock assigning record timestamps in seconds.
///
/// The epoch `t0` is taken at the first stamp, which reads exactly the
/// carry-over (zero for a fresh session). Later stamps read
/// `now - t0 + carry_over`. Stamps never decrease.
#[derive(Debug, Clone)]
pub struct SessionClock {
    kind: ClockKind,
    carry_over: f64,
    epoch: Option<Epoch>,
    last: f64,
}

impl SessionClock {
    pub fn new(kind: ClockKind) -> Self {
        Self::with_carry_over(kind, 0.0)
    }

    /// A clock that continues from `carry_over` seconds.
    pub fn with_carry_over(kind: ClockKind, carry_over: f64) -> Self {
        let carry_over = if carry_over.is_finite() {
            carry_over.max(0.0)
        } else {
            0.0
        };
        Self {
            kind,
            carry_over,
            epoch: None,
            last: carry_over,
        }
    }

    /// Timestamp for a record decoded now.
    pub fn stamp(&mut self) -> f64 {
        let ts = match &self.epoch {
            None => {
                self.epoch = Some(Epoch::now(self.kind));
                self.carry_over
            }
            Some(epoch) => epoch.seconds_since() + self.carry_over,
        };
        self.last = self.last.max(ts);
        self.last
    }

    /// Elapsed session time right now, including the carry-over.
    ///
    /// Before the first stamp this is the carry-over itself.
    pub fn elapsed(&self) -> f64 {
        match &self.epoch {
            None => self.carry_over,
            Some(epoch) => (epoch.seconds_since() + self.carry_over).max(self.last),
        }
    }

    pub fn kind(&self) -> ClockKind {
        self.kind
    }

    pub fn carry_over(&self) -> f64 {
        self.carry_over
    }

    /// Whether the epoch has been taken.
    pub fn is_started(&self) -> bool {
        self.epoch.is_some()
    }
}

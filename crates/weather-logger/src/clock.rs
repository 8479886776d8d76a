//! Wall-clock and monotonic time for the scheduler.

use std::time::Instant;

use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// A single observation of both clocks, taken once per tick.
///
/// Interval timers (sample, flush) use `monotonic` so wall-clock jumps do
/// not disturb them; calendar timers (purge, sync) use `wall`.
#[derive(Debug, Clone, Copy)]
pub struct Now {
    /// Local wall-clock time.
    pub wall: PrimitiveDateTime,
    /// Monotonic instant.
    pub monotonic: Instant,
}

impl Now {
    /// Build an observation from explicit parts.
    pub fn new(wall: PrimitiveDateTime, monotonic: Instant) -> Self {
        Self { wall, monotonic }
    }
}

/// Local clock with a UTC offset fixed at start-up.
///
/// The offset has to be resolved while the process is still single-threaded
/// (see [`LocalClock::detect`]); it is not re-read across DST transitions.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: UtcOffset,
}

impl LocalClock {
    /// Clock with an explicit offset.
    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }

    /// Detect the local offset, falling back to UTC when it is unavailable.
    ///
    /// Must be called before any other thread is spawned, including the
    /// async runtime.
    pub fn detect() -> (Self, bool) {
        match UtcOffset::current_local_offset() {
            Ok(offset) => (Self::with_offset(offset), true),
            Err(_) => (Self::with_offset(UtcOffset::UTC), false),
        }
    }

    /// The fixed offset.
    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Current local wall time.
    pub fn wall(&self) -> PrimitiveDateTime {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(now.date(), now.time())
    }

    /// Observe both clocks.
    pub fn now(&self) -> Now {
        Now::new(self.wall(), Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::offset;

    #[test]
    fn test_wall_applies_offset() {
        let utc = LocalClock::with_offset(UtcOffset::UTC).wall();
        let ahead = LocalClock::with_offset(offset!(+2)).wall();
        let diff = ahead - utc;
        assert!((diff - time::Duration::hours(2)).abs() < time::Duration::seconds(5));
    }
}

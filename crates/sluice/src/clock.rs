//! Wall-clock source for versioned column names.

use chrono::{DateTime, FixedOffset, Local};

/// Something that can tell the time.
///
/// The engine reads it once per conflict; tests substitute a [`FixedClock`].
pub trait Clock: Send + Sync {
    /// The current wall-clock time, with the offset it was read in.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Suffix a column name with the clock's `YYYYMMDD_HHMM` wall-clock reading.
///
/// Two calls within the same minute produce the same name.
pub fn versioned_column_name(column: &str, clock: &dyn Clock) -> String {
    format!("{}_{}", column, clock.now().format("%Y%m%d_%H%M"))
}

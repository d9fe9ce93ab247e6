//! Injectable wall clock so token expiry and refresh scheduling stay deterministic under test.

// self
use crate::_prelude::*;

/// Source of the current UTC instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic tests and replays.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward (or backward for negative durations).
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Pins the clock to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// Drops the sub-second component, matching the precision of token timestamps.
pub fn truncate_to_second(instant: OffsetDateTime) -> OffsetDateTime {
	instant - Duration::nanoseconds(i64::from(instant.nanosecond()))
}

/// Converts to a timer duration, clamping negative values to zero.
pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_moves_only_when_told() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 00:00 UTC));

		clock.advance(Duration::minutes(90));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 01:30 UTC));

		clock.set(macros::datetime!(2024-12-31 23:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2024-12-31 23:00 UTC));
	}

	#[test]
	fn truncation_keeps_whole_seconds() {
		let instant = macros::datetime!(2025-01-01 00:00:05.987 UTC);

		assert_eq!(truncate_to_second(instant), macros::datetime!(2025-01-01 00:00:05 UTC));
	}

	#[test]
	fn negative_timer_durations_clamp_to_zero() {
		assert_eq!(to_std(Duration::seconds(-5)), std::time::Duration::ZERO);
		assert_eq!(to_std(Duration::milliseconds(1_500)), std::time::Duration::from_millis(1_500));
	}
}

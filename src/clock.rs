//! Injectable wall clock used by token expiry, quota rollover, and circuit cool-downs.

// self
use crate::_prelude::*;

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
	/// Returns the current instant in UTC.
	fn now(&self) -> OffsetDateTime;
}
impl<T: Clock + ?Sized> Clock for Arc<T> {
	fn now(&self) -> OffsetDateTime {
		(**self).now()
	}
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven clock for deterministic tests.
///
/// Clones share the same instant, so advancing one handle moves every component built
/// from it.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		*self.0.lock() += delta;
	}

	/// Jumps the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

pub(crate) fn system() -> Arc<dyn Clock> {
	Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_clones_share_time() {
		let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
		let shared: Arc<dyn Clock> = Arc::new(clock.clone());

		clock.advance(Duration::seconds(90));

		assert_eq!(shared.now(), macros::datetime!(2025-03-01 12:01:30 UTC));

		clock.set(macros::datetime!(2025-03-02 00:00 UTC));

		assert_eq!(shared.now(), macros::datetime!(2025-03-02 00:00 UTC));
	}
}

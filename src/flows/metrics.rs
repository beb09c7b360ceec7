// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token endpoint traffic.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	exchanges: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_successes: AtomicU64,
	failures: AtomicU64,
}
impl TokenMetrics {
	/// Returns the number of successful authorization-code exchanges.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh calls sent to the token endpoint.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh calls.
	pub fn refresh_successes(&self) -> u64 {
		self.refresh_successes.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchange or refresh calls.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_success(&self) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

//! Three-state circuit breaker keyed on classified failure kinds.
//!
//! The breaker wraps any fallible async operation whose error can report an
//! [`UpstreamStatus`]. Only statuses in the configured countable set move the state machine;
//! everything else passes through untouched. Transitions fire their registered listeners
//! synchronously, after the internal lock has been released.

// std
use std::collections::HashSet;
// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	error::UpstreamStatus,
	obs,
};

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Rejection produced while the circuit is open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitOpen {
	/// Instant after which the next call is let through as a probe.
	pub next_retry_at: OffsetDateTime,
}

/// Errors that can report the upstream status used as the breaker's failure kind.
pub trait Classify {
	/// Failure kind of this error.
	fn upstream_status(&self) -> UpstreamStatus;
}
impl Classify for Error {
	fn upstream_status(&self) -> UpstreamStatus {
		Error::upstream_status(self)
	}
}

/// Breaker configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
	/// Countable failures inside the monitoring window that open the circuit.
	pub failure_threshold: u32,
	/// Time the circuit stays open before a probe is allowed.
	pub reset_timeout: Duration,
	/// Consecutive half-open successes needed to close the circuit.
	pub half_open_requests: u32,
	/// Window in which countable failures are considered recent.
	pub monitoring_period: Duration,
	/// Failure kinds that count toward opening the circuit.
	pub countable: HashSet<UpstreamStatus>,
}
impl CircuitBreakerConfig {
	/// Overrides the failure threshold.
	pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
		self.failure_threshold = threshold.max(1);

		self
	}

	/// Overrides the open-state cool-down.
	pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
		self.reset_timeout = timeout;

		self
	}

	/// Overrides the number of half-open successes required to close.
	pub fn with_half_open_requests(mut self, requests: u32) -> Self {
		self.half_open_requests = requests.max(1);

		self
	}

	/// Overrides the monitoring window.
	pub fn with_monitoring_period(mut self, period: Duration) -> Self {
		self.monitoring_period = period;

		self
	}

	/// Replaces the countable failure kinds.
	pub fn with_countable<I>(mut self, kinds: I) -> Self
	where
		I: IntoIterator<Item = UpstreamStatus>,
	{
		self.countable = kinds.into_iter().collect();

		self
	}
}
impl Default for CircuitBreakerConfig {
	fn default() -> Self {
		Self {
			failure_threshold: 5,
			reset_timeout: Duration::seconds(60),
			half_open_requests: 3,
			monitoring_period: Duration::minutes(5),
			countable: HashSet::from([
				UpstreamStatus::Unavailable,
				UpstreamStatus::Internal,
				UpstreamStatus::DeadlineExceeded,
				UpstreamStatus::ResourceExhausted,
			]),
		}
	}
}

/// Breaker status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
	/// Calls flow normally.
	Closed,
	/// Calls are rejected until the cool-down elapses.
	Open,
	/// Probe calls are let through to test recovery.
	HalfOpen,
}
impl CircuitStatus {
	/// Returns the wire label for the status.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "CLOSED",
			Self::Open => "OPEN",
			Self::HalfOpen => "HALF_OPEN",
		}
	}
}
impl Display for CircuitStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Point-in-time copy of the breaker state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
	/// Current status.
	pub status: CircuitStatus,
	/// Recent countable failures in the current streak.
	pub failure_count: u32,
	/// Timestamps of countable failures, oldest first.
	pub recent_failures: Vec<OffsetDateTime>,
	/// Set exactly while the circuit is open.
	pub next_retry_at: Option<OffsetDateTime>,
	/// Successful probes since entering half-open.
	pub half_open_successes: u32,
	/// Instant of the most recent countable failure.
	pub last_failure_at: Option<OffsetDateTime>,
}

/// Aggregated breaker metrics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CircuitMetrics {
	/// Current status.
	pub status: CircuitStatus,
	/// Recent countable failures in the current streak.
	pub failure_count: u32,
	/// `round(successes / (successes + failure_count) * 100)`, 100 with no traffic.
	pub success_rate: u32,
	/// Instant of the most recent countable failure.
	pub last_failure_at: Option<OffsetDateTime>,
	/// Set exactly while the circuit is open.
	pub next_retry_at: Option<OffsetDateTime>,
	/// Countable failures per kind since the last close or reset.
	pub failure_breakdown: BTreeMap<UpstreamStatus, u64>,
}

#[derive(Debug)]
struct CircuitState {
	status: CircuitStatus,
	failure_count: u32,
	failure_timestamps: VecDeque<OffsetDateTime>,
	next_retry_at: Option<OffsetDateTime>,
	half_open_successes: u32,
	failure_breakdown: BTreeMap<UpstreamStatus, u64>,
	success_count: u64,
	last_failure_at: Option<OffsetDateTime>,
}
impl CircuitState {
	fn closed() -> Self {
		Self {
			status: CircuitStatus::Closed,
			failure_count: 0,
			failure_timestamps: VecDeque::new(),
			next_retry_at: None,
			half_open_successes: 0,
			failure_breakdown: BTreeMap::new(),
			success_count: 0,
			last_failure_at: None,
		}
	}

	fn prune(&mut self, now: OffsetDateTime, period: Duration) {
		let cutoff = now - period;

		while self.failure_timestamps.front().is_some_and(|instant| *instant <= cutoff) {
			self.failure_timestamps.pop_front();
		}
		if self.failure_timestamps.is_empty() {
			self.failure_breakdown.clear();
		}
	}
}

#[derive(Default)]
struct Listeners {
	open: Vec<Listener>,
	close: Vec<Listener>,
	half_open: Vec<Listener>,
}

/// Failure-aware CLOSED/OPEN/HALF_OPEN wrapper around outbound calls.
pub struct CircuitBreaker {
	config: CircuitBreakerConfig,
	state: Mutex<CircuitState>,
	listeners: RwLock<Listeners>,
	clock: Arc<dyn Clock>,
}
impl CircuitBreaker {
	/// Creates a closed breaker backed by the system clock.
	pub fn new(config: CircuitBreakerConfig) -> Self {
		Self {
			config,
			state: Mutex::new(CircuitState::closed()),
			listeners: RwLock::new(Listeners::default()),
			clock: clock::system(),
		}
	}

	/// Replaces the clock used for cool-downs and the monitoring window.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Configuration the breaker was built with.
	pub fn config(&self) -> &CircuitBreakerConfig {
		&self.config
	}

	/// Runs `operation` under breaker protection.
	///
	/// While open and cooling down, the operation is not invoked and the caller receives the
	/// [`CircuitOpen`] rejection converted into `E`. Errors produced by the operation are
	/// returned unchanged.
	pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
	where
		E: Classify + From<CircuitOpen>,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		self.admit().map_err(E::from)?;

		let result = operation().await;

		match &result {
			Ok(_) => self.on_success(),
			Err(err) => self.on_failure(err.upstream_status()),
		}

		result
	}

	/// Returns a snapshot of the current state.
	pub fn state(&self) -> CircuitSnapshot {
		let state = self.state.lock();

		CircuitSnapshot {
			status: state.status,
			failure_count: state.failure_count,
			recent_failures: state.failure_timestamps.iter().copied().collect(),
			next_retry_at: state.next_retry_at,
			half_open_successes: state.half_open_successes,
			last_failure_at: state.last_failure_at,
		}
	}

	/// Returns aggregated metrics.
	pub fn metrics(&self) -> CircuitMetrics {
		let state = self.state.lock();
		let total = state.success_count + u64::from(state.failure_count);
		let success_rate = if total == 0 {
			100
		} else {
			((state.success_count as f64 / total as f64) * 100.0).round() as u32
		};

		CircuitMetrics {
			status: state.status,
			failure_count: state.failure_count,
			success_rate,
			last_failure_at: state.last_failure_at,
			next_retry_at: state.next_retry_at,
			failure_breakdown: state.failure_breakdown.clone(),
		}
	}

	/// Forces the breaker back to a pristine closed state without firing listeners.
	pub fn reset(&self) {
		*self.state.lock() = CircuitState::closed();
	}

	/// Registers a listener fired whenever the circuit opens.
	pub fn on_open(&self, listener: impl Fn() + Send + Sync + 'static) {
		self.listeners.write().open.push(Arc::new(listener));
	}

	/// Registers a listener fired whenever the circuit closes.
	pub fn on_close(&self, listener: impl Fn() + Send + Sync + 'static) {
		self.listeners.write().close.push(Arc::new(listener));
	}

	/// Registers a listener fired whenever the circuit enters half-open.
	pub fn on_half_open(&self, listener: impl Fn() + Send + Sync + 'static) {
		self.listeners.write().half_open.push(Arc::new(listener));
	}

	fn admit(&self) -> Result<(), CircuitOpen> {
		let now = self.clock.now();
		let transitioned = {
			let mut state = self.state.lock();

			match (state.status, state.next_retry_at) {
				(CircuitStatus::Open, Some(next_retry_at)) if now < next_retry_at =>
					return Err(CircuitOpen { next_retry_at }),
				(CircuitStatus::Open, _) => {
					state.status = CircuitStatus::HalfOpen;
					state.half_open_successes = 0;
					state.next_retry_at = None;

					Some(CircuitStatus::HalfOpen)
				},
				_ => None,
			}
		};

		self.notify(transitioned);

		Ok(())
	}

	fn on_success(&self) {
		let now = self.clock.now();
		let transitioned = {
			let mut state = self.state.lock();

			state.success_count += 1;

			let status = state.status;

			match status {
				CircuitStatus::HalfOpen => {
					state.half_open_successes += 1;

					if state.half_open_successes >= self.config.half_open_requests {
						let success_count = state.success_count;
						let last_failure_at = state.last_failure_at;

						*state = CircuitState::closed();
						state.success_count = success_count;
						state.last_failure_at = last_failure_at;

						Some(CircuitStatus::Closed)
					} else {
						None
					}
				},
				CircuitStatus::Closed => {
					state.failure_count = 0;
					state.prune(now, self.config.monitoring_period);

					None
				},
				CircuitStatus::Open => None,
			}
		};

		self.notify(transitioned);
	}

	fn on_failure(&self, kind: UpstreamStatus) {
		if !self.config.countable.contains(&kind) {
			return;
		}

		let now = self.clock.now();
		let transitioned = {
			let mut state = self.state.lock();

			state.last_failure_at = Some(now);
			*state.failure_breakdown.entry(kind).or_default() += 1;
			state.failure_timestamps.push_back(now);

			let status = state.status;

			match status {
				CircuitStatus::HalfOpen => Some(self.open(&mut state, now)),
				CircuitStatus::Closed => {
					state.prune(now, self.config.monitoring_period);
					state.failure_count = state.failure_timestamps.len() as u32;

					(state.failure_count >= self.config.failure_threshold)
						.then(|| self.open(&mut state, now))
				},
				CircuitStatus::Open => None,
			}
		};

		self.notify(transitioned);
	}

	fn open(&self, state: &mut CircuitState, now: OffsetDateTime) -> CircuitStatus {
		state.status = CircuitStatus::Open;
		state.next_retry_at = Some(now + self.config.reset_timeout);
		state.half_open_successes = 0;

		CircuitStatus::Open
	}

	fn notify(&self, transitioned: Option<CircuitStatus>) {
		let Some(status) = transitioned else {
			return;
		};

		obs::record_circuit_transition(status.as_str());

		let listeners = {
			let listeners = self.listeners.read();

			match status {
				CircuitStatus::Open => listeners.open.clone(),
				CircuitStatus::Closed => listeners.close.clone(),
				CircuitStatus::HalfOpen => listeners.half_open.clone(),
			}
		};

		for listener in listeners {
			listener();
		}
	}
}
impl Debug for CircuitBreaker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CircuitBreaker")
			.field("config", &self.config)
			.field("state", &*self.state.lock())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	#[derive(Debug, PartialEq)]
	enum TestError {
		Upstream(UpstreamStatus),
		Open(OffsetDateTime),
	}
	impl Classify for TestError {
		fn upstream_status(&self) -> UpstreamStatus {
			match self {
				Self::Upstream(status) => status.clone(),
				Self::Open(_) => UpstreamStatus::Unknown,
			}
		}
	}
	impl From<CircuitOpen> for TestError {
		fn from(open: CircuitOpen) -> Self {
			Self::Open(open.next_retry_at)
		}
	}

	fn breaker() -> (CircuitBreaker, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-06-01 10:00 UTC));
		let breaker = CircuitBreaker::new(CircuitBreakerConfig::default())
			.with_clock(Arc::new(clock.clone()));

		(breaker, clock)
	}

	async fn fail(breaker: &CircuitBreaker, status: UpstreamStatus) -> Result<(), TestError> {
		breaker.execute(|| async move { Err(TestError::Upstream(status)) }).await
	}

	async fn succeed(breaker: &CircuitBreaker) -> Result<u8, TestError> {
		breaker.execute(|| async { Ok(7) }).await
	}

	#[tokio::test]
	async fn opens_after_threshold_and_skips_invocation() {
		let (breaker, clock) = breaker();
		let opened = Arc::new(AtomicU32::new(0));
		let counter = opened.clone();

		breaker.on_open(move || {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		for _ in 0..4 {
			let _ = fail(&breaker, UpstreamStatus::Unavailable).await;
		}

		assert_eq!(breaker.state().status, CircuitStatus::Closed);

		let err = fail(&breaker, UpstreamStatus::Unavailable)
			.await
			.expect_err("The operation error should be returned unchanged.");

		assert_eq!(err, TestError::Upstream(UpstreamStatus::Unavailable));
		assert_eq!(breaker.state().status, CircuitStatus::Open);
		assert_eq!(opened.load(Ordering::SeqCst), 1);

		let invoked = AtomicU32::new(0);
		let rejected = breaker
			.execute(|| async {
				invoked.fetch_add(1, Ordering::SeqCst);

				Ok::<_, TestError>(())
			})
			.await;

		assert_eq!(
			rejected,
			Err(TestError::Open(clock.now() + Duration::seconds(60))),
			"Open circuits must reject with the retry instant."
		);
		assert_eq!(invoked.load(Ordering::SeqCst), 0, "Operation must not run while open.");
	}

	#[tokio::test]
	async fn half_open_closes_after_required_successes() {
		let (breaker, clock) = breaker();
		let half_opened = Arc::new(AtomicU32::new(0));
		let closed = Arc::new(AtomicU32::new(0));
		let (h, c) = (half_opened.clone(), closed.clone());

		breaker.on_half_open(move || {
			h.fetch_add(1, Ordering::SeqCst);
		});
		breaker.on_close(move || {
			c.fetch_add(1, Ordering::SeqCst);
		});

		for _ in 0..5 {
			let _ = fail(&breaker, UpstreamStatus::Internal).await;
		}

		clock.advance(Duration::seconds(60));

		assert_eq!(succeed(&breaker).await, Ok(7));
		assert_eq!(breaker.state().status, CircuitStatus::HalfOpen);
		assert_eq!(half_opened.load(Ordering::SeqCst), 1);

		succeed(&breaker).await.expect("Second probe should pass.");
		succeed(&breaker).await.expect("Third probe should pass.");

		let snapshot = breaker.state();

		assert_eq!(snapshot.status, CircuitStatus::Closed);
		assert_eq!(snapshot.failure_count, 0);
		assert!(snapshot.recent_failures.is_empty());
		assert_eq!(snapshot.next_retry_at, None);
		assert_eq!(closed.load(Ordering::SeqCst), 1);
		assert!(breaker.metrics().failure_breakdown.is_empty());
	}

	#[tokio::test]
	async fn half_open_failure_reopens() {
		let (breaker, clock) = breaker();

		for _ in 0..5 {
			let _ = fail(&breaker, UpstreamStatus::DeadlineExceeded).await;
		}

		clock.advance(Duration::seconds(61));

		let _ = fail(&breaker, UpstreamStatus::Unavailable).await;
		let snapshot = breaker.state();

		assert_eq!(snapshot.status, CircuitStatus::Open);
		assert_eq!(snapshot.next_retry_at, Some(clock.now() + Duration::seconds(60)));
	}

	#[tokio::test]
	async fn non_countable_failures_are_ignored() {
		let (breaker, _) = breaker();

		for _ in 0..10 {
			let err = fail(&breaker, UpstreamStatus::InvalidArgument)
				.await
				.expect_err("Operation error should be returned.");

			assert_eq!(err, TestError::Upstream(UpstreamStatus::InvalidArgument));
		}

		let metrics = breaker.metrics();

		assert_eq!(metrics.status, CircuitStatus::Closed);
		assert_eq!(metrics.failure_count, 0);
		assert_eq!(metrics.success_rate, 100);
		assert!(metrics.failure_breakdown.is_empty());
		assert_eq!(metrics.last_failure_at, None);
	}

	#[tokio::test]
	async fn failures_outside_monitoring_window_do_not_accumulate() {
		let (breaker, clock) = breaker();

		for _ in 0..4 {
			let _ = fail(&breaker, UpstreamStatus::Unavailable).await;
		}

		clock.advance(Duration::minutes(6));

		let _ = fail(&breaker, UpstreamStatus::Unavailable).await;
		let snapshot = breaker.state();

		assert_eq!(snapshot.status, CircuitStatus::Closed);
		assert_eq!(snapshot.failure_count, 1);
	}

	#[tokio::test]
	async fn metrics_report_rate_and_breakdown() {
		let (breaker, _) = breaker();

		for _ in 0..3 {
			succeed(&breaker).await.expect("Success fixture should pass.");
		}

		let _ = fail(&breaker, UpstreamStatus::ResourceExhausted).await;
		let metrics = breaker.metrics();

		assert_eq!(metrics.success_rate, 75);
		assert_eq!(metrics.failure_breakdown.get(&UpstreamStatus::ResourceExhausted), Some(&1));
		assert_eq!(CircuitStatus::HalfOpen.to_string(), "HALF_OPEN");

		breaker.reset();

		assert_eq!(breaker.metrics().success_rate, 100);
		assert_eq!(breaker.state().status, CircuitStatus::Closed);
	}
}

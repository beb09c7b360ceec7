//! Daily quotas, burst control, and per-request ceilings.
//!
//! Every identity owns a lazily created bucket. A check first renews the bucket when the UTC
//! calendar date changed, then enforces the daily allowance, the sliding-window burst rate,
//! and the per-request operation ceiling, in that order. Quota is consumed as soon as a check
//! passes, whatever the outcome of the call it guards.

// crates.io
use rand::Rng;
use time::{Date, UtcOffset};
// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	error::QuotaKind,
	obs,
};

const WINDOW: Duration = Duration::seconds(60);

/// API access tier granted to a developer token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
	/// Test accounts only.
	Test,
	/// Default tier for new developer tokens.
	#[default]
	Basic,
	/// Standard production tier.
	Standard,
	/// Highest tier.
	Advanced,
}
impl AccessLevel {
	/// Returns the wire label for the level.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Test => "TEST",
			Self::Basic => "BASIC",
			Self::Standard => "STANDARD",
			Self::Advanced => "ADVANCED",
		}
	}
}
impl Display for AccessLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Daily operation allowance per access level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLevelLimits {
	/// Allowance for [`AccessLevel::Test`].
	pub test: u64,
	/// Allowance for [`AccessLevel::Basic`].
	pub basic: u64,
	/// Allowance for [`AccessLevel::Standard`].
	pub standard: u64,
	/// Allowance for [`AccessLevel::Advanced`].
	pub advanced: u64,
}
impl AccessLevelLimits {
	/// Returns the allowance configured for `level`.
	pub fn daily_limit(&self, level: AccessLevel) -> u64 {
		match level {
			AccessLevel::Test => self.test,
			AccessLevel::Basic => self.basic,
			AccessLevel::Standard => self.standard,
			AccessLevel::Advanced => self.advanced,
		}
	}

	/// Overrides the allowance of a single level.
	pub fn with_limit(mut self, level: AccessLevel, limit: u64) -> Self {
		match level {
			AccessLevel::Test => self.test = limit,
			AccessLevel::Basic => self.basic = limit,
			AccessLevel::Standard => self.standard = limit,
			AccessLevel::Advanced => self.advanced = limit,
		}

		self
	}
}
impl Default for AccessLevelLimits {
	fn default() -> Self {
		Self { test: 15_000, basic: 15_000, standard: 1_000_000, advanced: 10_000_000 }
	}
}

/// Ceilings applied to individual requests and to the request rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimits {
	/// Maximum operations a single request may carry.
	pub max_operations_per_mutate: u64,
	/// Maximum serialized request body size in bytes.
	pub max_request_bytes: u64,
	/// Sustained request rate tolerated once the window holds `burst_size` requests.
	pub requests_per_second: u32,
	/// Window population that arms the rate check.
	pub burst_size: usize,
}
impl Default for RequestLimits {
	fn default() -> Self {
		Self {
			max_operations_per_mutate: 5_000,
			max_request_bytes: 64 * 1024 * 1024,
			requests_per_second: 100,
			burst_size: 1_000,
		}
	}
}

/// Exponential backoff parameters exposed to callers that retry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
	/// Delay for attempt zero, in milliseconds.
	pub base_ms: u64,
	/// Upper bound for any delay, in milliseconds.
	pub max_ms: u64,
	/// Exclusive upper bound of the uniformly drawn jitter, in milliseconds.
	pub jitter_ms: u64,
}
impl Default for BackoffPolicy {
	fn default() -> Self {
		Self { base_ms: 1_000, max_ms: 64_000, jitter_ms: 1_000 }
	}
}

/// Rate limiter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
	/// Access level applied to new and existing buckets.
	#[serde(default)]
	pub access_level: AccessLevel,
	/// Allowance per access level.
	#[serde(default)]
	pub access_limits: AccessLevelLimits,
	/// Per-request and burst ceilings.
	#[serde(default)]
	pub request_limits: RequestLimits,
	/// Backoff parameters.
	#[serde(default)]
	pub backoff: BackoffPolicy,
}
impl RateLimitConfig {
	/// Sets the initial access level.
	pub fn with_access_level(mut self, level: AccessLevel) -> Self {
		self.access_level = level;

		self
	}

	/// Overrides the per-level allowances.
	pub fn with_access_limits(mut self, limits: AccessLevelLimits) -> Self {
		self.access_limits = limits;

		self
	}

	/// Overrides the request ceilings.
	pub fn with_request_limits(mut self, limits: RequestLimits) -> Self {
		self.request_limits = limits;

		self
	}

	/// Overrides the backoff policy.
	pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
		self.backoff = backoff;

		self
	}
}

/// Usage snapshot for one identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
	/// Operations consumed today (UTC).
	pub daily_operations: u64,
	/// Operations left before the daily allowance is exhausted.
	pub remaining_operations: u64,
	/// Next UTC midnight, when the allowance renews.
	pub resets_at: OffsetDateTime,
	/// Access level in force.
	pub access_level: AccessLevel,
}

#[derive(Debug)]
struct RateBucket {
	operations: u64,
	last_reset: Date,
	daily_limit: u64,
	window: VecDeque<OffsetDateTime>,
}
impl RateBucket {
	fn new(today: Date, daily_limit: u64) -> Self {
		Self { operations: 0, last_reset: today, daily_limit, window: VecDeque::new() }
	}

	fn renew_if_needed(&mut self, today: Date) {
		if self.last_reset != today {
			self.operations = 0;
			self.last_reset = today;
			self.window.clear();
		}
	}

	fn prune(&mut self, now: OffsetDateTime) {
		let cutoff = now - WINDOW;

		while self.window.front().is_some_and(|instant| *instant <= cutoff) {
			self.window.pop_front();
		}
	}
}

/// Quota-aware rate limiter keyed by identity.
pub struct RateLimiter {
	config: RateLimitConfig,
	access_level: RwLock<AccessLevel>,
	buckets: Mutex<HashMap<String, RateBucket>>,
	clock: Arc<dyn Clock>,
}
impl RateLimiter {
	/// Creates a limiter backed by the system clock.
	pub fn new(config: RateLimitConfig) -> Self {
		Self {
			access_level: RwLock::new(config.access_level),
			config,
			buckets: Mutex::new(HashMap::new()),
			clock: clock::system(),
		}
	}

	/// Replaces the clock used for date rollover and the burst window.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Configuration the limiter was built with.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Access level currently in force.
	pub fn access_level(&self) -> AccessLevel {
		*self.access_level.read()
	}

	/// Approves `op_count` operations for `identity` and records them.
	pub fn check_limit(&self, identity: &str, op_count: u64) -> Result<()> {
		let now = self.now();
		let limits = &self.config.request_limits;
		let mut buckets = self.buckets.lock();
		let bucket = buckets
			.entry(identity.to_owned())
			.or_insert_with(|| RateBucket::new(now.date(), self.daily_limit()));

		bucket.renew_if_needed(now.date());

		if bucket.operations.saturating_add(op_count) > bucket.daily_limit {
			obs::record_rate_limit_rejection(QuotaKind::DailyOperations.as_str());

			return Err(Error::Quota {
				message: format!(
					"Daily operations limit exceeded. Limit: {}, Current: {}.",
					bucket.daily_limit, bucket.operations
				),
				kind: QuotaKind::DailyOperations,
				limit: bucket.daily_limit,
				current: bucket.operations,
			});
		}

		bucket.prune(now);

		if let Some(retry_after) = burst_wait(bucket, now, limits) {
			obs::record_rate_limit_rejection("BURST");

			return Err(Error::RateLimit {
				message: format!(
					"Request rate limit exceeded. Please wait {}ms.",
					retry_after.whole_milliseconds()
				),
				retry_after: Some(Duration::seconds(ceil_div(
					retry_after.whole_milliseconds(),
					1_000,
				) as i64)),
				daily_limit_exceeded: false,
			});
		}
		if op_count > limits.max_operations_per_mutate {
			obs::record_rate_limit_rejection(QuotaKind::MutateOperations.as_str());

			return Err(Error::Quota {
				message: format!(
					"Too many operations in a single request. Max: {}.",
					limits.max_operations_per_mutate
				),
				kind: QuotaKind::MutateOperations,
				limit: limits.max_operations_per_mutate,
				current: op_count,
			});
		}

		bucket.operations += op_count;
		bucket.window.push_back(now);

		Ok(())
	}

	/// Rejects serialized request bodies larger than the configured ceiling.
	pub fn check_request_size(&self, bytes: u64) -> Result<()> {
		let max = self.config.request_limits.max_request_bytes;

		if bytes > max {
			obs::record_rate_limit_rejection(QuotaKind::RequestSize.as_str());

			return Err(Error::Quota {
				message: format!("Request size exceeds limit. Max: {} bytes.", max),
				kind: QuotaKind::RequestSize,
				limit: max,
				current: bytes,
			});
		}

		Ok(())
	}

	/// Returns `min(base * 2^attempt + jitter, max)`.
	///
	/// The delay is only computed; the limiter never sleeps or retries.
	pub fn calculate_backoff(&self, attempt: u32) -> Duration {
		let policy = &self.config.backoff;
		let jitter =
			if policy.jitter_ms == 0 { 0 } else { rand::rng().random_range(0..policy.jitter_ms) };
		let exponential =
			policy.base_ms.saturating_mul(2_u64.checked_pow(attempt).unwrap_or(u64::MAX));
		let delay = exponential.saturating_add(jitter).min(policy.max_ms);

		Duration::milliseconds(i64::try_from(delay).unwrap_or(i64::MAX))
	}

	/// Switches the access level; existing buckets pick up the new allowance immediately.
	pub fn set_access_level(&self, level: AccessLevel) {
		let limit = self.config.access_limits.daily_limit(level);

		*self.access_level.write() = level;

		for bucket in self.buckets.lock().values_mut() {
			bucket.daily_limit = limit;
		}
	}

	/// Reports usage for `identity`, creating its bucket if needed.
	pub fn usage_stats(&self, identity: &str) -> UsageStats {
		let now = self.now();
		let mut buckets = self.buckets.lock();
		let bucket = buckets
			.entry(identity.to_owned())
			.or_insert_with(|| RateBucket::new(now.date(), self.daily_limit()));

		bucket.renew_if_needed(now.date());

		let resets_at = bucket
			.last_reset
			.next_day()
			.map(|day| day.midnight().assume_utc())
			.unwrap_or(OffsetDateTime::new_utc(Date::MAX, time::Time::MIDNIGHT));

		UsageStats {
			daily_operations: bucket.operations,
			remaining_operations: bucket.daily_limit.saturating_sub(bucket.operations),
			resets_at,
			access_level: self.access_level(),
		}
	}

	/// Drops the bucket of `identity`.
	pub fn reset(&self, identity: &str) {
		self.buckets.lock().remove(identity);
	}

	fn daily_limit(&self) -> u64 {
		self.config.access_limits.daily_limit(self.access_level())
	}

	fn now(&self) -> OffsetDateTime {
		self.clock.now().to_offset(UtcOffset::UTC)
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("config", &self.config)
			.field("access_level", &self.access_level())
			.field("buckets", &self.buckets.lock().len())
			.finish()
	}
}

// Returns how long to wait when the window is full and the observed rate is too high.
fn burst_wait(bucket: &RateBucket, now: OffsetDateTime, limits: &RequestLimits) -> Option<Duration> {
	let len = bucket.window.len();

	if len == 0 || len < limits.burst_size {
		return None;
	}

	let oldest = *bucket.window.front()?;
	let span_ms = (now - oldest).whole_milliseconds().max(0);
	let rps = i128::from(limits.requests_per_second.max(1));
	let len = len as i128;

	if len * 1_000 <= rps * span_ms {
		return None;
	}

	let wait_ms = ceil_div(len * 1_000, rps) - span_ms;

	Some(Duration::milliseconds(wait_ms as i64))
}

fn ceil_div(numerator: i128, denominator: i128) -> i128 {
	(numerator + denominator - 1) / denominator
}

//! In-memory source failure tracking with exponential backoff.
//!
//! The tracker is a read-only oracle for the store: it never retries by
//! itself. Failing sources are ordered first so recovery is detected promptly,
//! while healthy sources keep their registration order and are never blocked.

// std
use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};
// self
use crate::_prelude::*;

/// Default base delay before a failed source is considered retryable.
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_secs(30);
/// Default clamp applied to exponential retry backoff.
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(300);
/// Exponential backoff multiplier applied per consecutive failure.
pub const BACKOFF_MULTIPLIER: u32 = 2;
/// Failure records expire after this long without a new failure.
pub const RECORD_EXPIRY: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
struct FailureRecord {
	error: String,
	recorded_at: Instant,
	failure_count: u32,
}

/// Snapshot of a source's failure state.
#[derive(Clone, Debug)]
pub struct FailureInfo {
	/// Source tag the failure belongs to.
	pub source: String,
	/// Most recent error message.
	pub error: String,
	/// Consecutive failure count.
	pub failure_count: u32,
	/// Remaining wait before the next advisory retry.
	pub retry_delay: Duration,
}

/// Tracks per-source failures and orders fetch attempts accordingly.
#[derive(Debug)]
pub struct SourceHealth {
	base_retry_delay: Duration,
	max_retry_delay: Duration,
	failures: Mutex<HashMap<String, FailureRecord>>,
}
impl SourceHealth {
	/// Create a tracker with the default retry delays.
	pub fn new() -> Self {
		Self::with_delays(DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY)
	}

	/// Create a tracker with custom base and maximum retry delays.
	pub fn with_delays(base_retry_delay: Duration, max_retry_delay: Duration) -> Self {
		Self { base_retry_delay, max_retry_delay, failures: Mutex::new(HashMap::new()) }
	}

	/// Record a failed fetch attempt for a source.
	pub fn record_failure(&self, source: &str, error: &str) {
		let now = Instant::now();
		let mut failures = self.locked();

		match failures.get_mut(source) {
			Some(record) => {
				record.failure_count = record.failure_count.saturating_add(1);
				record.recorded_at = now;
				record.error = error.to_string();

				tracing::warn!(source, count = record.failure_count, error, "source failed again");
			},
			None => {
				failures.insert(source.to_string(), FailureRecord {
					error: error.to_string(),
					recorded_at: now,
					failure_count: 1,
				});

				tracing::warn!(source, error, "source failed");
			},
		}
	}

	/// Record a successful fetch, clearing any failure record.
	///
	/// Returns the cleared failure count when the source had been failing, as
	/// a one-shot "recovered" signal.
	pub fn record_success(&self, source: &str) -> Option<u32> {
		let record = self.locked().remove(source)?;

		tracing::info!(source, previous_failures = record.failure_count, "source recovered");

		Some(record.failure_count)
	}

	/// Reorder sources for fetching: failing first, most-failing first,
	/// healthy sources keeping their relative order.
	pub fn priority_sources(&self, sources: &[String]) -> Vec<String> {
		let mut failures = self.locked();

		Self::cleanup_expired(&mut failures, Instant::now());

		let mut ordered = sources.to_vec();

		ordered.sort_by_key(|source| match failures.get(source) {
			Some(record) => (0_i64, -i64::from(record.failure_count)),
			None => (1, 0),
		});

		ordered
	}

	/// Whether enough time has passed to retry a failed source.
	///
	/// Advisory only: the store always attempts every source and uses health
	/// purely for ordering.
	pub fn should_retry(&self, source: &str) -> bool {
		let mut failures = self.locked();
		let now = Instant::now();

		Self::cleanup_expired(&mut failures, now);

		match failures.get(source) {
			None => true,
			Some(record) =>
				now.saturating_duration_since(record.recorded_at)
					>= self.backoff_delay(record.failure_count),
		}
	}

	/// Remaining wait before a failed source becomes retryable; zero when the
	/// source is healthy.
	pub fn retry_delay(&self, source: &str) -> Duration {
		let failures = self.locked();
		let Some(record) = failures.get(source) else {
			return Duration::ZERO;
		};
		let delay = self.backoff_delay(record.failure_count);
		let elapsed = Instant::now().saturating_duration_since(record.recorded_at);

		delay.saturating_sub(elapsed)
	}

	/// Sources with an active failure record.
	pub fn failed_sources(&self) -> Vec<String> {
		let mut failures = self.locked();

		Self::cleanup_expired(&mut failures, Instant::now());

		failures.keys().cloned().collect()
	}

	/// Failure snapshot for a source, or `None` when it is healthy.
	pub fn failure_info(&self, source: &str) -> Option<FailureInfo> {
		let record = { self.locked().get(source).cloned() }?;
		let delay = self.backoff_delay(record.failure_count);
		let elapsed = Instant::now().saturating_duration_since(record.recorded_at);

		Some(FailureInfo {
			source: source.to_string(),
			error: record.error,
			failure_count: record.failure_count,
			retry_delay: delay.saturating_sub(elapsed),
		})
	}

	fn backoff_delay(&self, failure_count: u32) -> Duration {
		let exponent = failure_count.saturating_sub(1).min(32);
		let delay = self.base_retry_delay.saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(exponent));

		delay.min(self.max_retry_delay)
	}

	fn cleanup_expired(failures: &mut HashMap<String, FailureRecord>, now: Instant) {
		failures.retain(|source, record| {
			let keep = now.saturating_duration_since(record.recorded_at) <= RECORD_EXPIRY;

			if !keep {
				tracing::debug!(source, "expired failure record");
			}

			keep
		});
	}

	fn locked(&self) -> MutexGuard<'_, HashMap<String, FailureRecord>> {
		self.failures.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
impl Default for SourceHealth {
	fn default() -> Self {
		Self::new()
	}
}

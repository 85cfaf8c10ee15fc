//! Configuration surface for the aggregation core.
//!
//! Only the tunables the core actually reads live here; provider tokens,
//! base URLs, CLI paths, and UI theming belong to the host application.

// crates.io
use serde::Deserialize;
// self
use crate::{
	_prelude::*,
	db::backend::DEFAULT_CLEANUP_DAYS,
	health::{DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY},
	store::{DEFAULT_BACKGROUND_TIMEOUT, DEFAULT_CODE_REVIEW_TTL},
};

/// Tunables consumed by the aggregation core.
///
/// Every field carries a default so an empty configuration table deserializes
/// to the documented behavior.
#[derive(Clone, Debug, Deserialize)]
pub struct CoreConfig {
	/// Cache tuning.
	#[serde(default)]
	pub cache: CacheConfig,
	/// Source health tuning.
	#[serde(default)]
	pub source_health: HealthConfig,
	/// Hard deadline for background refresh tasks, in seconds.
	#[serde(default = "default_background_timeout_seconds")]
	pub background_timeout_seconds: u64,
}
impl CoreConfig {
	/// Hard deadline applied to background refresh tasks.
	pub fn background_timeout(&self) -> Duration {
		Duration::from_secs(self.background_timeout_seconds)
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.background_timeout_seconds == 0 {
			return Err(Error::Validation {
				field: "background_timeout_seconds",
				reason: "Must be greater than zero.".into(),
			});
		}

		self.cache.validate()?;
		self.source_health.validate()?;

		Ok(())
	}
}
impl Default for CoreConfig {
	fn default() -> Self {
		Self {
			cache: CacheConfig::default(),
			source_health: HealthConfig::default(),
			background_timeout_seconds: default_background_timeout_seconds(),
		}
	}
}

/// Cache tuning.
#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
	/// TTL applied to cached code reviews, in seconds.
	#[serde(default = "default_ttl_seconds")]
	pub ttl_seconds: u64,
	/// Days before old cache rows are compacted away.
	#[serde(default = "default_cleanup_days")]
	pub cleanup_days: u32,
}
impl CacheConfig {
	/// TTL applied to cached code reviews.
	pub fn code_review_ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_seconds)
	}

	/// TTL applied to cached work items, derived as twice the code-review TTL.
	pub fn work_item_ttl(&self) -> Duration {
		Duration::from_secs(self.ttl_seconds.saturating_mul(2))
	}

	/// Validate the cache tuning.
	pub fn validate(&self) -> Result<()> {
		if self.cleanup_days == 0 {
			return Err(Error::Validation {
				field: "cache.cleanup_days",
				reason: "Must be at least one day.".into(),
			});
		}

		Ok(())
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self { ttl_seconds: default_ttl_seconds(), cleanup_days: default_cleanup_days() }
	}
}

/// Source health tuning.
#[derive(Clone, Debug, Deserialize)]
pub struct HealthConfig {
	/// Base delay before a failed source is considered retryable, in seconds.
	#[serde(default = "default_base_retry_delay_seconds")]
	pub base_retry_delay_seconds: u64,
	/// Clamp applied to exponential retry backoff, in seconds.
	#[serde(default = "default_max_retry_delay_seconds")]
	pub max_retry_delay_seconds: u64,
}
impl HealthConfig {
	/// Base delay before a failed source is considered retryable.
	pub fn base_retry_delay(&self) -> Duration {
		Duration::from_secs(self.base_retry_delay_seconds)
	}

	/// Clamp applied to exponential retry backoff.
	pub fn max_retry_delay(&self) -> Duration {
		Duration::from_secs(self.max_retry_delay_seconds)
	}

	/// Validate the health tuning.
	pub fn validate(&self) -> Result<()> {
		if self.max_retry_delay_seconds < self.base_retry_delay_seconds {
			return Err(Error::Validation {
				field: "source_health.max_retry_delay_seconds",
				reason: "Must be greater than or equal to base_retry_delay_seconds.".into(),
			});
		}

		Ok(())
	}
}
impl Default for HealthConfig {
	fn default() -> Self {
		Self {
			base_retry_delay_seconds: default_base_retry_delay_seconds(),
			max_retry_delay_seconds: default_max_retry_delay_seconds(),
		}
	}
}

fn default_ttl_seconds() -> u64 {
	DEFAULT_CODE_REVIEW_TTL.as_secs()
}

fn default_cleanup_days() -> u32 {
	DEFAULT_CLEANUP_DAYS
}

fn default_background_timeout_seconds() -> u64 {
	DEFAULT_BACKGROUND_TIMEOUT.as_secs()
}

fn default_base_retry_delay_seconds() -> u64 {
	DEFAULT_BASE_RETRY_DELAY.as_secs()
}

fn default_max_retry_delay_seconds() -> u64 {
	DEFAULT_MAX_RETRY_DELAY.as_secs()
}

//! TTL-aware durable cache over the embedded store.
//!
//! Rows are keyed by the `data_type:provider[:subsection]` fingerprint and
//! carry their payload as an opaque JSON array; typed deserialization happens
//! in the store. A backend fault never propagates to the caller: reads
//! degrade to misses, writes are logged and swallowed, and the higher tier
//! proceeds as if the operation had missed.

// crates.io
use serde_json::Value;
use sqlx::Row;
// self
use crate::{_prelude::*, db::Database};

/// Default number of days after which cache rows are compacted away.
pub const DEFAULT_CLEANUP_DAYS: u32 = 30;

/// Metadata describing a cache row.
#[derive(Clone, Debug)]
pub struct CacheInfo {
	/// Fingerprint the row is stored under.
	pub cache_key: String,
	/// Data family of the payload.
	pub data_type: String,
	/// Provider tag the payload came from.
	pub provider: String,
	/// When the payload was written.
	pub cached_at: DateTime<Utc>,
	/// Time-to-live applied at write time, in seconds.
	pub ttl_seconds: i64,
	/// Instant past which the row is stale.
	pub expires_at: DateTime<Utc>,
	/// Whether the row is still within its TTL.
	pub is_valid: bool,
	/// Write counter, informational.
	pub fetch_count: i64,
	/// Error annotation from the most recent failed refresh, if any.
	pub last_error: Option<String>,
}

/// TTL cache keyed by structured fingerprints, with stale-read support,
/// per-entry error annotation, and amortized compaction.
#[derive(Clone, Debug)]
pub struct CacheBackend {
	db: Database,
	cleanup_days: u32,
}
impl CacheBackend {
	/// Create a backend with the default compaction window.
	pub fn new(db: Database) -> Self {
		Self::with_cleanup_days(db, DEFAULT_CLEANUP_DAYS)
	}

	/// Create a backend compacting rows older than `cleanup_days`.
	pub fn with_cleanup_days(db: Database, cleanup_days: u32) -> Self {
		Self { db, cleanup_days }
	}

	/// Read a cached payload.
	///
	/// Returns the deserialized payload when the row is fresh, or when
	/// `accept_stale` allows serving past expiry. Absent rows, expired rows
	/// without `accept_stale`, and malformed payloads all read as `None`.
	pub async fn get(&self, cache_key: &str, accept_stale: bool) -> Option<Vec<Value>> {
		match self.try_get(cache_key, accept_stale).await {
			Ok(payload) => payload,
			Err(err) => {
				tracing::error!(cache_key, error = %err, "failed to read cached data");

				None
			},
		}
	}

	/// Store a payload, replacing any existing row for `cache_key`.
	///
	/// The replacement is atomic and resets `fetch_count` to 1. After a
	/// successful write the compactor runs opportunistically.
	pub async fn set(
		&self,
		cache_key: &str,
		payload: &[Value],
		ttl: Duration,
		data_type: &str,
		provider: &str,
		subsection: Option<&str>,
	) {
		if let Err(err) = self.try_set(cache_key, payload, ttl, data_type, provider, subsection).await
		{
			tracing::error!(cache_key, error = %err, "failed to cache data");
		}
	}

	/// Delete matching rows.
	///
	/// Both filters absent deletes everything; a single filter deletes all
	/// rows of that data type or provider; both filters deletes the exact
	/// intersection. Succeeds even when nothing matches.
	pub async fn invalidate(&self, data_type: Option<&str>, provider: Option<&str>) {
		if let Err(err) = self.try_invalidate(data_type, provider).await {
			tracing::error!(?data_type, ?provider, error = %err, "failed to invalidate cache");
		}
	}

	/// Whether a row exists for `cache_key` and is still within its TTL.
	pub async fn is_fresh(&self, cache_key: &str) -> bool {
		match self.row_is_valid(cache_key).await {
			Ok(valid) => valid,
			Err(err) => {
				tracing::error!(cache_key, error = %err, "failed to check cache freshness");

				false
			},
		}
	}

	/// Annotate the row for `cache_key` with a fetch error.
	///
	/// The payload and `cached_at` are untouched, so stale data keeps serving
	/// while the UI reports the failure. A missing row is a no-op.
	pub async fn record_error(&self, cache_key: &str, error: &str) {
		let result = sqlx::query("UPDATE cached_data SET last_error = ? WHERE cache_key = ?")
			.bind(error)
			.bind(cache_key)
			.execute(self.db.pool())
			.await;

		if let Err(err) = result {
			tracing::error!(cache_key, error = %err, "failed to record cache error");
		}
	}

	/// Metadata for the row stored under `cache_key`, or `None` when absent.
	pub async fn get_cache_info(&self, cache_key: &str) -> Option<CacheInfo> {
		match self.try_get_cache_info(cache_key).await {
			Ok(info) => info,
			Err(err) => {
				tracing::error!(cache_key, error = %err, "failed to get cache info");

				None
			},
		}
	}

	async fn try_get(&self, cache_key: &str, accept_stale: bool) -> Result<Option<Vec<Value>>> {
		let is_valid = self.row_is_valid(cache_key).await?;

		if !is_valid && !accept_stale {
			tracing::debug!(cache_key, "cache expired");

			return Ok(None);
		}

		let row = sqlx::query("SELECT payload FROM cached_data WHERE cache_key = ?")
			.bind(cache_key)
			.fetch_optional(self.db.pool())
			.await?;
		let Some(row) = row else {
			tracing::debug!(cache_key, "cache miss");

			return Ok(None);
		};
		let raw: String = row.get(0);

		match serde_json::from_str::<Value>(&raw) {
			Ok(Value::Array(items)) => {
				let status = if is_valid { "fresh" } else { "stale" };

				tracing::debug!(cache_key, count = items.len(), status, "cache hit");

				Ok(Some(items))
			},
			Ok(_) => {
				tracing::warn!(cache_key, "cached payload is not an array");

				Ok(None)
			},
			Err(err) => {
				tracing::warn!(cache_key, error = %err, "failed to parse cached payload");

				Ok(None)
			},
		}
	}

	async fn try_set(
		&self,
		cache_key: &str,
		payload: &[Value],
		ttl: Duration,
		data_type: &str,
		provider: &str,
		subsection: Option<&str>,
	) -> Result<()> {
		let raw = serde_json::to_string(payload)?;
		let cached_at = Utc::now();
		let mut tx = self.db.pool().begin().await?;

		sqlx::query("DELETE FROM cached_data WHERE cache_key = ?")
			.bind(cache_key)
			.execute(&mut *tx)
			.await?;
		sqlx::query(
			"INSERT INTO cached_data \
			(cache_key, data_type, provider, subsection, payload, cached_at, ttl_seconds, fetch_count) \
			VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
		)
		.bind(cache_key)
		.bind(data_type)
		.bind(provider)
		.bind(subsection)
		.bind(raw)
		.bind(cached_at)
		.bind(ttl.as_secs() as i64)
		.execute(&mut *tx)
		.await?;
		tx.commit().await?;

		tracing::debug!(cache_key, count = payload.len(), ttl = ttl.as_secs(), "cached data");

		self.cleanup_old_rows().await?;

		Ok(())
	}

	async fn try_invalidate(&self, data_type: Option<&str>, provider: Option<&str>) -> Result<()> {
		match (data_type, provider) {
			(None, None) => {
				sqlx::query("DELETE FROM cached_data").execute(self.db.pool()).await?;

				tracing::info!("invalidated all caches");
			},
			(Some(data_type), Some(provider)) => {
				sqlx::query("DELETE FROM cached_data WHERE data_type = ? AND provider = ?")
					.bind(data_type)
					.bind(provider)
					.execute(self.db.pool())
					.await?;

				tracing::info!(data_type, provider, "invalidated cache");
			},
			(Some(data_type), None) => {
				sqlx::query("DELETE FROM cached_data WHERE data_type = ?")
					.bind(data_type)
					.execute(self.db.pool())
					.await?;

				tracing::info!(data_type, "invalidated cache for data type");
			},
			(None, Some(provider)) => {
				sqlx::query("DELETE FROM cached_data WHERE provider = ?")
					.bind(provider)
					.execute(self.db.pool())
					.await?;

				tracing::info!(provider, "invalidated cache for provider");
			},
		}

		Ok(())
	}

	async fn try_get_cache_info(&self, cache_key: &str) -> Result<Option<CacheInfo>> {
		let row = sqlx::query(
			"SELECT cached_at, ttl_seconds, fetch_count, last_error, data_type, provider \
			FROM cached_data WHERE cache_key = ?",
		)
		.bind(cache_key)
		.fetch_optional(self.db.pool())
		.await?;
		let Some(row) = row else {
			return Ok(None);
		};
		let cached_at: DateTime<Utc> = row.get(0);
		let ttl_seconds: i64 = row.get(1);
		let expires_at = cached_at + TimeDelta::seconds(ttl_seconds);

		Ok(Some(CacheInfo {
			cache_key: cache_key.to_string(),
			data_type: row.get(4),
			provider: row.get(5),
			cached_at,
			ttl_seconds,
			expires_at,
			is_valid: Utc::now() < expires_at,
			fetch_count: row.get(2),
			last_error: row.get(3),
		}))
	}

	async fn row_is_valid(&self, cache_key: &str) -> Result<bool> {
		let row = sqlx::query("SELECT cached_at, ttl_seconds FROM cached_data WHERE cache_key = ?")
			.bind(cache_key)
			.fetch_optional(self.db.pool())
			.await?;
		let Some(row) = row else {
			return Ok(false);
		};
		let cached_at: DateTime<Utc> = row.get(0);
		let ttl_seconds: i64 = row.get(1);

		Ok(Utc::now() < cached_at + TimeDelta::seconds(ttl_seconds))
	}

	async fn cleanup_old_rows(&self) -> Result<()> {
		let cutoff = Utc::now() - TimeDelta::days(i64::from(self.cleanup_days));
		let result = sqlx::query("DELETE FROM cached_data WHERE cached_at < ?")
			.bind(cutoff)
			.execute(self.db.pool())
			.await?;
		let deleted = result.rows_affected();

		if deleted > 0 {
			tracing::info!(deleted, "compacted old cache rows");
		}

		Ok(())
	}
}

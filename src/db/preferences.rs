//! Persistent user preferences over a JSON key/value table.

// crates.io
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;
// self
use crate::{_prelude::*, db::Database};

/// Typed storage for user preferences and UI state.
///
/// Values are JSON-serialized; faults are trapped the same way as the cache
/// backend, so a broken store degrades to defaults instead of failing the UI.
#[derive(Clone, Debug)]
pub struct Preferences {
	db: Database,
}
impl Preferences {
	/// Create a preferences store over the shared database handle.
	pub fn new(db: Database) -> Self {
		Self { db }
	}

	/// Read a preference, or `None` when absent or unreadable.
	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		match self.try_get(key).await {
			Ok(value) => value,
			Err(err) => {
				tracing::error!(key, error = %err, "failed to get preference");

				None
			},
		}
	}

	/// Write a preference, replacing any existing value.
	pub async fn set<T>(&self, key: &str, value: &T)
	where
		T: Serialize,
	{
		if let Err(err) = self.try_set(key, value).await {
			tracing::error!(key, error = %err, "failed to set preference");
		}
	}

	/// Delete a preference; absent keys are a no-op.
	pub async fn delete(&self, key: &str) {
		let result = sqlx::query("DELETE FROM user_preferences WHERE key = ?")
			.bind(key)
			.execute(self.db.pool())
			.await;

		if let Err(err) = result {
			tracing::error!(key, error = %err, "failed to delete preference");
		}
	}

	async fn try_get<T>(&self, key: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let row = sqlx::query("SELECT value FROM user_preferences WHERE key = ?")
			.bind(key)
			.fetch_optional(self.db.pool())
			.await?;
		let Some(row) = row else {
			return Ok(None);
		};
		let raw: String = row.get(0);

		match serde_json::from_str(&raw) {
			Ok(value) => Ok(Some(value)),
			Err(err) => {
				tracing::warn!(key, error = %err, "failed to parse stored preference");

				Ok(None)
			},
		}
	}

	async fn try_set<T>(&self, key: &str, value: &T) -> Result<()>
	where
		T: Serialize,
	{
		let raw = serde_json::to_string(value)?;

		sqlx::query(
			"INSERT INTO user_preferences (key, value, updated_at) VALUES (?, ?, ?) \
			ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
		)
		.bind(key)
		.bind(raw)
		.bind(Utc::now())
		.execute(self.db.pool())
		.await?;

		Ok(())
	}
}

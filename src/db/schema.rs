//! Schema definitions and the linear migration counter.

// crates.io
use sqlx::{Row, SqlitePool};
// self
use crate::_prelude::*;

/// Current schema version recorded in `schema_version`.
pub const SCHEMA_VERSION: i64 = 2;

const SCHEMA_SQL: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS schema_version (
		version INTEGER PRIMARY KEY,
		applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
	)",
	"CREATE TABLE IF NOT EXISTS cached_data (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		cache_key TEXT NOT NULL,
		data_type TEXT NOT NULL,
		provider TEXT NOT NULL,
		subsection TEXT,
		payload TEXT NOT NULL,
		cached_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
		ttl_seconds INTEGER NOT NULL,
		fetch_count INTEGER NOT NULL DEFAULT 0,
		last_error TEXT,
		UNIQUE(cache_key)
	)",
	"CREATE INDEX IF NOT EXISTS idx_cached_data_key ON cached_data(cache_key)",
	"CREATE INDEX IF NOT EXISTS idx_cached_data_type ON cached_data(data_type)",
	"CREATE INDEX IF NOT EXISTS idx_cached_data_provider ON cached_data(provider)",
	"CREATE INDEX IF NOT EXISTS idx_cached_data_cached_at ON cached_data(cached_at)",
	"CREATE TABLE IF NOT EXISTS user_preferences (
		key TEXT PRIMARY KEY,
		value TEXT NOT NULL,
		updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
	)",
];

// v1 kept one table per data type; v2 unifies them under cached_data.
const MIGRATION_V2_SQL: &[&str] = &[
	"DROP TABLE IF EXISTS cache_metadata",
	"DROP TABLE IF EXISTS merge_requests",
	"DROP TABLE IF EXISTS work_items",
];

/// Create all tables if absent and bring the schema up to [`SCHEMA_VERSION`].
///
/// Safe to call multiple times.
pub(crate) async fn init_schema(pool: &SqlitePool) -> Result<()> {
	for statement in SCHEMA_SQL {
		sqlx::query(statement).execute(pool).await?;
	}

	let row = sqlx::query("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
		.fetch_optional(pool)
		.await?;

	match row {
		None => {
			sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
				.bind(SCHEMA_VERSION)
				.execute(pool)
				.await?;
		},
		Some(row) => {
			let version: i64 = row.get(0);

			if version < SCHEMA_VERSION {
				migrate_schema(pool, version).await?;
			}
		},
	}

	Ok(())
}

async fn migrate_schema(pool: &SqlitePool, from_version: i64) -> Result<()> {
	tracing::info!(from_version, to_version = SCHEMA_VERSION, "migrating schema");

	if from_version < 2 {
		for statement in MIGRATION_V2_SQL {
			sqlx::query(statement).execute(pool).await?;
		}
	}

	sqlx::query("INSERT OR REPLACE INTO schema_version (version) VALUES (?)")
		.bind(SCHEMA_VERSION)
		.execute(pool)
		.await?;

	Ok(())
}

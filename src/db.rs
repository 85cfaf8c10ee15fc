//! Embedded SQLite storage shared by the cache and preferences layers.

pub mod backend;
pub mod preferences;
pub mod schema;

// std
use std::{path::Path, str::FromStr};
// crates.io
use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
// self
use crate::_prelude::*;

/// Wait this long for a locked database before failing a statement.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the embedded store.
///
/// One connection per process; every statement is serialized through it, so
/// concurrent writers see last-writer-wins full replacements rather than lost
/// updates. Cloning the handle shares the same connection.
#[derive(Clone, Debug)]
pub struct Database {
	pool: SqlitePool,
}
impl Database {
	/// Open the database at `path`, creating it if missing, and initialize the
	/// schema. Idempotent.
	pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.busy_timeout(BUSY_TIMEOUT)
			.foreign_keys(true);

		tracing::debug!(path = %path.as_ref().display(), "opening database");

		Self::connect(options).await
	}

	/// Open an in-memory database, primarily for tests.
	pub async fn in_memory() -> Result<Self> {
		let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

		Self::connect(options).await
	}

	async fn connect(options: SqliteConnectOptions) -> Result<Self> {
		// A single long-lived connection; recycling would wipe in-memory
		// databases and buys nothing for a serialized store.
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(options)
			.await?;

		schema::init_schema(&pool).await?;

		Ok(Self { pool })
	}

	/// Access the underlying pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Flush and close the connection.
	pub async fn close(&self) {
		self.pool.close().await;
	}
}

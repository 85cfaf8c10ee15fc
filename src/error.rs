//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the worklens crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),

	#[error("Cache error: {0}")]
	Cache(String),
	#[error("Source '{source_type}' failed: {message}")]
	Source { source_type: String, message: String },
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}

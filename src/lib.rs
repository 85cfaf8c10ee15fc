//! Unified work-item aggregation core for a developer-productivity dashboard.
//!
//! Fuses code reviews (merge/pull requests) and work items (issues, tasks)
//! from heterogeneous providers into a single coherent view. Reads are served
//! from a durable TTL cache; stale data is returned immediately while a
//! background refresh runs; fetches fan out concurrently across providers
//! with partial-failure tolerance and failure-aware retry ordering.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod db;
pub mod health;
pub mod model;
pub mod source;
pub mod store;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, TimeDelta, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}
pub use crate::{
	error::{Error, Result},
	store::{DataType, FetchResult, Subsection, WorkStore, WorkStoreBuilder},
};

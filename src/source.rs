//! Source traits and the registration container consumed by the work store.
//!
//! Providers live outside the core: the store depends only on the capability
//! set below. Sources must return normalized values, must not cache
//! internally, and must be safe for concurrent invocation from different
//! fetch tasks.

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	model::{CodeReview, WorkItem},
};

/// Base capability set shared by every provider adapter.
///
/// Adapters that shell out to a CLI must cap their own subprocess concurrency
/// with a small semaphore (three permits is typical); the store fans out to
/// every registered source at once and provides no such limit.
#[async_trait]
pub trait Source: Send + Sync {
	/// Stable provider tag, e.g. `"gitlab"`.
	fn source_type(&self) -> &str;

	/// Display hint for the provider.
	fn source_icon(&self) -> &str;

	/// Whether the host tooling and credentials for this source are present.
	async fn is_available(&self) -> bool;

	/// Whether the source is authenticated.
	async fn check_auth(&self) -> bool;
}

/// Provider adapter serving code reviews (merge/pull requests).
#[async_trait]
pub trait CodeReviewSource: Source {
	/// Fetch reviews assigned to the current user.
	async fn fetch_assigned(&self) -> Result<Vec<CodeReview>>;

	/// Fetch reviews authored by the current user.
	async fn fetch_authored(&self) -> Result<Vec<CodeReview>>;

	/// Fetch reviews awaiting the current user's review.
	///
	/// Reserved for a future subsection; no read path dispatches to it yet.
	async fn fetch_pending_review(&self) -> Result<Vec<CodeReview>>;
}

/// Provider adapter serving work items (issues, tasks).
#[async_trait]
pub trait WorkItemSource: Source {
	/// Fetch work items from this source.
	async fn fetch_items(&self) -> Result<Vec<WorkItem>>;
}

/// Registration container holding sources in registration order.
///
/// Registration happens at construction time; once the dashboard has started
/// the lists are effectively immutable and readers receive defensive
/// snapshots. Duplicate provider tags are permitted but discouraged — the
/// store's tag indexing would then serve the last registration.
#[derive(Default)]
pub struct SourceRegistry {
	code_review_sources: Vec<Arc<dyn CodeReviewSource>>,
	work_item_sources: Vec<Arc<dyn WorkItemSource>>,
}
impl SourceRegistry {
	/// Create an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a code review source, appended in registration order.
	pub fn register_code_review_source(&mut self, source: Arc<dyn CodeReviewSource>) {
		tracing::debug!(source_type = source.source_type(), "registered code review source");
		self.code_review_sources.push(source);
	}

	/// Register a work item source, appended in registration order.
	pub fn register_work_item_source(&mut self, source: Arc<dyn WorkItemSource>) {
		tracing::debug!(source_type = source.source_type(), "registered work item source");
		self.work_item_sources.push(source);
	}

	/// Snapshot of the registered code review sources.
	pub fn code_review_sources(&self) -> Vec<Arc<dyn CodeReviewSource>> {
		self.code_review_sources.clone()
	}

	/// Snapshot of the registered work item sources.
	pub fn work_item_sources(&self) -> Vec<Arc<dyn WorkItemSource>> {
		self.work_item_sources.clone()
	}
}

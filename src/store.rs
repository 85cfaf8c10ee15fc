//! WorkStore — cache-fronted aggregation over all registered sources.
//!
//! Reads are always O(cache): a fresh cache serves directly, a stale cache
//! serves immediately while a background refresh runs, and only misses and
//! forced refreshes block on the upstream providers. Fetches fan out
//! concurrently across every registered source and tolerate partial failure;
//! the health tracker orders attempts so failing providers are probed early
//! without ever starving healthy ones.

// std
use std::{collections::HashMap, fmt};
// crates.io
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinSet, time};
// self
use crate::{
	_prelude::*,
	config::CoreConfig,
	db::{
		Database,
		backend::{CacheBackend, CacheInfo, DEFAULT_CLEANUP_DAYS},
	},
	health::SourceHealth,
	model::{CodeReview, WorkItem},
	source::{CodeReviewSource, SourceRegistry, WorkItemSource},
};

/// Default TTL for cached code reviews.
pub const DEFAULT_CODE_REVIEW_TTL: Duration = Duration::from_secs(300);
/// Default TTL for cached work items.
pub const DEFAULT_WORK_ITEM_TTL: Duration = Duration::from_secs(600);
/// Default hard deadline applied to background refresh tasks.
pub const DEFAULT_BACKGROUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Data families served by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
	/// Merge and pull requests.
	CodeReviews,
	/// Issues and tasks.
	WorkItems,
}
impl DataType {
	/// Stable tag used in cache fingerprints.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::CodeReviews => "code_reviews",
			Self::WorkItems => "work_items",
		}
	}
}
impl fmt::Display for DataType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Named cut of the code-review data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsection {
	/// Reviews assigned to the current user.
	Assigned,
	/// Reviews opened by the current user.
	Opened,
}
impl Subsection {
	/// Stable tag used in cache fingerprints.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Assigned => "assigned",
			Self::Opened => "opened",
		}
	}
}
impl fmt::Display for Subsection {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Compose the cache fingerprint for a data type, provider, and subsection.
pub fn cache_key(data_type: DataType, provider: &str, subsection: Option<Subsection>) -> String {
	match subsection {
		Some(subsection) => format!("{data_type}:{provider}:{subsection}"),
		None => format!("{data_type}:{provider}"),
	}
}

/// Outcome of a read, carrying partial-failure metadata.
///
/// Partial failure is the standard case: non-empty `data` alongside non-empty
/// `failed_sources` is fully supported and expected.
#[derive(Clone, Debug)]
pub struct FetchResult<T> {
	/// Fetched or cached items, accumulated per source in priority order.
	pub data: Vec<T>,
	/// True when the data came from the full fetch path rather than cache.
	pub fresh: bool,
	/// Sources that failed this cycle.
	pub failed_sources: Vec<String>,
	/// Error message per failed source.
	pub errors: HashMap<String, String>,
}

#[derive(Debug)]
enum SourceOutcome<T> {
	Fetched(Vec<T>),
	Failed(String),
	Skipped,
}

type FetchHandle<T> = tokio::task::JoinHandle<(String, SourceOutcome<T>)>;
type CachedRead<T> = Option<(Vec<T>, Vec<(String, String)>)>;

#[derive(Clone, Copy, Debug)]
enum RefreshTarget {
	CodeReviews(Subsection),
	WorkItems,
}

/// Builder for [`WorkStore`], mirroring the configuration surface.
pub struct WorkStoreBuilder {
	registry: SourceRegistry,
	health: SourceHealth,
	code_review_ttl: Duration,
	work_item_ttl: Duration,
	background_timeout: Duration,
	cleanup_days: u32,
}
impl WorkStoreBuilder {
	/// Create a builder with default tuning.
	pub fn new(registry: SourceRegistry) -> Self {
		Self {
			registry,
			health: SourceHealth::new(),
			code_review_ttl: DEFAULT_CODE_REVIEW_TTL,
			work_item_ttl: DEFAULT_WORK_ITEM_TTL,
			background_timeout: DEFAULT_BACKGROUND_TIMEOUT,
			cleanup_days: DEFAULT_CLEANUP_DAYS,
		}
	}

	/// Override the code review cache TTL.
	pub fn code_review_ttl(mut self, ttl: Duration) -> Self {
		self.code_review_ttl = ttl;

		self
	}

	/// Override the work item cache TTL.
	pub fn work_item_ttl(mut self, ttl: Duration) -> Self {
		self.work_item_ttl = ttl;

		self
	}

	/// Override the background refresh deadline.
	pub fn background_timeout(mut self, timeout: Duration) -> Self {
		self.background_timeout = timeout;

		self
	}

	/// Override the cache compaction window.
	pub fn cleanup_days(mut self, days: u32) -> Self {
		self.cleanup_days = days;

		self
	}

	/// Replace the health tracker, e.g. to tune retry delays.
	pub fn health(mut self, health: SourceHealth) -> Self {
		self.health = health;

		self
	}

	/// Apply the configuration surface to the builder.
	pub fn apply_config(mut self, config: &CoreConfig) -> Self {
		self.code_review_ttl = config.cache.code_review_ttl();
		self.work_item_ttl = config.cache.work_item_ttl();
		self.background_timeout = config.background_timeout();
		self.cleanup_days = config.cache.cleanup_days;
		self.health = SourceHealth::with_delays(
			config.source_health.base_retry_delay(),
			config.source_health.max_retry_delay(),
		);

		self
	}

	/// Bind the builder to a database handle and construct the store.
	pub fn build(self, db: Database) -> WorkStore {
		WorkStore {
			registry: Arc::new(self.registry),
			cache: CacheBackend::with_cleanup_days(db, self.cleanup_days),
			health: Arc::new(self.health),
			code_review_ttl: self.code_review_ttl,
			work_item_ttl: self.work_item_ttl,
			background_timeout: self.background_timeout,
			refresh_tasks: Arc::new(Mutex::new(JoinSet::new())),
		}
	}
}

/// Unified data access layer with transparent caching.
///
/// Callers just request data; the store handles freshness, fetching, caching,
/// stale fallbacks, and source health. Cloning shares all state, including
/// the background refresh task set. Each spawned refresh holds its own clone,
/// so an in-flight refresh outlives the caller and is reaped from the set on
/// completion.
#[derive(Clone)]
pub struct WorkStore {
	registry: Arc<SourceRegistry>,
	cache: CacheBackend,
	health: Arc<SourceHealth>,
	code_review_ttl: Duration,
	work_item_ttl: Duration,
	background_timeout: Duration,
	refresh_tasks: Arc<Mutex<JoinSet<()>>>,
}
impl WorkStore {
	/// Create a store with default tuning.
	pub fn new(registry: SourceRegistry, db: Database) -> Self {
		Self::builder(registry).build(db)
	}

	/// Create a [`WorkStoreBuilder`] for custom tuning.
	pub fn builder(registry: SourceRegistry) -> WorkStoreBuilder {
		WorkStoreBuilder::new(registry)
	}

	/// The failure tracker backing retry prioritization.
	pub fn health(&self) -> &SourceHealth {
		&self.health
	}

	/// The durable cache backing reads.
	pub fn cache(&self) -> &CacheBackend {
		&self.cache
	}

	/// Get code reviews with automatic fetch, caching, and background refresh.
	///
	/// Fresh cache serves directly; a stale cache serves immediately and
	/// triggers a background refresh; an empty cache falls through to the
	/// full fetch path, as does `force_refresh`.
	#[tracing::instrument(skip(self))]
	pub async fn get_code_reviews(
		&self,
		subsection: Subsection,
		force_refresh: bool,
	) -> FetchResult<CodeReview> {
		if force_refresh {
			return self.fetch_code_reviews(subsection).await;
		}

		let tags = self.code_review_tags();
		let Some((data, errors)) =
			self.cached_read::<CodeReview>(DataType::CodeReviews, Some(subsection), &tags).await
		else {
			return self.fetch_code_reviews(subsection).await;
		};

		if !self.any_fresh(DataType::CodeReviews, Some(subsection), &tags).await {
			self.trigger_background_refresh(RefreshTarget::CodeReviews(subsection)).await;
		}

		cached_result(data, errors)
	}

	/// Get work items with automatic fetch, caching, and background refresh.
	#[tracing::instrument(skip(self))]
	pub async fn get_work_items(&self, force_refresh: bool) -> FetchResult<WorkItem> {
		if force_refresh {
			return self.fetch_work_items().await;
		}

		let tags = self.work_item_tags();
		let Some((data, errors)) =
			self.cached_read::<WorkItem>(DataType::WorkItems, None, &tags).await
		else {
			return self.fetch_work_items().await;
		};

		if !self.any_fresh(DataType::WorkItems, None, &tags).await {
			self.trigger_background_refresh(RefreshTarget::WorkItems).await;
		}

		cached_result(data, errors)
	}

	/// Invalidate cached rows with fine-grained control.
	///
	/// Both filters absent invalidates everything; a single filter scopes the
	/// deletion to a data type or a provider; both scope it to the exact
	/// intersection.
	pub async fn invalidate(&self, data_type: Option<DataType>, provider: Option<&str>) {
		self.cache.invalidate(data_type.map(DataType::as_str), provider).await;
	}

	/// Whether the cache is fresh for a data type.
	///
	/// With a provider, every sub-key of that provider must be fresh (both
	/// subsections for code reviews). Without one, any registered provider
	/// with at least one fresh sub-key counts.
	pub async fn is_fresh(&self, data_type: DataType, provider: Option<&str>) -> bool {
		match (data_type, provider) {
			(DataType::CodeReviews, Some(provider)) => {
				for subsection in [Subsection::Assigned, Subsection::Opened] {
					if !self.cache.is_fresh(&cache_key(data_type, provider, Some(subsection))).await
					{
						return false;
					}
				}

				true
			},
			(DataType::WorkItems, Some(provider)) =>
				self.cache.is_fresh(&cache_key(data_type, provider, None)).await,
			(DataType::CodeReviews, None) => {
				for tag in self.code_review_tags() {
					for subsection in [Subsection::Assigned, Subsection::Opened] {
						if self.cache.is_fresh(&cache_key(data_type, &tag, Some(subsection))).await {
							return true;
						}
					}
				}

				false
			},
			(DataType::WorkItems, None) =>
				self.any_fresh(data_type, None, &self.work_item_tags()).await,
		}
	}

	/// Metadata for a cache row, by fingerprint.
	pub async fn get_cache_info(&self, cache_key: &str) -> Option<CacheInfo> {
		self.cache.get_cache_info(cache_key).await
	}

	/// Await every in-flight background refresh.
	///
	/// Intended for tests and orderly shutdown; normal reads never wait on
	/// refreshes.
	pub async fn drain_background_refreshes(&self) {
		let mut tasks = self.refresh_tasks.lock().await;

		while tasks.join_next().await.is_some() {}
	}

	async fn fetch_code_reviews(&self, subsection: Subsection) -> FetchResult<CodeReview> {
		let sources = self.registry.code_review_sources();
		let tags: Vec<String> =
			sources.iter().map(|source| source.source_type().to_string()).collect();
		let order = self.health.priority_sources(&tags);
		let by_tag: HashMap<String, Arc<dyn CodeReviewSource>> = sources
			.into_iter()
			.map(|source| (source.source_type().to_string(), source))
			.collect();
		let mut handles = Vec::with_capacity(order.len());

		for tag in order {
			let Some(source) = by_tag.get(&tag).cloned() else {
				continue;
			};
			let store = self.clone();

			handles.push(tokio::spawn(async move {
				let outcome = store.fetch_one_code_review_source(source, &tag, subsection).await;

				(tag, outcome)
			}));
		}

		aggregate(join_outcomes(handles).await)
	}

	async fn fetch_one_code_review_source(
		&self,
		source: Arc<dyn CodeReviewSource>,
		tag: &str,
		subsection: Subsection,
	) -> SourceOutcome<CodeReview> {
		if !source.is_available().await {
			tracing::debug!(source = tag, "source not available, skipping");

			return SourceOutcome::Skipped;
		}
		if !source.check_auth().await {
			tracing::debug!(source = tag, "source not authenticated, skipping");

			return SourceOutcome::Skipped;
		}

		let fetched = match subsection {
			Subsection::Assigned => source.fetch_assigned().await,
			Subsection::Opened => source.fetch_authored().await,
		};

		match fetched {
			Ok(reviews) => {
				self.health.record_success(tag);
				self.cache_payload(
					DataType::CodeReviews,
					tag,
					Some(subsection),
					&reviews,
					self.code_review_ttl,
				)
				.await;

				SourceOutcome::Fetched(reviews)
			},
			Err(err) => {
				let message = err.to_string();

				tracing::warn!(
					source = tag,
					subsection = %subsection,
					error = %message,
					"failed to fetch code reviews"
				);
				self.health.record_failure(tag, &message);
				self.cache
					.record_error(&cache_key(DataType::CodeReviews, tag, Some(subsection)), &message)
					.await;

				SourceOutcome::Failed(message)
			},
		}
	}

	async fn fetch_work_items(&self) -> FetchResult<WorkItem> {
		let sources = self.registry.work_item_sources();
		let tags: Vec<String> =
			sources.iter().map(|source| source.source_type().to_string()).collect();
		let order = self.health.priority_sources(&tags);
		let by_tag: HashMap<String, Arc<dyn WorkItemSource>> = sources
			.into_iter()
			.map(|source| (source.source_type().to_string(), source))
			.collect();
		let mut handles = Vec::with_capacity(order.len());

		for tag in order {
			let Some(source) = by_tag.get(&tag).cloned() else {
				continue;
			};
			let store = self.clone();

			handles.push(tokio::spawn(async move {
				let outcome = store.fetch_one_work_item_source(source, &tag).await;

				(tag, outcome)
			}));
		}

		aggregate(join_outcomes(handles).await)
	}

	async fn fetch_one_work_item_source(
		&self,
		source: Arc<dyn WorkItemSource>,
		tag: &str,
	) -> SourceOutcome<WorkItem> {
		if !source.is_available().await {
			tracing::debug!(source = tag, "source not available, skipping");

			return SourceOutcome::Skipped;
		}
		if !source.check_auth().await {
			tracing::debug!(source = tag, "source not authenticated, skipping");

			return SourceOutcome::Skipped;
		}

		match source.fetch_items().await {
			Ok(items) => {
				self.health.record_success(tag);
				self.cache_payload(DataType::WorkItems, tag, None, &items, self.work_item_ttl).await;

				SourceOutcome::Fetched(items)
			},
			Err(err) => {
				let message = err.to_string();

				tracing::warn!(source = tag, error = %message, "failed to fetch work items");
				self.health.record_failure(tag, &message);
				self.cache.record_error(&cache_key(DataType::WorkItems, tag, None), &message).await;

				SourceOutcome::Failed(message)
			},
		}
	}

	// Empty results are not cached so the next cycle retries cheaply.
	async fn cache_payload<T>(
		&self,
		data_type: DataType,
		tag: &str,
		subsection: Option<Subsection>,
		items: &[T],
		ttl: Duration,
	) where
		T: Serialize,
	{
		if items.is_empty() {
			return;
		}

		let payload = serialize_items(items);

		self.cache
			.set(
				&cache_key(data_type, tag, subsection),
				&payload,
				ttl,
				data_type.as_str(),
				tag,
				subsection.map(Subsection::as_str),
			)
			.await;
	}

	/// Read stale-tolerant cached payloads for every tag, returning `None`
	/// when no source contributed any items.
	async fn cached_read<T>(
		&self,
		data_type: DataType,
		subsection: Option<Subsection>,
		tags: &[String],
	) -> CachedRead<T>
	where
		T: DeserializeOwned,
	{
		let mut data = Vec::new();
		let mut errors = Vec::new();
		let mut any = false;

		for tag in tags {
			let key = cache_key(data_type, tag, subsection);
			let Some(raw) = self.cache.get(&key, true).await else {
				continue;
			};
			let items: Vec<T> = deserialize_items(raw, tag);

			if !items.is_empty() {
				any = true;
				data.extend(items);
			}

			// A row annotated with an error still serves its payload; the
			// source is reported as failed from the caller's perspective.
			if let Some(info) = self.cache.get_cache_info(&key).await
				&& let Some(error) = info.last_error
			{
				errors.push((tag.clone(), error));
			}
		}

		any.then_some((data, errors))
	}

	async fn any_fresh(
		&self,
		data_type: DataType,
		subsection: Option<Subsection>,
		tags: &[String],
	) -> bool {
		for tag in tags {
			if self.cache.is_fresh(&cache_key(data_type, tag, subsection)).await {
				return true;
			}
		}

		false
	}

	// TODO: Consider deduplicating refreshes per (data_type, subsection) if
	// redundant upstream calls under rapid-read patterns become measurable.
	async fn trigger_background_refresh(&self, target: RefreshTarget) {
		let store = self.clone();
		let timeout = self.background_timeout;
		let mut tasks = self.refresh_tasks.lock().await;

		// Reap finished refreshes so the set does not grow unbounded.
		while tasks.try_join_next().is_some() {}

		tasks.spawn(async move {
			let refresh = async {
				match target {
					RefreshTarget::CodeReviews(subsection) => {
						store.fetch_code_reviews(subsection).await;
					},
					RefreshTarget::WorkItems => {
						store.fetch_work_items().await;
					},
				}
			};

			if time::timeout(timeout, refresh).await.is_err() {
				tracing::warn!(?target, "background refresh timed out");
			}
		});
	}

	fn code_review_tags(&self) -> Vec<String> {
		self.registry
			.code_review_sources()
			.iter()
			.map(|source| source.source_type().to_string())
			.collect()
	}

	fn work_item_tags(&self) -> Vec<String> {
		self.registry
			.work_item_sources()
			.iter()
			.map(|source| source.source_type().to_string())
			.collect()
	}
}

async fn join_outcomes<T>(handles: Vec<FetchHandle<T>>) -> Vec<(String, SourceOutcome<T>)> {
	let mut outcomes = Vec::with_capacity(handles.len());

	// Awaiting in spawn order keeps accumulation deterministic while the
	// tasks themselves run concurrently.
	for handle in handles {
		match handle.await {
			Ok(outcome) => outcomes.push(outcome),
			Err(err) => {
				tracing::error!(error = %err, "fetch task failed");
			},
		}
	}

	outcomes
}

fn aggregate<T>(outcomes: Vec<(String, SourceOutcome<T>)>) -> FetchResult<T> {
	let mut data = Vec::new();
	let mut failed_sources = Vec::new();
	let mut errors = HashMap::new();

	for (tag, outcome) in outcomes {
		match outcome {
			SourceOutcome::Fetched(items) => data.extend(items),
			SourceOutcome::Failed(message) => {
				failed_sources.push(tag.clone());
				errors.insert(tag, message);
			},
			SourceOutcome::Skipped => {},
		}
	}

	FetchResult { data, fresh: true, failed_sources, errors }
}

fn cached_result<T>(data: Vec<T>, errors: Vec<(String, String)>) -> FetchResult<T> {
	let failed_sources = errors.iter().map(|(tag, _)| tag.clone()).collect();

	FetchResult { data, fresh: false, failed_sources, errors: errors.into_iter().collect() }
}

fn serialize_items<T>(items: &[T]) -> Vec<Value>
where
	T: Serialize,
{
	items
		.iter()
		.filter_map(|item| match serde_json::to_value(item) {
			Ok(value) => Some(value),
			Err(err) => {
				tracing::warn!(error = %err, "failed to serialize item for caching");

				None
			},
		})
		.collect()
}

fn deserialize_items<T>(raw: Vec<Value>, source_type: &str) -> Vec<T>
where
	T: DeserializeOwned,
{
	let mut items = Vec::with_capacity(raw.len());

	for value in raw {
		match serde_json::from_value(value) {
			Ok(item) => items.push(item),
			Err(err) => {
				tracing::warn!(source = source_type, error = %err, "failed to deserialize cached item");
			},
		}
	}

	items
}

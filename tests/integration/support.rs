//! Shared stubs and fixtures.

// std
use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use worklens::{
	Error, Result,
	db::Database,
	model::{CodeReview, JiraIssue, ReviewState, WorkItem},
	source::{CodeReviewSource, Source, WorkItemSource},
};

/// A minimal open review for the given id and provider tag.
pub fn review(id: &str, adapter_type: &str) -> CodeReview {
	CodeReview {
		id: id.to_string(),
		key: "!1".to_string(),
		title: "Fix".to_string(),
		state: ReviewState::Open,
		author: "alice".to_string(),
		source_branch: String::new(),
		url: "u1".to_string(),
		created_at: None,
		draft: false,
		adapter_type: adapter_type.to_string(),
		adapter_icon: "X".to_string(),
	}
}

/// A minimal open Jira work item for the given key.
pub fn jira_item(key: &str) -> WorkItem {
	WorkItem::Jira(JiraIssue {
		key: key.to_string(),
		summary: "Do the work".to_string(),
		status: "In Progress".to_string(),
		priority: Some("High".to_string()),
		assignee: None,
		url: format!("https://jira.example.com/browse/{key}"),
	})
}

/// Insert a cache row directly, backdating `cached_at` by `age`.
pub async fn seed_row(
	db: &Database,
	cache_key: &str,
	data_type: &str,
	provider: &str,
	subsection: Option<&str>,
	payload: &serde_json::Value,
	age: TimeDelta,
	ttl_seconds: i64,
) {
	sqlx::query(
		"INSERT INTO cached_data \
		(cache_key, data_type, provider, subsection, payload, cached_at, ttl_seconds, fetch_count) \
		VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
	)
	.bind(cache_key)
	.bind(data_type)
	.bind(provider)
	.bind(subsection)
	.bind(payload.to_string())
	.bind(Utc::now() - age)
	.bind(ttl_seconds)
	.execute(db.pool())
	.await
	.expect("seed cache row");
}

/// Scripted behavior for a stub fetch method.
#[derive(Clone)]
pub enum Behavior {
	/// Return the reviews or items.
	Return(Vec<serde_json::Value>),
	/// Fail with the message.
	Fail(String),
}

fn run<T>(behavior: &Behavior, source_type: &str) -> Result<Vec<T>>
where
	T: serde::de::DeserializeOwned,
{
	match behavior {
		Behavior::Return(values) => Ok(values
			.iter()
			.map(|value| serde_json::from_value(value.clone()).expect("stub payload"))
			.collect()),
		Behavior::Fail(message) => Err(Error::Source {
			source_type: source_type.to_string(),
			message: message.clone(),
		}),
	}
}

fn encode<T>(items: Vec<T>) -> Vec<serde_json::Value>
where
	T: serde::Serialize,
{
	items.into_iter().map(|item| serde_json::to_value(item).expect("stub payload")).collect()
}

/// Scriptable code review source.
pub struct StubReviewSource {
	tag: &'static str,
	available: bool,
	authenticated: bool,
	assigned: Mutex<Behavior>,
	authored: Mutex<Behavior>,
	fetch_calls: AtomicUsize,
}
impl StubReviewSource {
	/// A healthy source returning `reviews` from both fetch methods.
	pub fn returning(tag: &'static str, reviews: Vec<CodeReview>) -> Arc<Self> {
		let values = encode(reviews);

		Arc::new(Self {
			tag,
			available: true,
			authenticated: true,
			assigned: Mutex::new(Behavior::Return(values.clone())),
			authored: Mutex::new(Behavior::Return(values)),
			fetch_calls: AtomicUsize::new(0),
		})
	}

	/// A source whose fetch methods fail with `message`.
	pub fn failing(tag: &'static str, message: &str) -> Arc<Self> {
		Arc::new(Self {
			tag,
			available: true,
			authenticated: true,
			assigned: Mutex::new(Behavior::Fail(message.to_string())),
			authored: Mutex::new(Behavior::Fail(message.to_string())),
			fetch_calls: AtomicUsize::new(0),
		})
	}

	/// A source reporting itself unavailable.
	pub fn unavailable(tag: &'static str) -> Arc<Self> {
		Arc::new(Self {
			tag,
			available: false,
			authenticated: true,
			assigned: Mutex::new(Behavior::Return(Vec::new())),
			authored: Mutex::new(Behavior::Return(Vec::new())),
			fetch_calls: AtomicUsize::new(0),
		})
	}

	/// Rescript the assigned fetch.
	pub fn set_assigned(&self, reviews: Vec<CodeReview>) {
		*self.assigned.lock().expect("stub lock") = Behavior::Return(encode(reviews));
	}

	/// Number of fetch calls observed across both methods.
	pub fn fetch_calls(&self) -> usize {
		self.fetch_calls.load(Ordering::SeqCst)
	}
}
#[async_trait]
impl Source for StubReviewSource {
	fn source_type(&self) -> &str {
		self.tag
	}

	fn source_icon(&self) -> &str {
		"X"
	}

	async fn is_available(&self) -> bool {
		self.available
	}

	async fn check_auth(&self) -> bool {
		self.authenticated
	}
}
#[async_trait]
impl CodeReviewSource for StubReviewSource {
	async fn fetch_assigned(&self) -> Result<Vec<CodeReview>> {
		self.fetch_calls.fetch_add(1, Ordering::SeqCst);

		let behavior = self.assigned.lock().expect("stub lock").clone();

		run(&behavior, self.tag)
	}

	async fn fetch_authored(&self) -> Result<Vec<CodeReview>> {
		self.fetch_calls.fetch_add(1, Ordering::SeqCst);

		let behavior = self.authored.lock().expect("stub lock").clone();

		run(&behavior, self.tag)
	}

	async fn fetch_pending_review(&self) -> Result<Vec<CodeReview>> {
		Ok(Vec::new())
	}
}

/// Scriptable work item source.
pub struct StubWorkSource {
	tag: &'static str,
	available: bool,
	authenticated: bool,
	items: Mutex<Behavior>,
}
impl StubWorkSource {
	/// A healthy source returning `items`.
	pub fn returning(tag: &'static str, items: Vec<WorkItem>) -> Arc<Self> {
		Arc::new(Self {
			tag,
			available: true,
			authenticated: true,
			items: Mutex::new(Behavior::Return(encode(items))),
		})
	}

	/// A source whose fetch fails with `message`.
	pub fn failing(tag: &'static str, message: &str) -> Arc<Self> {
		Arc::new(Self {
			tag,
			available: true,
			authenticated: true,
			items: Mutex::new(Behavior::Fail(message.to_string())),
		})
	}
}
#[async_trait]
impl Source for StubWorkSource {
	fn source_type(&self) -> &str {
		self.tag
	}

	fn source_icon(&self) -> &str {
		"X"
	}

	async fn is_available(&self) -> bool {
		self.available
	}

	async fn check_auth(&self) -> bool {
		self.authenticated
	}
}
#[async_trait]
impl WorkItemSource for StubWorkSource {
	async fn fetch_items(&self) -> Result<Vec<WorkItem>> {
		let behavior = self.items.lock().expect("stub lock").clone();

		run(&behavior, self.tag)
	}
}

//! Cache backend invariants: freshness, stale reads, invalidation scope,
//! error annotation, and compaction.

// std
use std::time::Duration;
// crates.io
use chrono::TimeDelta;
use serde_json::json;
use worklens::db::{Database, backend::CacheBackend, preferences::Preferences};
// self
use crate::support;

fn payload(id: &str) -> Vec<serde_json::Value> {
	vec![json!({ "id": id })]
}

#[tokio::test]
async fn set_makes_a_key_fresh_until_its_ttl_elapses() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db.clone());

	cache
		.set("code_reviews:gitlab:assigned", &payload("a"), Duration::from_secs(300), "code_reviews", "gitlab", Some("assigned"))
		.await;

	assert!(cache.is_fresh("code_reviews:gitlab:assigned").await);

	// A row written longer ago than its TTL reads as expired.
	support::seed_row(
		&db,
		"code_reviews:gitlab:opened",
		"code_reviews",
		"gitlab",
		Some("opened"),
		&json!([{ "id": "b" }]),
		TimeDelta::seconds(301),
		300,
	)
	.await;

	assert!(!cache.is_fresh("code_reviews:gitlab:opened").await);
	assert!(cache.get("code_reviews:gitlab:opened", false).await.is_none());
}

#[tokio::test]
async fn stale_rows_remain_reachable_until_replaced_or_invalidated() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db.clone());

	support::seed_row(
		&db,
		"work_items:jira",
		"work_items",
		"jira",
		None,
		&json!([{ "id": "stale" }]),
		TimeDelta::hours(2),
		300,
	)
	.await;

	let stale = cache.get("work_items:jira", true).await.expect("stale payload");

	assert_eq!(stale[0]["id"], "stale");

	cache.set("work_items:jira", &payload("fresh"), Duration::from_secs(300), "work_items", "jira", None).await;

	let replaced = cache.get("work_items:jira", true).await.expect("replaced payload");

	assert_eq!(replaced[0]["id"], "fresh");

	cache.invalidate(None, Some("jira")).await;

	assert!(cache.get("work_items:jira", true).await.is_none());
}

#[tokio::test]
async fn invalidation_scope_matches_its_filters() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db);
	let rows = [
		("code_reviews:gitlab:assigned", "code_reviews", "gitlab", Some("assigned")),
		("code_reviews:github:assigned", "code_reviews", "github", Some("assigned")),
		("work_items:gitlab", "work_items", "gitlab", None),
		("work_items:jira", "work_items", "jira", None),
	];

	for (key, data_type, provider, subsection) in rows {
		cache.set(key, &payload(key), Duration::from_secs(300), data_type, provider, subsection).await;
	}

	cache.invalidate(Some("code_reviews"), Some("gitlab")).await;

	assert!(cache.get_cache_info("code_reviews:gitlab:assigned").await.is_none());
	assert!(cache.get_cache_info("code_reviews:github:assigned").await.is_some());
	assert!(cache.get_cache_info("work_items:gitlab").await.is_some());

	cache.invalidate(Some("code_reviews"), None).await;

	assert!(cache.get_cache_info("code_reviews:github:assigned").await.is_none());
	assert!(cache.get_cache_info("work_items:jira").await.is_some());

	cache.invalidate(None, None).await;

	assert!(cache.get_cache_info("work_items:gitlab").await.is_none());
	assert!(cache.get_cache_info("work_items:jira").await.is_none());
}

#[tokio::test]
async fn record_error_annotates_without_touching_the_payload() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db);

	cache.set("work_items:jira", &payload("kept"), Duration::from_secs(300), "work_items", "jira", None).await;
	cache.record_error("work_items:jira", "rate limited").await;

	let info = cache.get_cache_info("work_items:jira").await.expect("cache info");

	assert_eq!(info.last_error.as_deref(), Some("rate limited"));
	assert_eq!(info.fetch_count, 1);
	assert!(info.is_valid);
	assert_eq!(info.data_type, "work_items");
	assert_eq!(info.provider, "jira");

	let served = cache.get("work_items:jira", false).await.expect("payload");

	assert_eq!(served[0]["id"], "kept");

	// A replacement write clears the annotation.
	cache.set("work_items:jira", &payload("next"), Duration::from_secs(300), "work_items", "jira", None).await;

	let info = cache.get_cache_info("work_items:jira").await.expect("cache info");

	assert!(info.last_error.is_none());

	// Annotating a missing row is a no-op.
	cache.record_error("work_items:todoist", "nope").await;

	assert!(cache.get_cache_info("work_items:todoist").await.is_none());
}

#[tokio::test]
async fn writes_compact_rows_older_than_the_cleanup_window() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db.clone());

	support::seed_row(
		&db,
		"work_items:ancient",
		"work_items",
		"ancient",
		None,
		&json!([{ "id": "ancient" }]),
		TimeDelta::days(40),
		300,
	)
	.await;

	cache.set("work_items:jira", &payload("now"), Duration::from_secs(300), "work_items", "jira", None).await;

	assert!(cache.get_cache_info("work_items:ancient").await.is_none());
	assert!(cache.get_cache_info("work_items:jira").await.is_some());
}

#[tokio::test]
async fn malformed_payloads_read_as_misses() {
	let db = Database::in_memory().await.expect("db");
	let cache = CacheBackend::new(db.clone());

	support::seed_row(
		&db,
		"work_items:jira",
		"work_items",
		"jira",
		None,
		&json!({ "not": "an array" }),
		TimeDelta::zero(),
		300,
	)
	.await;

	assert!(cache.get("work_items:jira", true).await.is_none());
}

#[tokio::test]
async fn cache_rows_survive_reopening_the_database() {
	let dir = tempfile::tempdir().expect("tempdir");
	let path = dir.path().join("worklens.db");

	{
		let db = Database::open(&path).await.expect("open");
		let cache = CacheBackend::new(db.clone());

		cache.set("work_items:jira", &payload("persisted"), Duration::from_secs(300), "work_items", "jira", None).await;
		db.close().await;
	}

	let db = Database::open(&path).await.expect("reopen");
	let cache = CacheBackend::new(db);
	let served = cache.get("work_items:jira", true).await.expect("persisted payload");

	assert_eq!(served[0]["id"], "persisted");
}

#[tokio::test]
async fn preferences_round_trip_and_delete() {
	let db = Database::in_memory().await.expect("db");
	let prefs = Preferences::new(db);

	assert_eq!(prefs.get::<String>("last_active_section").await, None);

	prefs.set("last_active_section", &"mr".to_string()).await;

	assert_eq!(prefs.get::<String>("last_active_section").await.as_deref(), Some("mr"));

	prefs.set("last_active_section", &"items".to_string()).await;

	assert_eq!(prefs.get::<String>("last_active_section").await.as_deref(), Some("items"));

	prefs.delete("last_active_section").await;

	assert_eq!(prefs.get::<String>("last_active_section").await, None);
}

//! Source health recovery and prioritization through the public surface.

// std
use std::time::Duration;
// crates.io
use worklens::health::SourceHealth;

fn tags(values: &[&str]) -> Vec<String> {
	values.iter().map(|value| value.to_string()).collect()
}

#[tokio::test]
async fn recovery_restores_registration_order() {
	let health = SourceHealth::new();

	health.record_failure("x", "e1");
	health.record_failure("x", "e2");

	assert_eq!(health.priority_sources(&tags(&["x", "y"])), tags(&["x", "y"]));

	let info = health.failure_info("x").expect("failure info");

	assert_eq!(info.failure_count, 2);
	assert_eq!(info.error, "e2");

	assert_eq!(health.record_success("x"), Some(2));
	assert!(health.failure_info("x").is_none());
	assert_eq!(health.priority_sources(&tags(&["x", "y"])), tags(&["x", "y"]));
	assert!(health.failed_sources().is_empty());
}

#[tokio::test]
async fn most_failing_sources_lead_the_priority_order() {
	let health = SourceHealth::new();

	health.record_failure("b", "boom");
	health.record_failure("c", "boom");
	health.record_failure("c", "boom");

	assert_eq!(health.priority_sources(&tags(&["a", "b", "c"])), tags(&["c", "b", "a"]));
}

#[tokio::test(start_paused = true)]
async fn retry_delay_doubles_per_failure_up_to_the_clamp() {
	let health = SourceHealth::with_delays(Duration::from_secs(30), Duration::from_secs(300));
	let mut observed = Vec::new();

	for _ in 0..5 {
		health.record_failure("s", "boom");
		observed.push(health.retry_delay("s"));
	}

	for pair in observed.windows(2) {
		assert!(pair[1] >= pair[0]);
	}

	assert!(*observed.last().expect("delays") <= Duration::from_secs(300));
}

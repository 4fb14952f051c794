#![cfg(feature = "test")]

// std
use std::{env, process};
// self
use session_broker::{
	_preludet::*,
	auth::{Credential, TokenSecret},
	clock::Clock,
	config::SessionPolicy,
	session::{Coordinator, Phase, RenewOutcome},
	store::{FileHintStore, MemoryHintStore},
};

fn temp_hint_path(tag: &str) -> std::path::PathBuf {
	let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();

	env::temp_dir()
		.join(format!("session-broker-{tag}-{}-{nanos}", process::id()))
		.join("hint.json")
}

#[tokio::test]
async fn session_idle_past_lifetime_renews_before_use() {
	let (coordinator, api, clock) = build_test_coordinator();

	coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");
	clock.advance(Duration::minutes(16));

	let token = coordinator.ensure_fresh().await.expect("Expired session should be renewed.");
	let credential = coordinator.credential();

	assert_eq!(token.expose(), "access-refresh-1");
	assert_eq!(api.refresh_calls(), 1);
	assert_eq!(credential.issued_at, Some(clock.now()));
	assert_eq!(coordinator.phase(), Phase::Authenticated);

	let again = coordinator.ensure_fresh().await.expect("Renewed token should be fresh.");

	assert_eq!(again, token);
	assert_eq!(api.refresh_calls(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_exchange() {
	let (coordinator, api, clock) = build_test_coordinator();

	coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");
	clock.advance(Duration::minutes(14) + Duration::seconds(5));

	let hold = api.hold_refresh().await;
	let release = async {
		for _ in 0..8 {
			tokio::task::yield_now().await;
		}

		drop(hold);
	};
	let (a, b, c, d, ()) = tokio::join!(
		coordinator.ensure_fresh(),
		coordinator.ensure_fresh(),
		coordinator.ensure_fresh(),
		coordinator.ensure_fresh(),
		release,
	);

	for token in [a, b, c, d] {
		assert_eq!(
			token.expect("Every caller should get the shared token.").expose(),
			"access-refresh-1"
		);
	}

	assert_eq!(api.refresh_calls(), 1);
	assert_eq!(coordinator.metrics().attempts(), 1);
	assert_eq!(coordinator.metrics().joined(), 3);
	assert_eq!(coordinator.metrics().successes(), 1);
}

#[tokio::test]
async fn renewal_right_after_completion_is_debounced() {
	let policy = SessionPolicy::builder()
		.refresh_debounce(Duration::seconds(2))
		.build()
		.expect("Policy fixture should be valid.");
	let (coordinator, api, clock) =
		build_test_coordinator_with(policy, Arc::new(MemoryHintStore::default()));

	coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");

	assert!(matches!(coordinator.renew().await, RenewOutcome::Renewed(_)));

	clock.advance_ms(1_500);

	let RenewOutcome::TooSoon { retry_in } = coordinator.renew().await else {
		panic!("Renewal inside the debounce window should be refused.");
	};

	assert_eq!(retry_in, Duration::milliseconds(500));

	clock.advance_ms(500);

	assert!(matches!(coordinator.renew().await, RenewOutcome::Renewed(_)));
	assert_eq!(api.refresh_calls(), 2);
	assert_eq!(coordinator.metrics().debounced(), 1);
}

#[tokio::test]
async fn bootstrap_without_refresh_token_signs_out() {
	let api = Arc::new(ScriptedAuthApi::default());
	let clock = Arc::new(ManualClock::default());
	let coordinator = Coordinator::builder(api.clone())
		.clock(clock.clone())
		.seed(Credential {
			access_token: Some(TokenSecret::new("a-expired")),
			refresh_token: None,
			issued_at: Some(clock.now() - Duration::hours(2)),
			user: None,
		})
		.build();

	api.fail_next_profile(Scripted::Unauthorized);

	assert_eq!(coordinator.initialize().await, Phase::Unauthenticated);
	assert_eq!(coordinator.initialize().await, Phase::Unauthenticated);
	assert_eq!(api.profile_calls(), 1);
	assert_eq!(api.refresh_calls(), 0);
	assert!(coordinator.state().has_bootstrapped);
	assert_eq!(coordinator.credential(), Credential::default());
}

#[tokio::test]
async fn login_hint_crosses_coordinators_through_a_file() {
	let path = temp_hint_path("hint");
	let api = Arc::new(ScriptedAuthApi::default());
	let clock = Arc::new(ManualClock::default());
	let login_page = Coordinator::builder(api.clone())
		.clock(clock.clone())
		.hint_store(Arc::new(FileHintStore::open(&path).expect("Hint store should open.")))
		.build();

	login_page.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");

	let reloaded = Coordinator::builder(api.clone())
		.clock(clock.clone())
		.hint_store(Arc::new(FileHintStore::open(&path).expect("Hint store should reopen.")))
		.seed(login_page.credential())
		.build();
	let user = reloaded.sync_login_hint().await.expect("Hint sync should succeed.");

	assert_eq!(user, Some(demo_user()));
	assert!(reloaded.is_authenticated());
	assert_eq!(reloaded.sync_login_hint().await.expect("Second sync should succeed."), None);
	assert!(!path.exists());

	if let Some(dir) = path.parent() {
		let _ = std::fs::remove_dir_all(dir);
	}
}

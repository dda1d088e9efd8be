// std
use std::{future, sync::mpsc, thread, time::Duration as StdDuration};
// crates.io
use tokio::{runtime::Handle, sync::broadcast::error::TryRecvError};
// self
use oauth2_account::{
	_preludet::*,
	auth::{Credential, Identity, TokenPair, TokenSecret},
	coordinator::{BlockingCoordinator, Coordinator, LoginReason},
	store::{CredentialStore, MemoryStore},
};

fn seed(store: &MemoryStore, identity: &Identity, access: &str, refresh: Option<&str>) {
	store.insert(
		identity.clone(),
		Credential::new(TokenSecret::new(access), refresh.map(TokenSecret::new)),
	);
}

fn network_error(message: &str) -> Error {
	Error::Network { message: message.into(), status: None, retry_after: None, source: None }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	tokio::time::timeout(StdDuration::from_secs(5), async {
		while !condition() {
			tokio::time::sleep(StdDuration::from_millis(5)).await;
		}
	})
	.await
	.expect("Condition should hold before the timeout elapses.");
}

fn spawn_refreshes(
	coordinator: &Coordinator,
	identity: &Identity,
	stale: &'static str,
	count: usize,
) -> Vec<tokio::task::JoinHandle<Result<Credential>>> {
	(0..count)
		.map(|_| {
			let coordinator = coordinator.clone();
			let identity = identity.clone();

			tokio::spawn(async move { coordinator.request_refresh(&identity, Some(stale)).await })
		})
		.collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_refresh() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "a0", Some("r1"));

	let tasks = spawn_refreshes(&coordinator, &identity, "a0", 3);

	wait_until(|| coordinator.pending_waiters(&identity) == 3 && operation.calls() == 1).await;

	assert!(coordinator.is_refreshing(&identity));

	operation.release(1);

	for task in tasks {
		let credential = task
			.await
			.expect("Refresh task should not panic.")
			.expect("Every waiter should receive the refreshed credential.");

		assert_eq!(credential.access_token.expose(), "a1");
		assert_eq!(credential.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
	}

	assert_eq!(operation.calls(), 1);
	assert!(!coordinator.is_refreshing(&identity));
	assert_eq!(coordinator.pending_waiters(&identity), 0);
	assert_eq!(coordinator.metrics().refreshes(), 1);
	assert_eq!(coordinator.metrics().joined(), 2);

	let stored = store.refresh_token(&identity).await.expect("Store lookup should succeed.");

	assert_eq!(stored.as_ref().map(TokenSecret::expose), Some("r2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_fan_out_to_every_waiter() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::failing(network_error("connection reset")).gated());
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "a0", Some("r1"));

	let tasks = spawn_refreshes(&coordinator, &identity, "a0", 3);

	wait_until(|| coordinator.pending_waiters(&identity) == 3).await;
	operation.release(1);

	for task in tasks {
		let err = task
			.await
			.expect("Refresh task should not panic.")
			.expect_err("Every waiter should observe the shared failure.");

		assert!(err.is_transient());
	}

	assert_eq!(operation.calls(), 1);
	assert_eq!(coordinator.metrics().failures(), 1);

	// A failed cycle leaves the stored credential untouched and the slot ready for a new attempt.
	let refresh = store.refresh_token(&identity).await.expect("Store lookup should succeed.");

	assert_eq!(refresh.as_ref().map(TokenSecret::expose), Some("r1"));

	operation.set_outcome(Ok(TokenPair::new("a1", "r2")));
	operation.release(1);

	let credential = coordinator
		.request_refresh(&identity, Some("a0"))
		.await
		.expect("A later refresh should start a fresh cycle.");

	assert_eq!(credential.access_token.expose(), "a1");
	assert_eq!(operation.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_refresh_token_requests_login_without_calling_the_operation() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")));
	let identity = identity("u2", "com.example");
	let mut login = coordinator.subscribe_login_requests();

	seed(&store, &identity, "", None);

	let (first, second, third) = tokio::join!(
		coordinator.get_token(&identity),
		coordinator.request_refresh(&identity, Some("a0")),
		coordinator.request_refresh(&identity, None),
	);

	for result in [first, second, third] {
		assert!(matches!(
			result,
			Err(Error::NotLoggedIn { identity: Some(ref failed) }) if failed == &identity
		));
	}

	assert_eq!(operation.calls(), 0);

	let request = login.try_recv().expect("A login request should have been broadcast.");

	assert_eq!(request.identity, identity);
	assert_eq!(request.reason, LoginReason::NotLoggedIn);
}

#[tokio::test]
async fn rejected_refresh_requests_login() {
	let (coordinator, store, _) =
		build_test_coordinator(ScriptedRefresh::failing(Error::rejected("invalid_grant")));
	let identity = identity("u1", "com.example");
	let mut login = coordinator.subscribe_login_requests();

	seed(&store, &identity, "a0", Some("r1"));

	let err = coordinator
		.request_refresh(&identity, Some("a0"))
		.await
		.expect_err("A rejected refresh token should fail the refresh.");

	assert!(err.requires_login());
	assert_eq!(
		login.try_recv().expect("A login request should have been broadcast.").reason,
		LoginReason::Rejected
	);
	assert!(matches!(login.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn network_failures_do_not_request_login() {
	let (coordinator, store, _) =
		build_test_coordinator(ScriptedRefresh::failing(network_error("timed out")));
	let identity = identity("u1", "com.example");
	let mut login = coordinator.subscribe_login_requests();

	seed(&store, &identity, "a0", Some("r1"));

	assert!(coordinator.request_refresh(&identity, None).await.is_err());
	assert!(matches!(login.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn cached_tokens_are_served_without_refreshing() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")));
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "a0", Some("r1"));

	let credential = coordinator.get_token(&identity).await.expect("Cached token should be served.");

	assert_eq!(credential.access_token.expose(), "a0");
	assert_eq!(operation.calls(), 0);

	// The cache already moved past the rejected token, so no new refresh is needed.
	let reused = coordinator
		.request_refresh(&identity, Some("stale-token"))
		.await
		.expect("A token different from the stale one should be reused.");

	assert_eq!(reused.access_token.expose(), "a0");
	assert_eq!(operation.calls(), 0);
	assert_eq!(coordinator.metrics().reused(), 1);

	let forced =
		coordinator.request_refresh(&identity, None).await.expect("Forced refresh should succeed.");

	assert_eq!(forced.access_token.expose(), "a1");
	assert_eq!(operation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_refresh_does_not_block_other_identities() {
	let store = Arc::new(MemoryStore::default());
	let operation = |identity: Identity, _: TokenSecret| async move {
		if &*identity.name == "slow" {
			future::pending::<()>().await;
		}

		Ok::<_, Error>(TokenPair::new(format!("fresh-{}", identity.name), "r2"))
	};
	let coordinator = Coordinator::new(store.clone(), Arc::new(operation));
	let slow = identity("slow", "com.example");
	let fast = identity("fast", "com.example");

	seed(&store, &slow, "", Some("r1"));
	seed(&store, &fast, "", Some("r1"));

	let stuck = {
		let coordinator = coordinator.clone();
		let slow = slow.clone();

		tokio::spawn(async move { coordinator.get_token(&slow).await })
	};

	wait_until(|| coordinator.is_refreshing(&slow)).await;

	let credential = tokio::time::timeout(StdDuration::from_secs(5), coordinator.get_token(&fast))
		.await
		.expect("Another identity's refresh should not wait on the stuck one.")
		.expect("Refresh for the fast identity should succeed.");

	assert_eq!(credential.access_token.expose(), "fresh-fast");
	assert!(coordinator.is_refreshing(&slow));

	stuck.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn callbacks_join_the_same_waiter_queue() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");
	let (tx, rx) = tokio::sync::oneshot::channel();

	seed(&store, &identity, "a0", Some("r1"));

	let leader = spawn_refreshes(&coordinator, &identity, "a0", 1);

	wait_until(|| coordinator.pending_waiters(&identity) == 1).await;
	coordinator.request_refresh_with(&Handle::current(), &identity, Some("a0"), move |result| {
		let _ = tx.send(result);
	});

	assert_eq!(coordinator.pending_waiters(&identity), 2);

	operation.release(1);

	let from_callback = rx
		.await
		.expect("Callback should run exactly once.")
		.expect("Callback should receive the refreshed credential.");

	for task in leader {
		let credential = task
			.await
			.expect("Refresh task should not panic.")
			.expect("Async waiter should receive the refreshed credential.");

		assert_eq!(credential.access_token, from_callback.access_token);
	}

	assert_eq!(from_callback.access_token.expose(), "a1");
	assert_eq!(operation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn callback_leader_runs_on_the_runtime() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::access_only("a1")));
	let identity = identity("u1", "com.example");
	let (tx, rx) = tokio::sync::oneshot::channel();

	seed(&store, &identity, "a0", Some("r1"));
	coordinator.request_refresh_with(&Handle::current(), &identity, None, move |result| {
		let _ = tx.send(result);
	});

	let credential = rx
		.await
		.expect("Callback should run exactly once.")
		.expect("Spawned leader should refresh successfully.");

	assert_eq!(credential.access_token.expose(), "a1");
	// Without rotation the previous refresh token stays in place.
	assert_eq!(credential.refresh_token.as_ref().map(TokenSecret::expose), Some("r1"));
	assert_eq!(operation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_caller_does_not_cancel_the_shared_refresh() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "a0", Some("r1"));

	let mut tasks = spawn_refreshes(&coordinator, &identity, "a0", 1);

	wait_until(|| operation.calls() == 1).await;
	tasks.extend(spawn_refreshes(&coordinator, &identity, "a0", 1));
	wait_until(|| coordinator.pending_waiters(&identity) == 2).await;

	let follower = tasks.pop().expect("Follower task should exist.");
	let first = tasks.pop().expect("First caller task should exist.");

	first.abort();

	assert!(first.await.expect_err("Aborted caller should not finish.").is_cancelled());
	assert!(coordinator.is_refreshing(&identity));

	operation.release(1);

	let credential = follower
		.await
		.expect("Follower task should not panic.")
		.expect("Follower should receive the refresh started by the aborted caller.");

	assert_eq!(credential.access_token.expose(), "a1");
	assert_eq!(operation.calls(), 1);

	let stored = store.refresh_token(&identity).await.expect("Store lookup should succeed.");

	assert_eq!(stored.as_ref().map(TokenSecret::expose), Some("r2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn caller_timeout_still_persists_the_rotated_token() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "a0", Some("r1"));

	let impatient = {
		let coordinator = coordinator.clone();
		let identity = identity.clone();

		tokio::spawn(async move {
			tokio::time::timeout(
				StdDuration::from_millis(100),
				coordinator.request_refresh(&identity, Some("a0")),
			)
			.await
		})
	};

	wait_until(|| operation.calls() == 1).await;

	let follower = spawn_refreshes(&coordinator, &identity, "a0", 1)
		.pop()
		.expect("Follower task should exist.");

	wait_until(|| coordinator.pending_waiters(&identity) == 2).await;

	assert!(
		impatient.await.expect("Timed caller should not panic.").is_err(),
		"The caller-level timeout should elapse while the refresh is held."
	);

	operation.release(1);

	let credential = follower
		.await
		.expect("Follower task should not panic.")
		.expect("Follower should receive the refreshed credential.");

	assert_eq!(credential.access_token.expose(), "a1");

	let stored = store.refresh_token(&identity).await.expect("Store lookup should succeed.");

	assert_eq!(stored.as_ref().map(TokenSecret::expose), Some("r2"));
	assert_eq!(operation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn joiner_is_never_handed_the_token_it_reported_stale() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");

	seed(&store, &identity, "", Some("r1"));

	let leader = {
		let coordinator = coordinator.clone();
		let identity = identity.clone();

		tokio::spawn(async move { coordinator.get_token(&identity).await })
	};

	wait_until(|| operation.calls() == 1).await;

	// This caller already saw `a1` rejected, but queues behind the refresh that produces it.
	let rejected_a1 =
		spawn_refreshes(&coordinator, &identity, "a1", 1).pop().expect("Joiner task should exist.");

	wait_until(|| coordinator.pending_waiters(&identity) == 2).await;
	operation.release(1);

	let first = leader
		.await
		.expect("Leader task should not panic.")
		.expect("Leader should receive the refreshed credential.");

	assert_eq!(first.access_token.expose(), "a1");

	wait_until(|| operation.calls() == 2).await;
	operation.set_outcome(Ok(TokenPair::new("a2", "r3")));
	operation.release(1);

	let renewed = rejected_a1
		.await
		.expect("Joiner task should not panic.")
		.expect("Joiner should receive a token from a follow-up refresh.");

	assert_eq!(renewed.access_token.expose(), "a2");
	assert_eq!(operation.calls(), 2);

	let stored = store.refresh_token(&identity).await.expect("Store lookup should succeed.");

	assert_eq!(stored.as_ref().map(TokenSecret::expose), Some("r3"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_callers_park_on_the_shared_refresh() {
	let (coordinator, store, operation) =
		build_test_coordinator(ScriptedRefresh::succeeding(TokenPair::new("a1", "r2")).gated());
	let identity = identity("u1", "com.example");
	let blocking = BlockingCoordinator::new(coordinator.clone(), Handle::current());
	let (tx, rx) = mpsc::channel();

	seed(&store, &identity, "", Some("r1"));

	let workers: Vec<_> = (0..3)
		.map(|_| {
			let blocking = blocking.clone();
			let identity = identity.clone();
			let tx = tx.clone();

			thread::spawn(move || {
				let _ = tx.send(blocking.get_token(&identity));
			})
		})
		.collect();

	wait_until(|| coordinator.pending_waiters(&identity) == 3).await;
	operation.release(1);

	for worker in workers {
		tokio::task::spawn_blocking(move || worker.join())
			.await
			.expect("Join task should not panic.")
			.expect("Blocking worker should not panic.");
	}

	for _ in 0..3 {
		let credential = rx
			.recv_timeout(StdDuration::from_secs(5))
			.expect("Every blocking worker should report a result.")
			.expect("Every blocking worker should receive the refreshed credential.");

		assert_eq!(credential.access_token.expose(), "a1");
	}

	assert_eq!(operation.calls(), 1);
	assert_eq!(blocking.coordinator().metrics().joined(), 2);
}

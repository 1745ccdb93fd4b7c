// std
use std::sync::Arc;
// crates.io
use serde_json::json;
use time::Duration;
use tokio::sync::Semaphore;
// self
use ems_gateway::{
	auth::TokenSecret,
	config::{DEFAULT_REFRESH_PATH, GatewayConfig},
	error::{Error, TransportError},
	gateway::Gateway,
	http::{ApiRequest, ApiResponse, ScriptedTransport},
	navigation::RecordingNavigator,
	refresh::RefreshError,
	store::{MemoryStore, StoreError, StoreFuture, TokenStore},
};

const DETAILS: &str = "user/details/";
const FORMS: &str = "employee/forms/";

struct Harness {
	gateway: Gateway<ScriptedTransport>,
	transport: ScriptedTransport,
	store: MemoryStore,
	navigator: RecordingNavigator,
}

fn harness(access: Option<&str>, refresh: Option<&str>) -> Harness {
	let transport = ScriptedTransport::default();
	let store = MemoryStore::with_tokens(access, refresh);
	let navigator = RecordingNavigator::default();
	let gateway = Gateway::with_transport(
		GatewayConfig::default(),
		Arc::new(store.clone()),
		Arc::new(navigator.clone()),
		transport.clone(),
	)
	.expect("Default gateway configuration should be valid.");

	Harness { gateway, transport, store, navigator }
}

/// Answers 200 only for the `new` token, 401 otherwise.
fn accept_new_token(transport: &ScriptedTransport, path: &str) {
	transport.respond(path, |request| match request.bearer() {
		Some("new") => ApiResponse::new(200, "{\"email\":\"ada@example.com\"}"),
		_ => ApiResponse::new(401, "{\"detail\":\"Given token not valid for any token type\"}"),
	});
}

fn rotate_to_new(transport: &ScriptedTransport) {
	transport.respond_refresh(|_| {
		ApiResponse::json_body(200, &json!({ "access": "new", "refresh": "new2" }))
	});
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
	tokio::time::timeout(std::time::Duration::from_secs(5), async {
		while !condition() {
			tokio::task::yield_now().await;
		}
	})
	.await
	.expect("Condition should hold within five seconds.");
}

/// Memory store whose refresh-token reads wait for a permit.
#[derive(Clone)]
struct GatedStore {
	inner: MemoryStore,
	refresh_gate: Arc<Semaphore>,
}
impl GatedStore {
	fn new(inner: MemoryStore) -> Self {
		Self { inner, refresh_gate: Arc::new(Semaphore::new(0)) }
	}
}
impl TokenStore for GatedStore {
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		self.inner.access_token()
	}

	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move {
			self.refresh_gate
				.acquire()
				.await
				.map_err(|e| StoreError::Backend { message: e.to_string() })?
				.forget();

			self.inner.refresh_token().await
		})
	}

	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		self.inner.set_access_token(token)
	}

	fn set_refresh_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		self.inner.set_refresh_token(token)
	}

	fn clear_tokens(&self) -> StoreFuture<'_, ()> {
		self.inner.clear_tokens()
	}
}

fn stored(store: &MemoryStore) -> (Option<String>, Option<String>) {
	let slots = store.snapshot();

	(
		slots.access_token.as_ref().map(|token| token.expose().to_owned()),
		slots.refresh_token.as_ref().map(|token| token.expose().to_owned()),
	)
}

#[tokio::test]
async fn valid_token_passes_straight_through() {
	let h = harness(Some("new"), Some("r1"));

	accept_new_token(&h.transport, DETAILS);

	let response =
		h.gateway.send(ApiRequest::get(DETAILS)).await.expect("Authorized request should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(response.text(), "{\"email\":\"ada@example.com\"}");
	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(h.gateway.refresh_metrics().cycles(), 0);
}

#[tokio::test]
async fn stale_token_is_refreshed_and_replayed() {
	let h = harness(Some("stale"), Some("r1"));

	accept_new_token(&h.transport, DETAILS);
	rotate_to_new(&h.transport);

	let response =
		h.gateway.send(ApiRequest::get(DETAILS)).await.expect("Replay should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(stored(&h.store), (Some("new".into()), Some("new2".into())));
	assert_eq!(
		h.transport.bearers_for(DETAILS),
		vec![Some("stale".to_owned()), Some("new".to_owned())]
	);
	assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
	let h = harness(Some("stale"), Some("r1"));
	let gate = h.transport.hold(DEFAULT_REFRESH_PATH);

	accept_new_token(&h.transport, DETAILS);
	rotate_to_new(&h.transport);

	let tasks = (0..3)
		.map(|_| {
			let gateway = h.gateway.clone();

			tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
		})
		.collect::<Vec<_>>();

	wait_until(|| h.gateway.coordinator().pending_waiters() == 2).await;
	gate.add_permits(1);

	for task in tasks {
		let response = task
			.await
			.expect("Request task should not panic.")
			.expect("Every request should succeed after the shared refresh.");

		assert_eq!(response.status, 200);
	}

	let bearers = h.transport.bearers_for(DETAILS);

	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(bearers.iter().filter(|b| b.as_deref() == Some("stale")).count(), 3);
	assert_eq!(bearers.iter().filter(|b| b.as_deref() == Some("new")).count(), 3);
	assert_eq!(h.gateway.refresh_metrics().cycles(), 1);
	assert_eq!(h.gateway.refresh_metrics().waits(), 2);
	assert!(!h.gateway.coordinator().is_refreshing());

	// Requests issued after the cycle carry the new token on their first dispatch.
	h.gateway.send(ApiRequest::get(DETAILS)).await.expect("Fresh token should be accepted.");

	assert_eq!(h.transport.bearers_for(DETAILS).last(), Some(&Some("new".to_owned())));
	assert_eq!(h.transport.refresh_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_flight_holds_across_worker_threads() {
	let h = harness(Some("stale"), Some("r1"));
	let gate = h.transport.hold(DEFAULT_REFRESH_PATH);

	accept_new_token(&h.transport, DETAILS);
	rotate_to_new(&h.transport);

	let tasks = (0..8)
		.map(|_| {
			let gateway = h.gateway.clone();

			tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
		})
		.collect::<Vec<_>>();

	wait_until(|| h.gateway.coordinator().pending_waiters() == 7).await;
	gate.add_permits(1);

	for task in tasks {
		task.await.expect("Request task should not panic.").expect("Request should succeed.");
	}

	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.transport.calls_to(DETAILS), 16);
}

#[tokio::test]
async fn failed_refresh_rejects_waiters_and_logs_out_once() {
	let h = harness(Some("stale"), Some("revoked"));
	let gate = h.transport.hold(DEFAULT_REFRESH_PATH);

	accept_new_token(&h.transport, DETAILS);
	h.transport.respond_refresh(|_| {
		ApiResponse::json_body(400, &json!({ "detail": "Token is invalid or expired" }))
	});

	let tasks = (0..3)
		.map(|_| {
			let gateway = h.gateway.clone();

			tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
		})
		.collect::<Vec<_>>();

	wait_until(|| h.gateway.coordinator().pending_waiters() == 2).await;
	gate.add_permits(1);

	let mut originals = 0;
	let mut rejections = Vec::new();

	for task in tasks {
		match task.await.expect("Request task should not panic.") {
			Err(Error::Status(status)) if status.status == 401 => originals += 1,
			Err(Error::Refresh(e)) => rejections.push(e),
			other => panic!("Unexpected outcome {other:?}."),
		}
	}

	assert_eq!(originals, 1);
	assert_eq!(rejections.len(), 2);
	assert!(rejections.iter().all(|e| matches!(e, RefreshError::Rejected { status: 400, .. })));
	assert_eq!(rejections[0], rejections[1]);
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.transport.calls_to(DETAILS), 3);
	assert_eq!(stored(&h.store), (None, None));
	assert_eq!(h.navigator.redirects(), vec!["/login".to_owned()]);
	assert!(h.gateway.is_logged_out());
}

#[tokio::test]
async fn missing_refresh_token_skips_network_and_logs_out() {
	let h = harness(Some("stale"), None);

	accept_new_token(&h.transport, DETAILS);

	let err = h
		.gateway
		.send(ApiRequest::get(DETAILS))
		.await
		.expect_err("Without a refresh token the 401 should surface.");

	assert!(err.is_unauthorized());
	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(stored(&h.store), (None, None));
	assert_eq!(h.navigator.count(), 1);

	// A new request that fails again is a new failed cycle and redirects again.
	let err = h.gateway.send(ApiRequest::get(DETAILS)).await.expect_err("Still unauthorized.");

	assert!(err.is_unauthorized());
	assert_eq!(h.navigator.count(), 2);
	assert_eq!(h.transport.bearers_for(DETAILS), vec![Some("stale".to_owned()), None]);
	assert_eq!(h.transport.refresh_calls(), 0);
}

#[tokio::test]
async fn explicit_logout_then_401_still_redirects() {
	let h = harness(Some("a1"), Some("r1"));

	accept_new_token(&h.transport, DETAILS);
	h.gateway.end_session().await.expect("Logout should clear tokens.");

	assert_eq!(h.navigator.count(), 0);

	let err = h
		.gateway
		.send(ApiRequest::get(DETAILS))
		.await
		.expect_err("Anonymous request should surface the 401.");

	assert!(err.is_unauthorized());
	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(stored(&h.store), (None, None));
	assert_eq!(h.navigator.redirects(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn missing_refresh_token_with_waiters_logs_out_once() {
	let store = GatedStore::new(MemoryStore::with_tokens(Some("stale"), None));
	let transport = ScriptedTransport::default();
	let navigator = RecordingNavigator::default();
	let gateway = Gateway::with_transport(
		GatewayConfig::default(),
		Arc::new(store.clone()),
		Arc::new(navigator.clone()),
		transport.clone(),
	)
	.expect("Default gateway configuration should be valid.");

	accept_new_token(&transport, DETAILS);

	let tasks = (0..3)
		.map(|_| {
			let gateway = gateway.clone();

			tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
		})
		.collect::<Vec<_>>();

	wait_until(|| gateway.coordinator().pending_waiters() == 2).await;
	store.refresh_gate.add_permits(1);

	let mut originals = 0;
	let mut rejections = Vec::new();

	for task in tasks {
		match task.await.expect("Request task should not panic.") {
			Err(Error::Status(status)) if status.status == 401 => originals += 1,
			Err(Error::Refresh(e)) => rejections.push(e),
			other => panic!("Unexpected outcome {other:?}."),
		}
	}

	assert_eq!(originals, 1);
	assert_eq!(rejections, vec![RefreshError::MissingRefreshToken; 2]);
	assert_eq!(transport.refresh_calls(), 0);
	assert_eq!(stored(&store.inner), (None, None));
	assert_eq!(navigator.redirects(), vec!["/login".to_owned()]);
}

#[tokio::test]
async fn late_401_after_failed_cycle_does_not_redirect_again() {
	let h = harness(Some("stale"), Some("revoked"));
	let forms_gate = h.transport.hold(FORMS);

	accept_new_token(&h.transport, DETAILS);
	accept_new_token(&h.transport, FORMS);
	h.transport.respond_refresh(|_| ApiResponse::new(400, "{\"detail\":\"Token is invalid\"}"));

	let slow = {
		let gateway = h.gateway.clone();

		tokio::spawn(async move { gateway.send(ApiRequest::get(FORMS)).await })
	};

	wait_until(|| h.transport.calls_to(FORMS) == 1).await;

	let err = h.gateway.send(ApiRequest::get(DETAILS)).await.expect_err("Refresh should fail.");

	assert!(err.is_unauthorized());
	assert_eq!(h.navigator.count(), 1);

	forms_gate.add_permits(1);

	let err = slow
		.await
		.expect("Request task should not panic.")
		.expect_err("Late 401 from the failed burst should surface.");

	assert!(err.is_unauthorized());
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(h.navigator.count(), 1);
	assert_eq!(h.transport.calls_to(FORMS), 1);
}

#[tokio::test]
async fn server_errors_and_timeouts_bypass_refresh() {
	let h = harness(Some("stale"), Some("r1"));

	h.transport.respond(DETAILS, |_| ApiResponse::new(500, "boom"));
	h.transport.fail(FORMS, || TransportError::Timeout { timeout: Duration::seconds(10) });

	let err = h.gateway.send(ApiRequest::get(DETAILS)).await.expect_err("500 should surface.");

	assert_eq!(err.status(), Some(500));

	let err = h.gateway.send(ApiRequest::get(FORMS)).await.expect_err("Timeout should surface.");

	assert!(matches!(err, Error::Transport(ref e) if e.is_timeout()));
	assert_eq!(h.transport.refresh_calls(), 0);
	assert_eq!(h.gateway.refresh_metrics().cycles(), 0);
	assert_eq!(stored(&h.store), (Some("stale".into()), Some("r1".into())));
	assert_eq!(h.navigator.count(), 0);
}

#[tokio::test]
async fn late_401_after_completed_cycle_reuses_new_token() {
	let h = harness(Some("stale"), Some("r1"));
	let forms_gate = h.transport.hold(FORMS);

	accept_new_token(&h.transport, DETAILS);
	accept_new_token(&h.transport, FORMS);
	rotate_to_new(&h.transport);

	let slow = {
		let gateway = h.gateway.clone();

		tokio::spawn(async move { gateway.send(ApiRequest::get(FORMS)).await })
	};

	wait_until(|| h.transport.calls_to(FORMS) == 1).await;

	h.gateway.send(ApiRequest::get(DETAILS)).await.expect("Refresh cycle should succeed.");
	forms_gate.add_permits(2);

	let response = slow
		.await
		.expect("Request task should not panic.")
		.expect("Late 401 should replay with the refreshed token.");

	assert_eq!(response.status, 200);
	assert_eq!(h.transport.refresh_calls(), 1);
	assert_eq!(
		h.transport.bearers_for(FORMS),
		vec![Some("stale".to_owned()), Some("new".to_owned())]
	);
}

#[tokio::test]
async fn abandoned_leader_releases_waiters() {
	let h = harness(Some("stale"), Some("r1"));
	let gate = h.transport.hold(DEFAULT_REFRESH_PATH);

	accept_new_token(&h.transport, DETAILS);
	rotate_to_new(&h.transport);

	let leader = {
		let gateway = h.gateway.clone();

		tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
	};

	wait_until(|| h.gateway.coordinator().is_refreshing()).await;

	let waiter = {
		let gateway = h.gateway.clone();

		tokio::spawn(async move { gateway.send(ApiRequest::get(DETAILS)).await })
	};

	wait_until(|| h.gateway.coordinator().pending_waiters() == 1).await;
	leader.abort();

	let err = waiter
		.await
		.expect("Waiter task should not panic.")
		.expect_err("Waiter should observe the abandoned cycle.");

	assert!(matches!(err, Error::Refresh(RefreshError::Abandoned)));
	assert!(!h.gateway.coordinator().is_refreshing());
	assert_eq!(h.navigator.count(), 0);

	// The coordinator is usable again once the dropped leader has released it.
	gate.add_permits(1);

	let response =
		h.gateway.send(ApiRequest::get(DETAILS)).await.expect("A new cycle should succeed.");

	assert_eq!(response.status, 200);
	assert_eq!(h.gateway.refresh_metrics().cycles(), 2);
	assert_eq!(
		h.store.snapshot().access_token.as_ref().map(TokenSecret::expose),
		Some("new")
	);
}

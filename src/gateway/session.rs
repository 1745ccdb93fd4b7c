//! Session lifecycle: the refresh exchange, forced logout, and explicit login/logout.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, RefreshGrant},
	gateway::Gateway,
	http::{AUTHORIZATION, Body, CONTENT_TYPE, HttpTransport, Method, OutboundRequest},
	obs::{self, OpKind, OpSpan},
	refresh::{RefreshError, RefreshOutcome},
};

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Stores a freshly issued credential pair and attaches it to subsequent requests.
	pub async fn establish_session(&self, pair: CredentialPair) -> Result<()> {
		let bearer = pair.access_token.bearer();

		self.store.store_pair(pair).await?;
		self.set_default_header(AUTHORIZATION, bearer);
		self.shared.logged_out.store(false, Ordering::SeqCst);

		obs::op_event!(debug, "session established");

		Ok(())
	}

	/// User-initiated logout: clears both tokens and the default `Authorization` header.
	///
	/// Does not navigate; the caller decides where to go. A later 401 that cannot be refreshed
	/// still forces a logout with navigation.
	pub async fn end_session(&self) -> Result<()> {
		self.remove_default_header(AUTHORIZATION);
		self.store.clear_tokens().await?;
		self.shared.logged_out.store(true, Ordering::SeqCst);

		obs::op_event!(debug, "session ended");

		Ok(())
	}

	/// Clears both tokens and sends the navigator to the login route.
	///
	/// Calls made while another forced logout is still running return immediately, so a burst
	/// of concurrent calls clears and navigates once. Every failed refresh cycle runs its own.
	/// A store failure while clearing is logged and does not prevent navigation.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	pub async fn forced_logout(&self) {
		const KIND: OpKind = OpKind::Logout;

		let Some(_running) = LogoutGuard::acquire(&self.shared.logging_out) else {
			obs::op_event!(debug, "forced logout already running");

			return;
		};
		let cleared =
			obs::observe(KIND, OpSpan::new(KIND, "forced_logout"), self.store.clear_tokens()).await;

		self.remove_default_header(AUTHORIZATION);
		self.shared.logged_out.store(true, Ordering::SeqCst);
		self.navigator.redirect_to_login(&self.config().login_redirect);

		match cleared {
			Ok(()) => {
				obs::op_event!(warn, location = self.config().login_redirect.as_str(), "forced logout");
			},
			Err(e) => {
				obs::op_event!(warn, error = %e, "forced logout could not clear stored tokens");
			},
		}
	}

	/// Runs one refresh exchange. Only the coordinator's leader calls this.
	#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
	pub(crate) async fn refresh_tokens(&self) -> RefreshOutcome {
		const KIND: OpKind = OpKind::Refresh;

		let outcome =
			obs::observe(KIND, OpSpan::new(KIND, "refresh_tokens"), self.exchange_refresh_token())
				.await;

		match &outcome {
			Ok(_) => {
				obs::op_event!(debug, "access token refreshed");
			},
			Err(e) => {
				obs::op_event!(warn, error = %e, "token refresh failed");
			},
		}

		outcome
	}

	async fn exchange_refresh_token(&self) -> RefreshOutcome {
		let refresh = self.store.refresh_token().await?.ok_or(RefreshError::MissingRefreshToken)?;
		let headers = BTreeMap::from([
			(CONTENT_TYPE.to_owned(), "application/json".to_owned()),
			("accept".to_owned(), "application/json".to_owned()),
		]);
		let request = OutboundRequest {
			method: Method::Post,
			url: self.refresh_url().clone(),
			headers,
			body: Body::Json(serde_json::json!({ "refresh": refresh.expose() })),
			timeout: self.config().default_timeout,
		};
		let response = self.transport.execute(request).await?;

		if !response.is_success() {
			return Err(RefreshError::Rejected { status: response.status, body: response.text() });
		}

		let grant = response
			.json::<RefreshGrant>()
			.map_err(|e| RefreshError::Malformed { message: e.source.to_string() })?;

		if grant.access.expose().is_empty() {
			return Err(RefreshError::Malformed { message: "access: empty token".into() });
		}

		self.store.set_access_token(grant.access.clone()).await?;

		if let Some(rotated) = grant.refresh {
			self.store.set_refresh_token(rotated).await?;
		}

		self.set_default_header(AUTHORIZATION, grant.access.bearer());
		self.shared.logged_out.store(false, Ordering::SeqCst);

		Ok(grant.access)
	}
}

/// Marks a forced logout as running until dropped.
struct LogoutGuard<'a>(&'a AtomicBool);
impl<'a> LogoutGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		if flag.swap(true, Ordering::SeqCst) { None } else { Some(Self(flag)) }
	}
}
impl Drop for LogoutGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::build_scripted_gateway, auth::TokenSecret, http::ApiResponse, store::TokenStore,
	};

	#[tokio::test]
	async fn refresh_persists_rotation_and_default_header() {
		let (gateway, transport, store, _) = build_scripted_gateway(Some("old"), Some("r1"));

		transport.respond_refresh(|request| {
			assert_eq!(request.bearer(), None);
			assert_eq!(request.body, Body::Json(serde_json::json!({ "refresh": "r1" })));

			ApiResponse::json_body(200, &serde_json::json!({ "access": "a2", "refresh": "r2" }))
		});

		let token = gateway.refresh_tokens().await.expect("Refresh should succeed.");
		let slots = store.snapshot();

		assert_eq!(token.expose(), "a2");
		assert_eq!(slots.access_token.as_ref().map(TokenSecret::expose), Some("a2"));
		assert_eq!(slots.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
		assert_eq!(
			gateway.default_headers().get(AUTHORIZATION).map(String::as_str),
			Some("Bearer a2")
		);
	}

	#[tokio::test]
	async fn refresh_failures_are_classified() {
		let (gateway, transport, store, _) = build_scripted_gateway(Some("old"), None);

		assert_eq!(gateway.refresh_tokens().await, Err(RefreshError::MissingRefreshToken));
		assert_eq!(transport.refresh_calls(), 0);

		store.set_refresh_token(TokenSecret::new("r1")).await.expect("Seeding should succeed.");
		transport.respond_refresh(|_| ApiResponse::new(400, "{\"detail\":\"Token is invalid\"}"));

		assert!(matches!(
			gateway.refresh_tokens().await,
			Err(RefreshError::Rejected { status: 400, .. })
		));

		transport.respond_refresh(|_| ApiResponse::new(200, "{\"token\":\"nope\"}"));

		let malformed = gateway.refresh_tokens().await.expect_err("Missing `access` is malformed.");

		assert!(matches!(
			malformed,
			RefreshError::Malformed { ref message } if message.contains("access")
		));
		assert_eq!(transport.refresh_calls(), 2);
		assert_eq!(store.snapshot().access_token.as_ref().map(TokenSecret::expose), Some("old"));
	}

	#[tokio::test]
	async fn every_forced_logout_clears_and_navigates() {
		let (gateway, _, store, navigator) = build_scripted_gateway(Some("a"), Some("r"));

		gateway.forced_logout().await;

		assert!(store.snapshot().is_empty());
		assert_eq!(navigator.redirects(), vec!["/login".to_owned()]);
		assert!(gateway.is_logged_out());

		gateway
			.establish_session(CredentialPair::new("a2", "r2"))
			.await
			.expect("Login should store tokens.");

		assert!(!gateway.is_logged_out());
		assert_eq!(
			gateway.default_headers().get(AUTHORIZATION).map(String::as_str),
			Some("Bearer a2")
		);

		gateway.forced_logout().await;
		gateway.forced_logout().await;

		assert_eq!(navigator.count(), 3);
		assert!(store.snapshot().is_empty());
		assert!(gateway.default_headers().get(AUTHORIZATION).is_none());
	}

	#[tokio::test]
	async fn forced_logout_while_one_is_running_is_a_noop() {
		let (gateway, _, store, navigator) = build_scripted_gateway(Some("a"), Some("r"));
		let running = LogoutGuard::acquire(&gateway.shared.logging_out)
			.expect("No forced logout should be running yet.");

		assert!(LogoutGuard::acquire(&gateway.shared.logging_out).is_none());

		gateway.forced_logout().await;

		assert_eq!(navigator.count(), 0);
		assert!(!store.snapshot().is_empty());

		drop(running);
		gateway.forced_logout().await;

		assert_eq!(navigator.count(), 1);
		assert!(store.snapshot().is_empty());
	}

	#[tokio::test]
	async fn end_session_clears_without_navigation() {
		let (gateway, _, store, navigator) = build_scripted_gateway(Some("a"), Some("r"));

		gateway.set_default_header(AUTHORIZATION, "Bearer a");
		gateway.end_session().await.expect("Logout should clear tokens.");

		assert!(store.snapshot().is_empty());
		assert!(gateway.default_headers().get(AUTHORIZATION).is_none());
		assert!(gateway.is_logged_out());
		assert_eq!(navigator.count(), 0);

		// Losing the session later still sends the user to the login route.
		gateway.forced_logout().await;

		assert_eq!(navigator.redirects(), vec!["/login".to_owned()]);
	}
}

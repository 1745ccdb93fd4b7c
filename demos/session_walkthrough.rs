//! Walks one session through the gateway over a scripted backend.
//!
//! 1. Log in and store the returned token pair.
//! 2. Let the access token expire; the next request is refreshed and replayed transparently.
//! 3. Revoke the refresh token; the next 401 forces a logout and a redirect to the login route.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use serde_json::json;
// self
use ems_gateway::{
	auth::TokenSecret,
	config::{DEFAULT_REFRESH_PATH, GatewayConfig},
	gateway::Gateway,
	http::{ApiResponse, ScriptedTransport},
	navigation::CallbackNavigator,
	services::{LoginRequest, UserService},
	store::{MemoryStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let transport = ScriptedTransport::default();
	let store = MemoryStore::default();
	let navigator = CallbackNavigator::new(|location: &str| println!("-> redirect to {location}"));
	let gateway = Gateway::with_transport(
		GatewayConfig::default(),
		Arc::new(store.clone()),
		Arc::new(navigator),
		transport.clone(),
	)?;
	let users = UserService::new(gateway.clone());

	transport.respond("user/login/", |_| {
		ApiResponse::json_body(
			200,
			&json!({
				"access": "access-1",
				"refresh": "refresh-1",
				"user": { "email": "ada@example.com", "username": "ada" }
			}),
		)
	});
	transport.respond("user/details/", |request| match request.bearer() {
		Some("access-2") => ApiResponse::json_body(
			200,
			&json!({ "email": "ada@example.com", "first_name": "Ada", "last_name": "Lovelace" }),
		),
		_ => ApiResponse::json_body(401, &json!({ "detail": "Token is expired" })),
	});
	transport.respond_refresh(|_| ApiResponse::json_body(200, &json!({ "access": "access-2" })));

	let user = users.login(&LoginRequest::new("ada@example.com", "analytical")).await?;

	println!("logged in as {}", user.email);

	let profile = users.current_user().await?;

	println!(
		"profile for {} {} after {} refresh call(s)",
		profile.first_name,
		profile.last_name,
		transport.refresh_calls()
	);

	store.set_access_token(TokenSecret::new("access-expired")).await?;
	transport.respond(DEFAULT_REFRESH_PATH, |_| {
		ApiResponse::json_body(401, &json!({ "detail": "Token is blacklisted" }))
	});

	match users.current_user().await {
		Ok(profile) => println!("unexpected profile {profile:?}"),
		Err(e) => println!("session lost: {e}"),
	}

	println!(
		"logged out: {}, tokens cleared: {}",
		gateway.is_logged_out(),
		store.snapshot().is_empty()
	);

	Ok(())
}

//! Access/refresh token pair issued by the login and refresh endpoints.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Tokens minted for one authenticated session.
///
/// The pair lives in a [`TokenStore`](crate::store::TokenStore); gateway code only holds a copy
/// for the duration of a single call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived bearer token attached to every request.
	pub access_token: TokenSecret,
	/// Long-lived token exchanged for a new access token.
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<TokenSecret>, refresh_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
	}
}
impl Debug for CredentialPair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPair")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

/// Body returned by the token refresh endpoint.
///
/// Rotation is optional: `refresh` is only present when the server issued a new refresh token.
#[derive(Clone, Deserialize)]
pub struct RefreshGrant {
	/// Newly minted access token.
	pub access: TokenSecret,
	/// Rotated refresh token, if any.
	#[serde(default)]
	pub refresh: Option<TokenSecret>,
}
impl Debug for RefreshGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshGrant")
			.field("access", &"<redacted>")
			.field("rotated", &self.refresh.is_some())
			.finish()
	}
}

//! Storage contract and built-in backends for the session's access and refresh tokens.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend holding at most one access token and one refresh token.
///
/// The gateway reads through this interface on every dispatch, so implementations should make
/// reads cheap. Writes must be visible to every subsequent read from any task.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current access token, if any.
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Returns the current refresh token, if any.
	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Replaces the access token.
	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()>;

	/// Replaces the refresh token.
	fn set_refresh_token(&self, token: TokenSecret) -> StoreFuture<'_, ()>;

	/// Removes both tokens.
	fn clear_tokens(&self) -> StoreFuture<'_, ()>;

	/// Stores both halves of a freshly issued pair.
	fn store_pair(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.set_access_token(pair.access_token).await?;
			self.set_refresh_token(pair.refresh_token).await
		})
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Token slots shared by the built-in stores; field names match the keys the browser client
/// kept in local storage.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSlots {
	/// Stored access token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Stored refresh token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl TokenSlots {
	/// Returns `true` when neither token is stored.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}
impl Debug for TokenSlots {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenSlots")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn slots_use_local_storage_key_names() {
		let slots = TokenSlots {
			access_token: Some(TokenSecret::new("a")),
			refresh_token: Some(TokenSecret::new("r")),
		};
		let payload = serde_json::to_string(&slots).expect("Token slots should serialize.");

		assert_eq!(payload, "{\"accessToken\":\"a\",\"refreshToken\":\"r\"}");

		let empty: TokenSlots =
			serde_json::from_str("{}").expect("Empty snapshot should deserialize.");

		assert!(empty.is_empty());
	}

	#[tokio::test]
	async fn store_pair_writes_both_slots() {
		let store = MemoryStore::default();

		store
			.store_pair(CredentialPair::new("access-1", "refresh-1"))
			.await
			.expect("Storing a pair in memory should succeed.");

		assert_eq!(
			store.access_token().await.expect("Read should succeed.").map(|t| t.expose().to_owned()),
			Some("access-1".to_owned())
		);
		assert_eq!(
			store.refresh_token().await.expect("Read should succeed.").map(|t| t.expose().to_owned()),
			Some("refresh-1".to_owned())
		);
	}
}

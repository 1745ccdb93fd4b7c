//! Thread-safe in-memory [`TokenStore`] implementation for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{StoreFuture, TokenSlots, TokenStore},
};

type SlotCell = Arc<RwLock<TokenSlots>>;

/// Storage backend that keeps tokens in-process; clones share the same slots.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SlotCell);
impl MemoryStore {
	/// Creates a store pre-populated with the provided tokens.
	pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
		let slots = TokenSlots {
			access_token: access.map(TokenSecret::new),
			refresh_token: refresh.map(TokenSecret::new),
		};

		Self(Arc::new(RwLock::new(slots)))
	}

	/// Returns a copy of the current slots.
	pub fn snapshot(&self) -> TokenSlots {
		self.0.read().clone()
	}

	fn update_now(cell: &SlotCell, apply: impl FnOnce(&mut TokenSlots)) {
		apply(&mut cell.write());
	}
}
impl TokenStore for MemoryStore {
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let token = self.0.read().access_token.clone();

		Box::pin(async move { Ok(token) })
	}

	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let token = self.0.read().refresh_token.clone();

		Box::pin(async move { Ok(token) })
	}

	fn set_access_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::update_now(&cell, |slots| slots.access_token = Some(token));

			Ok(())
		})
	}

	fn set_refresh_token(&self, token: TokenSecret) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::update_now(&cell, |slots| slots.refresh_token = Some(token));

			Ok(())
		})
	}

	fn clear_tokens(&self) -> StoreFuture<'_, ()> {
		let cell = self.0.clone();

		Box::pin(async move {
			Self::update_now(&cell, |slots| *slots = TokenSlots::default());

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn clones_share_slots_and_clear_removes_both() {
		let store = MemoryStore::with_tokens(Some("access"), Some("refresh"));
		let shared = store.clone();

		shared
			.set_access_token(TokenSecret::new("access-2"))
			.await
			.expect("Setting the access token should succeed.");

		let snapshot = store.snapshot();

		assert_eq!(snapshot.access_token.as_ref().map(TokenSecret::expose), Some("access-2"));
		assert_eq!(snapshot.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh"));

		store.clear_tokens().await.expect("Clearing tokens should succeed.");

		assert!(shared.snapshot().is_empty());
	}
}

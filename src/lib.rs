//! Authenticated request gateway for the Employee Management System REST API: bearer-token
//! attachment, single-flight token refresh with a waiter queue, replay-once semantics, forced
//! logout, and typed account/form-template services on top.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod navigation;
pub mod obs;
pub mod refresh;
pub mod services;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;
	pub use crate::http::ScriptedTransport;

	// self
	use crate::{
		config::GatewayConfig,
		gateway::Gateway,
		navigation::{Navigator, RecordingNavigator},
		store::{MemoryStore, TokenStore},
	};

	/// Gateway type alias used by scripted-transport tests.
	pub type ScriptedGateway = Gateway<ScriptedTransport>;

	/// Builds a gateway over a [`ScriptedTransport`] with the default configuration, an in-memory
	/// store seeded with the given tokens, and a recording navigator.
	///
	/// The returned transport, store, and navigator share state with the gateway.
	pub fn build_scripted_gateway(
		access: Option<&str>,
		refresh: Option<&str>,
	) -> (ScriptedGateway, ScriptedTransport, MemoryStore, RecordingNavigator) {
		let transport = ScriptedTransport::default();
		let store = MemoryStore::with_tokens(access, refresh);
		let navigator = RecordingNavigator::default();
		let store_handle: Arc<dyn TokenStore> = Arc::new(store.clone());
		let navigator_handle: Arc<dyn Navigator> = Arc::new(navigator.clone());
		let gateway = Gateway::with_transport(
			GatewayConfig::default(),
			store_handle,
			navigator_handle,
			transport.clone(),
		)
		.expect("Default gateway configuration should be valid.");

		(gateway, transport, store, navigator)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		mem,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::Result;
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

//! Authenticated request gateway: bearer attachment, 401 interception, single-flight refresh,
//! replay, and forced logout.
//!
//! [`Gateway::send`] is the only entry point that may trigger a token refresh. Every clone of a
//! gateway shares one [`RefreshCoordinator`], and one default header set, so concurrent calls
//! issued through any clone observe the same refresh cycle and coalesce into one forced logout.

mod dispatch;
mod session;

// std
use std::sync::atomic::{AtomicBool, Ordering};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::ConfigError,
	http::HttpTransport,
	navigation::Navigator,
	refresh::{RefreshCoordinator, RefreshMetrics},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Wraps an [`HttpTransport`] with the session's token lifecycle.
///
/// The gateway owns references to the transport, token store, and navigator so callers only
/// describe requests. Tokens are always read through the store; the gateway never keeps a copy
/// beyond a single call.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for every dispatch, including refresh calls.
	pub transport: Arc<T>,
	/// Store holding the session's access and refresh tokens.
	pub store: Arc<dyn TokenStore>,
	/// Navigation capability invoked on forced logout.
	pub navigator: Arc<dyn Navigator>,
	shared: Arc<Shared>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway that reuses the caller-provided transport.
	///
	/// The configuration is normalized and validated again here because its fields are public
	/// and it may have been deserialized without going through the builder.
	pub fn with_transport(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn Navigator>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let config = config.normalized();

		config.validate().map_err(ConfigError::from)?;

		let refresh_url = config.refresh_url()?;
		let shared = Shared {
			default_headers: RwLock::new(config.default_headers.clone()),
			config,
			refresh_url,
			coordinator: RefreshCoordinator::default(),
			logged_out: AtomicBool::new(false),
			logging_out: AtomicBool::new(false),
		};

		Ok(Self { transport: transport.into(), store, navigator, shared: Arc::new(shared) })
	}

	/// Validated configuration this gateway was built with.
	pub fn config(&self) -> &GatewayConfig {
		&self.shared.config
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> &Url {
		&self.shared.refresh_url
	}

	/// Snapshot of the headers currently attached to every request.
	pub fn default_headers(&self) -> BTreeMap<String, String> {
		self.shared.default_headers.read().clone()
	}

	/// Adds or replaces a header attached to every subsequent request.
	pub fn set_default_header(&self, name: impl AsRef<str>, value: impl Into<String>) {
		self.shared.default_headers.write().insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Removes a default header, returning its previous value.
	pub fn remove_default_header(&self, name: &str) -> Option<String> {
		self.shared.default_headers.write().remove(&name.to_ascii_lowercase())
	}

	/// Single-flight coordinator shared by every clone of this gateway.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.shared.coordinator
	}

	/// Counters for refresh cycles started, settled, and joined.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.shared.coordinator.metrics()
	}

	/// Returns `true` after a forced or explicit logout, until a login or a successful refresh.
	pub fn is_logged_out(&self) -> bool {
		self.shared.logged_out.load(Ordering::SeqCst)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway that provisions its own reqwest-backed transport.
	pub fn new(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		Self::with_transport(config, store, navigator, ReqwestTransport::default())
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			navigator: self.navigator.clone(),
			shared: self.shared.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.shared.config.base_url.as_str())
			.field("refresh_url", &self.shared.refresh_url.as_str())
			.field("coordinator", &self.shared.coordinator)
			.field("logged_out", &self.is_logged_out())
			.finish()
	}
}

struct Shared {
	config: GatewayConfig,
	refresh_url: Url,
	default_headers: RwLock<BTreeMap<String, String>>,
	coordinator: RefreshCoordinator,
	logged_out: AtomicBool,
	logging_out: AtomicBool,
}

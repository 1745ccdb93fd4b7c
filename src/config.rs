//! Gateway configuration: base endpoint, refresh route, login route, timeouts, default headers.
//!
//! Values are assembled through [`GatewayConfigBuilder`], which validates them once so the
//! gateway can treat the resulting [`GatewayConfig`] as trusted.

pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Base endpoint used by the original deployment.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
/// Route of the token refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "user/api/token/refresh/";
/// Location the navigator is sent to on forced logout.
pub const DEFAULT_LOGIN_REDIRECT: &str = "/login";
/// Timeout applied to requests that do not carry their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

/// Validated gateway configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Base endpoint every relative request path is joined onto; always ends with `/`.
	pub base_url: Url,
	/// Refresh endpoint path, relative to `base_url`.
	pub refresh_path: String,
	/// Location handed to the navigator on forced logout.
	pub login_redirect: String,
	/// Timeout for requests without an explicit one.
	pub default_timeout: Duration,
	/// Headers attached to every request before per-request headers; names are lower-cased.
	pub default_headers: BTreeMap<String, String>,
}
impl GatewayConfig {
	/// Creates a new builder for the provided base endpoint.
	pub fn builder(base_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(base_url)
	}

	/// Resolves a caller-supplied path against the base endpoint.
	///
	/// A leading `/` is ignored so `"/user/details/"` and `"user/details/"` address the same
	/// resource beneath the base path. Paths that resolve to another origin (absolute URLs) or
	/// above the base path (`..` segments) are rejected so the bearer token never leaves the API.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let base = directory_url(self.base_url.clone());
		let url = base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
			return Err(ConfigError::ForeignPath { path: path.to_owned() });
		}

		Ok(url)
	}

	/// Returns the configuration with its base path ending in `/`.
	///
	/// Deserialized configurations skip the builder, so the gateway applies this before use.
	pub fn normalized(mut self) -> Self {
		self.base_url = directory_url(self.base_url);

		self
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}
}
impl Default for GatewayConfig {
	fn default() -> Self {
		let base_url =
			Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL must be an absolute URL.");

		GatewayConfigBuilder::new(base_url).into_config()
	}
}

/// Appends a trailing `/` to the URL path so joins stay beneath it.
pub(crate) fn directory_url(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

//! Validating builder for [`GatewayConfig`](crate::config::GatewayConfig).

// self
use crate::{
	_prelude::*,
	config::{self, DEFAULT_LOGIN_REDIRECT, DEFAULT_REFRESH_PATH, DEFAULT_TIMEOUT, GatewayConfig},
};

/// Errors raised while constructing or validating a [`GatewayConfig`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum GatewayConfigError {
	/// Base URL must use HTTP or HTTPS.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Rejected URL.
		url: String,
	},
	/// Base URL cannot have relative paths joined onto it.
	#[error("Base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Rejected URL.
		url: String,
	},
	/// Refresh path must be relative to the base URL.
	#[error("Refresh path must be a non-empty relative path: {path}.")]
	InvalidRefreshPath {
		/// Rejected path.
		path: String,
	},
	/// Default timeout must be positive.
	#[error("Default timeout must be positive.")]
	NonPositiveTimeout,
	/// Header names must be RFC 9110 tokens.
	#[error("Header name `{name}` is not a valid token.")]
	InvalidHeaderName {
		/// Rejected header name.
		name: String,
	},
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Base endpoint.
	pub base_url: Url,
	/// Refresh endpoint path.
	pub refresh_path: String,
	/// Forced-logout location.
	pub login_redirect: String,
	/// Timeout for requests without an explicit one.
	pub default_timeout: Duration,
	/// Headers attached to every request.
	pub default_headers: BTreeMap<String, String>,
}
impl GatewayConfigBuilder {
	/// Creates a builder seeded with the defaults of the original deployment.
	pub fn new(base_url: Url) -> Self {
		let default_headers = BTreeMap::from([
			("accept".to_owned(), "application/json".to_owned()),
			("content-type".to_owned(), "application/json".to_owned()),
		]);

		Self {
			base_url,
			refresh_path: DEFAULT_REFRESH_PATH.to_owned(),
			login_redirect: DEFAULT_LOGIN_REDIRECT.to_owned(),
			default_timeout: DEFAULT_TIMEOUT,
			default_headers,
		}
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Overrides the forced-logout location.
	pub fn login_redirect(mut self, location: impl Into<String>) -> Self {
		self.login_redirect = location.into();

		self
	}

	/// Overrides the default request timeout.
	pub fn default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = timeout;

		self
	}

	/// Adds or replaces a default header.
	pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.default_headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let config = self.into_config();

		config.validate()?;

		Ok(config)
	}

	pub(crate) fn into_config(self) -> GatewayConfig {
		GatewayConfig {
			base_url: config::directory_url(self.base_url),
			refresh_path: self.refresh_path,
			login_redirect: self.login_redirect,
			default_timeout: self.default_timeout,
			default_headers: self.default_headers,
		}
	}
}

impl GatewayConfig {
	/// Validates invariants for the configuration.
	pub(crate) fn validate(&self) -> Result<(), GatewayConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(GatewayConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}
		if self.base_url.cannot_be_a_base() {
			return Err(GatewayConfigError::CannotBeABase { url: self.base_url.to_string() });
		}
		if self.default_timeout <= Duration::ZERO {
			return Err(GatewayConfigError::NonPositiveTimeout);
		}

		validate_refresh_path(&self.refresh_path)?;

		for name in self.default_headers.keys() {
			validate_header_name(name)?;
		}

		Ok(())
	}
}

fn validate_refresh_path(path: &str) -> Result<(), GatewayConfigError> {
	let trimmed = path.trim_start_matches('/');

	if trimmed.is_empty() || trimmed.contains("://") {
		Err(GatewayConfigError::InvalidRefreshPath { path: path.to_owned() })
	} else {
		Ok(())
	}
}

fn validate_header_name(name: &str) -> Result<(), GatewayConfigError> {
	let is_token = !name.is_empty()
		&& name.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));

	if is_token {
		Ok(())
	} else {
		Err(GatewayConfigError::InvalidHeaderName { name: name.to_owned() })
	}
}

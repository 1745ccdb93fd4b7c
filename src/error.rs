//! Gateway-level error types shared across the transport, store, refresh, and service layers.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout); never triggers a token refresh.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The API answered with a non-success status.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// The refresh cycle this request waited on failed.
	#[error(transparent)]
	Refresh(#[from] crate::refresh::RefreshError),
	/// A response body could not be decoded into the expected shape.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// Client-side input checks rejected the payload before dispatch.
	#[error(transparent)]
	Validation(#[from] crate::services::ValidationError),
}
impl Error {
	/// Returns the HTTP status carried by the error, when there is one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status(e) => Some(e.status),
			Self::Decode(e) => Some(e.status),
			_ => None,
		}
	}

	/// Returns `true` when the API rejected the request with HTTP 401.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(401)
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Path supplied by the caller.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path resolves to another origin or above the base path.
	#[error("Request path `{path}` resolves outside the base URL.")]
	ForeignPath {
		/// Path supplied by the caller.
		path: String,
	},
	/// Per-request timeout is zero or negative.
	#[error("Request timeout must be positive, got {timeout}.")]
	NonPositiveTimeout {
		/// Rejected timeout.
		timeout: Duration,
	},
	/// Request payload could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestBody(#[from] serde_json::Error),
	/// Gateway configuration failed validation.
	#[error(transparent)]
	Gateway(#[from] crate::config::GatewayConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The request did not complete within its timeout.
	#[error("Request timed out after {timeout}.")]
	Timeout {
		/// Timeout that elapsed.
		timeout: Duration,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` for [`TransportError::Timeout`].
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout { .. })
	}
}

/// Non-success HTTP response surfaced to the caller unchanged.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("API responded with HTTP {status}.")]
pub struct StatusError {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body, lossily decoded as UTF-8.
	pub body: String,
}
impl StatusError {
	/// Extracts the human-readable message the backend places under `error`, `message`, or
	/// `detail`. List-valued messages are joined with `; `.
	pub fn detail(&self) -> Option<String> {
		let value = serde_json::from_str::<serde_json::Value>(&self.body).ok()?;

		["error", "message", "detail"].iter().find_map(|key| match value.get(key)? {
			serde_json::Value::String(text) => Some(text.clone()),
			serde_json::Value::Array(items) => {
				let parts = items.iter().filter_map(|item| item.as_str()).collect::<Vec<_>>();

				if parts.is_empty() { None } else { Some(parts.join("; ")) }
			},
			_ => None,
		})
	}
}

/// Response body did not match the expected JSON shape.
#[derive(Debug, ThisError)]
#[error("Response body is not valid JSON for the expected type.")]
pub struct DecodeError {
	/// Structured parsing failure including the JSON path that failed.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
	/// HTTP status of the response being decoded.
	pub status: u16,
}

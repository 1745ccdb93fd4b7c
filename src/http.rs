//! Transport primitives for calls against the REST API.
//!
//! The module exposes [`HttpTransport`] alongside the request/response value types so hosts can
//! plug in any HTTP stack. The gateway resolves an [`ApiRequest`] (relative path) into an
//! [`OutboundRequest`] (absolute URL, merged headers, concrete timeout) for every dispatch,
//! including replays after a token refresh, and hands it to the transport.

pub mod scripted;

pub use scripted::ScriptedTransport;

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::multipart::{Form as ReqwestForm, Part as ReqwestPart};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DecodeError, StatusError, TransportError},
};

/// Lower-cased `Authorization` header name.
pub const AUTHORIZATION: &str = "authorization";
/// Lower-cased `Content-Type` header name.
pub const CONTENT_TYPE: &str = "content-type";

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute a single request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every clone
/// of a gateway. A timeout must surface as [`TransportError::Timeout`]; every completed exchange,
/// whatever its status, is an `Ok` [`ApiResponse`].
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and waits for the full response body.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One part of a multipart form body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormPart {
	/// Plain text field.
	Text {
		/// Field name.
		name: String,
		/// Field value.
		value: String,
	},
	/// Uploaded file.
	File {
		/// Field name.
		name: String,
		/// File name reported to the server.
		file_name: String,
		/// MIME type of the payload.
		content_type: String,
		/// File contents.
		bytes: Vec<u8>,
	},
}
impl FormPart {
	/// Builds a text part.
	pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Text { name: name.into(), value: value.into() }
	}

	/// Returns the field name of the part.
	pub fn name(&self) -> &str {
		match self {
			Self::Text { name, .. } | Self::File { name, .. } => name,
		}
	}
}

/// Request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
	/// No body.
	#[default]
	Empty,
	/// JSON document.
	Json(serde_json::Value),
	/// `multipart/form-data` parts. The transport owns the boundary, so the gateway drops any
	/// configured `Content-Type` header for this variant.
	Form(Vec<FormPart>),
}

/// Caller-facing request descriptor with a path relative to the gateway's base URL.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL (for example `user/details/`).
	pub path: String,
	/// Extra headers; names are stored lower-cased.
	pub headers: BTreeMap<String, String>,
	/// Request payload.
	pub body: Body,
	/// Per-request timeout; the gateway default applies when unset.
	pub timeout: Option<Duration>,
}
impl ApiRequest {
	/// Creates a request for the given method and relative path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			headers: BTreeMap::new(),
			body: Body::Empty,
			timeout: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		self.body = Body::Json(serde_json::to_value(payload).map_err(ConfigError::from)?);

		Ok(self)
	}

	/// Sets a multipart form body.
	pub fn with_form(mut self, parts: Vec<FormPart>) -> Self {
		self.body = Body::Form(parts);

		self
	}

	/// Overrides the timeout for this request.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}
impl Debug for ApiRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiRequest")
			.field("method", &self.method)
			.field("path", &self.path)
			.field("headers", &RedactedHeaders(&self.headers))
			.field("body", &self.body)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Fully resolved request handed to an [`HttpTransport`].
#[derive(Clone, PartialEq)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Final header set; names are lower-cased.
	pub headers: BTreeMap<String, String>,
	/// Request payload.
	pub body: Body,
	/// Timeout enforced by the transport.
	pub timeout: Duration,
}
impl OutboundRequest {
	/// Returns a header value by case-insensitive name.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns the bearer token carried in the `Authorization` header, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.header(AUTHORIZATION)?.strip_prefix("Bearer ")
	}
}
impl Debug for OutboundRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OutboundRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &RedactedHeaders(&self.headers))
			.field("body", &self.body)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Completed HTTP exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers; names are lower-cased.
	pub headers: BTreeMap<String, String>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with the provided status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// Creates a response whose body is the serialized JSON value.
	pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
		Self::new(status, value.to_string())
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the body lossily decoded as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, keeping the failing path on error.
	pub fn json<T>(&self) -> Result<T, DecodeError>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| DecodeError { source, status: self.status })
	}

	/// Converts a non-2xx response into a [`StatusError`].
	pub fn error_for_status(self) -> Result<Self, StatusError> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(StatusError { status: self.status, body: self.text() })
		}
	}
}

struct RedactedHeaders<'a>(&'a BTreeMap<String, String>);
impl Debug for RedactedHeaders<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_map()
			.entries(self.0.iter().map(|(name, value)| {
				let shown = if name == AUTHORIZATION { "<redacted>" } else { value.as_str() };

				(name, shown)
			}))
			.finish()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn send(
		client: ReqwestClient,
		request: OutboundRequest,
	) -> Result<ApiResponse, TransportError> {
		let timeout = request.timeout;
		let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
			.map_err(TransportError::network)?;
		let mut builder = client.request(method, request.url).timeout(timeout.unsigned_abs());

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		builder = match request.body {
			Body::Empty => builder,
			Body::Json(value) =>
				builder.body(serde_json::to_vec(&value).map_err(TransportError::network)?),
			Body::Form(parts) => builder.multipart(build_form(parts)?),
		};

		let response = builder.send().await.map_err(|e| map_reqwest_error(e, timeout))?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.filter_map(|(name, value)| {
				value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
			})
			.collect();
		let body = response.bytes().await.map_err(|e| map_reqwest_error(e, timeout))?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(Self::send(client, request))
	}
}

#[cfg(feature = "reqwest")]
fn build_form(parts: Vec<FormPart>) -> Result<ReqwestForm, TransportError> {
	let mut form = ReqwestForm::new();

	for part in parts {
		form = match part {
			FormPart::Text { name, value } => form.text(name, value),
			FormPart::File { name, file_name, content_type, bytes } => {
				let part = ReqwestPart::bytes(bytes)
					.file_name(file_name)
					.mime_str(&content_type)
					.map_err(TransportError::network)?;

				form.part(name, part)
			},
		};
	}

	Ok(form)
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError, timeout: Duration) -> TransportError {
	if err.is_timeout() { TransportError::Timeout { timeout } } else { TransportError::network(err) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_debug_redacts_authorization() {
		let request = ApiRequest::get("user/details/")
			.with_header("Authorization", "Bearer secret-token")
			.with_header("X-Trace", "abc");
		let rendered = format!("{request:?}");

		assert!(!rendered.contains("secret-token"));
		assert!(rendered.contains("<redacted>"));
		assert!(rendered.contains("abc"));
		assert!(request.headers.contains_key("authorization"));
	}

	#[test]
	fn response_json_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			access: String,
		}

		let response = ApiResponse::new(200, "{\"access\":7}");
		let err = response.json::<Payload>().expect_err("Numeric access token should not decode.");

		assert_eq!(err.status, 200);
		assert_eq!(err.source.path().to_string(), "access");
	}

	#[test]
	fn error_for_status_passes_success_through() {
		let ok = ApiResponse::new(201, "{}").error_for_status().expect("201 should be a success.");

		assert_eq!(ok.status, 201);

		let err = ApiResponse::new(404, "missing")
			.error_for_status()
			.expect_err("404 should surface as a status error.");

		assert_eq!(err, StatusError { status: 404, body: "missing".into() });
	}

	#[test]
	fn outbound_bearer_strips_scheme() {
		let request = OutboundRequest {
			method: Method::Get,
			url: Url::parse("http://127.0.0.1:8000/user/details/")
				.expect("Fixture URL should parse."),
			headers: BTreeMap::from([(AUTHORIZATION.to_owned(), "Bearer tok-1".to_owned())]),
			body: Body::Empty,
			timeout: Duration::seconds(10),
		};

		assert_eq!(request.bearer(), Some("tok-1"));
		assert_eq!(request.header("Authorization"), Some("Bearer tok-1"));
	}
}

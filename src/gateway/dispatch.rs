//! Request dispatch with 401 interception and a single replay.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, StatusError},
	gateway::Gateway,
	http::{AUTHORIZATION, ApiRequest, ApiResponse, Body, CONTENT_TYPE, HttpTransport, OutboundRequest},
	obs::{self, OpKind, OpSpan},
	refresh::RefreshTurn,
};

const UNAUTHORIZED: u16 = 401;

/// Which dispatch of a request is being made; only the initial one may enter a refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attempt {
	Initial,
	Replay,
}
#[cfg(feature = "tracing")]
impl Attempt {
	const fn as_str(self) -> &'static str {
		match self {
			Attempt::Initial => "initial",
			Attempt::Replay => "replay",
		}
	}
}

enum Exchange {
	Done(ApiResponse),
	Unauthorized(StatusError),
}

impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Sends `request` with the stored bearer token, transparently refreshing and replaying once
	/// on a first HTTP 401.
	///
	/// Non-2xx statuses come back as [`Error::Status`](crate::error::Error::Status) and transport
	/// failures as [`Error::Transport`](crate::error::Error::Transport); neither touches the
	/// refresh path. When the refresh this call led fails, the session is force-logged-out and
	/// the original 401 is returned; a call that waited on someone else's failed refresh gets
	/// [`Error::Refresh`](crate::error::Error::Refresh). A 401 that arrives after the cycle of
	/// its burst already failed returns the original 401 without another refresh.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		let span = OpSpan::request(request.method, &request.path);

		obs::observe(OpKind::Send, span, self.send_with_refresh(request)).await
	}

	async fn send_with_refresh(&self, request: ApiRequest) -> Result<ApiResponse> {
		// Captured before the token so a cycle finishing mid-flight is detected on 401.
		let epoch = self.coordinator().epoch();
		let token = self.store.access_token().await?;
		let rejected = match self.dispatch(&request, token.as_ref(), Attempt::Initial).await? {
			Exchange::Done(response) => return Ok(response),
			Exchange::Unauthorized(rejected) => rejected,
		};
		let turn =
			self.coordinator().await_or_trigger_refresh(epoch, || self.refresh_tokens()).await;
		let token = match turn {
			RefreshTurn::Led(Ok(token)) | RefreshTurn::Joined(Ok(token)) => token,
			RefreshTurn::Led(Err(_)) => {
				self.forced_logout().await;

				return Err(rejected.into());
			},
			RefreshTurn::Joined(Err(e)) => return Err(e.into()),
			RefreshTurn::AlreadyFailed(_) => return Err(rejected.into()),
			RefreshTurn::AlreadyRefreshed => match self.store.access_token().await? {
				Some(token) => token,
				None => return Err(rejected.into()),
			},
		};

		match self.dispatch(&request, Some(&token), Attempt::Replay).await? {
			Exchange::Done(response) => Ok(response),
			Exchange::Unauthorized(rejected) => Err(rejected.into()),
		}
	}

	async fn dispatch(
		&self,
		request: &ApiRequest,
		token: Option<&TokenSecret>,
		attempt: Attempt,
	) -> Result<Exchange> {
		let outbound = self.prepare(request, token)?;

		obs::op_event!(
			debug,
			attempt = attempt.as_str(),
			method = outbound.method.as_str(),
			url = outbound.url.as_str(),
			"dispatching request"
		);

		let response = self.transport.execute(outbound).await?;

		if response.status == UNAUTHORIZED && attempt == Attempt::Initial {
			obs::op_event!(debug, path = request.path.as_str(), "request rejected with 401");

			return Ok(Exchange::Unauthorized(StatusError {
				status: response.status,
				body: response.text(),
			}));
		}

		Ok(Exchange::Done(response.error_for_status()?))
	}

	/// Merges default headers, request headers, and the bearer token, in that order.
	///
	/// Without a stored token the request goes out with no `Authorization` header at all.
	fn prepare(&self, request: &ApiRequest, token: Option<&TokenSecret>) -> Result<OutboundRequest> {
		let url = self.config().resolve(&request.path)?;
		let timeout = request.timeout.unwrap_or(self.config().default_timeout);

		if timeout <= Duration::ZERO {
			return Err(ConfigError::NonPositiveTimeout { timeout }.into());
		}

		let mut headers = self.default_headers();

		headers.extend(request.headers.iter().map(|(name, value)| (name.clone(), value.clone())));

		match token {
			Some(token) => headers.insert(AUTHORIZATION.to_owned(), token.bearer()),
			None => headers.remove(AUTHORIZATION),
		};

		if matches!(request.body, Body::Form(_)) {
			headers.remove(CONTENT_TYPE);
		}

		Ok(OutboundRequest { method: request.method, url, headers, body: request.body.clone(), timeout })
	}
}

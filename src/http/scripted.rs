//! In-process [`HttpTransport`] that answers from per-route scripts.
//!
//! Useful for demos and tests that need deterministic interleavings: a route can be held behind
//! a semaphore so a test decides exactly when its response is released.

// crates.io
use tokio::sync::Semaphore;
// self
use crate::{
	_prelude::*,
	config::DEFAULT_REFRESH_PATH,
	error::TransportError,
	http::{ApiResponse, HttpTransport, OutboundRequest, TransportFuture},
};

type Script = Arc<dyn Fn(&OutboundRequest) -> Result<ApiResponse, TransportError> + Send + Sync>;

/// Transport whose responses are produced by closures keyed on the request path.
///
/// Routes are matched on the URL path without its leading `/`. Unscripted routes answer 404.
/// Clones share scripts and the request log.
#[derive(Clone, Default)]
pub struct ScriptedTransport(Arc<ScriptState>);
impl ScriptedTransport {
	/// Answers requests to `path` with the response produced by `respond`.
	pub fn respond<F>(&self, path: &str, respond: F)
	where
		F: 'static + Fn(&OutboundRequest) -> ApiResponse + Send + Sync,
	{
		self.script(path, Arc::new(move |request: &OutboundRequest| Ok(respond(request))));
	}

	/// Answers the default refresh route with the response produced by `respond`.
	pub fn respond_refresh<F>(&self, respond: F)
	where
		F: 'static + Fn(&OutboundRequest) -> ApiResponse + Send + Sync,
	{
		self.respond(DEFAULT_REFRESH_PATH, respond);
	}

	/// Fails requests to `path` with the transport error produced by `fail`.
	pub fn fail<F>(&self, path: &str, fail: F)
	where
		F: 'static + Fn() -> TransportError + Send + Sync,
	{
		self.script(path, Arc::new(move |_: &OutboundRequest| Err(fail())));
	}

	/// Holds every response for `path` until a permit is added to the returned semaphore.
	pub fn hold(&self, path: &str) -> Arc<Semaphore> {
		let gate = Arc::new(Semaphore::new(0));

		self.0.holds.lock().insert(route_key(path), gate.clone());

		gate
	}

	/// Every request received so far, in arrival order.
	pub fn requests(&self) -> Vec<OutboundRequest> {
		self.0.log.lock().clone()
	}

	/// Number of requests received for `path`.
	pub fn calls_to(&self, path: &str) -> usize {
		let key = route_key(path);

		self.0.log.lock().iter().filter(|request| route_key(request.url.path()) == key).count()
	}

	/// Number of requests received on the default refresh route.
	pub fn refresh_calls(&self) -> usize {
		self.calls_to(DEFAULT_REFRESH_PATH)
	}

	/// Bearer tokens carried by each request to `path`, in arrival order.
	pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
		let key = route_key(path);

		self.0
			.log
			.lock()
			.iter()
			.filter(|request| route_key(request.url.path()) == key)
			.map(|request| request.bearer().map(str::to_owned))
			.collect()
	}

	fn script(&self, path: &str, script: Script) {
		self.0.scripts.lock().insert(route_key(path), script);
	}

	async fn answer(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
		let key = route_key(request.url.path());

		self.0.log.lock().push(request.clone());

		let gate = self.0.holds.lock().get(&key).cloned();

		if let Some(gate) = gate {
			gate.acquire().await.map_err(TransportError::network)?.forget();
		}

		let script = self.0.scripts.lock().get(&key).cloned();

		match script {
			Some(script) => script(&request),
			None => Ok(ApiResponse::new(404, "{\"detail\":\"Not found.\"}")),
		}
	}
}
impl HttpTransport for ScriptedTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(self.answer(request))
	}
}
impl Debug for ScriptedTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ScriptedTransport")
			.field("routes", &self.0.scripts.lock().keys().cloned().collect::<Vec<_>>())
			.field("requests", &self.0.log.lock().len())
			.finish()
	}
}

#[derive(Default)]
struct ScriptState {
	scripts: Mutex<HashMap<String, Script>>,
	holds: Mutex<HashMap<String, Arc<Semaphore>>>,
	log: Mutex<Vec<OutboundRequest>>,
}

fn route_key(path: &str) -> String {
	path.trim_start_matches('/').to_owned()
}

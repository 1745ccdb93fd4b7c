//! Navigation capability invoked when the gateway forces a logout.

// self
use crate::_prelude::*;

/// Sends the user to the unauthenticated entry point.
///
/// The gateway calls [`redirect_to_login`](Navigator::redirect_to_login) at most once per lost
/// session; implementations do not need to de-duplicate.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `location` (the gateway's configured login route).
	fn redirect_to_login(&self, location: &str);
}

/// Navigator that does nothing; useful for headless tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn redirect_to_login(&self, _location: &str) {}
}

/// Navigator backed by a closure supplied by the host UI.
pub struct CallbackNavigator<F>(F);
impl<F> CallbackNavigator<F>
where
	F: Fn(&str) + Send + Sync,
{
	/// Wraps `callback`.
	pub fn new(callback: F) -> Self {
		Self(callback)
	}
}
impl<F> Navigator for CallbackNavigator<F>
where
	F: Fn(&str) + Send + Sync,
{
	fn redirect_to_login(&self, location: &str) {
		(self.0)(location);
	}
}
impl<F> Debug for CallbackNavigator<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CallbackNavigator(..)")
	}
}

/// Navigator that records every redirect; handy in tests and demos.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator(Arc<Mutex<Vec<String>>>);
impl RecordingNavigator {
	/// Returns every location requested so far.
	pub fn redirects(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	/// Number of redirects requested so far.
	pub fn count(&self) -> usize {
		self.0.lock().len()
	}
}
impl Navigator for RecordingNavigator {
	fn redirect_to_login(&self, location: &str) {
		self.0.lock().push(location.to_owned());
	}
}

//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `ems_gateway.op` with the `op` and `stage`
//!   fields, plus debug/warn events for refresh cycles, waiters, replays, and forced logouts.
//! - Enable `metrics` to increment the `ems_gateway_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and `ems_gateway_refresh_waiters_total`
//!   by the number of callers each refresh cycle settles besides its leader.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Emits a `tracing` event at the given level when the `tracing` feature is enabled.
macro_rules! op_event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use op_event;

/// Runs `fut` inside `span`, recording an attempt and then its success or failure under `kind`.
pub(crate) async fn observe<Fut, T, E>(kind: OpKind, span: OpSpan, fut: Fut) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
{
	record_op_outcome(kind, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	record_op_outcome(kind, if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });

	result
}

/// Gateway operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Authenticated request dispatch, including any replay.
	Send,
	/// Token refresh cycle.
	Refresh,
	/// Forced logout after a failed refresh.
	Logout,
	/// Typed service call layered over `Send`.
	Service,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Send => "send",
			OpKind::Refresh => "refresh",
			OpKind::Logout => "logout",
			OpKind::Service => "service",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a gateway helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

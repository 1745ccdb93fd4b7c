//! Single-flight coordination of token refresh cycles.
//!
//! A [`RefreshCoordinator`] belongs to exactly one gateway. Every request that hits a first-time
//! 401 calls [`RefreshCoordinator::await_or_trigger_refresh`]: the first caller of a cycle runs
//! the refresh future (the leader), callers arriving while it is outstanding park on a one-shot
//! channel (the waiters), and all of them observe the same [`RefreshOutcome`]. The waiter queue
//! is drained and the in-flight flag cleared inside one critical section, so a new cycle can
//! only start after every waiter of the previous one has been settled.
//!
//! Each concluded cycle bumps an epoch. A request that was dispatched before the latest cycle
//! concluded and only now reports its 401 belongs to that cycle's burst: it gets
//! [`RefreshTurn::AlreadyRefreshed`] or [`RefreshTurn::AlreadyFailed`] instead of starting a
//! redundant cycle. An abandoned cycle concludes nothing and leaves the epoch unchanged.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError, obs, store::StoreError};

/// Result shared by the leader and every waiter of one refresh cycle.
pub type RefreshOutcome = Result<TokenSecret, RefreshError>;

/// Reasons a refresh cycle can fail. Cloned to every waiter of the cycle.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token is stored; no network call was made.
	#[error("No refresh token is available.")]
	MissingRefreshToken,
	/// The refresh request timed out.
	#[error("Token refresh timed out.")]
	Timeout,
	/// The refresh request failed at the transport level.
	#[error("Token refresh failed at the transport level: {message}.")]
	Transport {
		/// Transport error rendered as text.
		message: String,
	},
	/// The refresh endpoint answered with a non-success status.
	#[error("Token refresh was rejected with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The refresh endpoint answered 2xx with a body that is not `{access, refresh?}`.
	#[error("Token refresh response is malformed: {message}.")]
	Malformed {
		/// Parser message including the failing path.
		message: String,
	},
	/// The new tokens could not be persisted.
	#[error("Refreshed tokens could not be stored: {0}")]
	Storage(#[from] StoreError),
	/// The leader was dropped before the cycle settled.
	#[error("Token refresh was abandoned before it completed.")]
	Abandoned,
}

impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		if e.is_timeout() {
			return Self::Timeout;
		}

		let message = match StdError::source(&e) {
			Some(source) => format!("{e} {source}"),
			None => e.to_string(),
		};

		Self::Transport { message }
	}
}

/// How a caller took part in a refresh cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshTurn {
	/// The caller ran the refresh itself.
	Led(RefreshOutcome),
	/// The caller waited on a cycle another request started.
	Joined(RefreshOutcome),
	/// A cycle already succeeded after the caller's request was dispatched; the stored token is
	/// newer than the one that was rejected.
	AlreadyRefreshed,
	/// A cycle already failed after the caller's request was dispatched; its leader has handled
	/// the failure.
	AlreadyFailed(RefreshError),
}
impl RefreshTurn {
	/// Returns the outcome of a cycle the caller took part in; `None` when it arrived late.
	pub fn outcome(&self) -> Option<&RefreshOutcome> {
		match self {
			Self::Led(outcome) | Self::Joined(outcome) => Some(outcome),
			Self::AlreadyRefreshed | Self::AlreadyFailed(_) => None,
		}
	}
}

#[derive(Default)]
struct CycleState {
	in_flight: bool,
	epoch: u64,
	last_failure: Option<RefreshError>,
	waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum Ticket<'a> {
	Leader(RefreshLease<'a>),
	Waiter(oneshot::Receiver<RefreshOutcome>),
	Late(Option<RefreshError>),
}

/// Single-flight gate for token refresh cycles.
#[derive(Default)]
pub struct RefreshCoordinator {
	state: Mutex<CycleState>,
	metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Number of refresh cycles that have concluded so far, successfully or not.
	pub fn epoch(&self) -> u64 {
		self.state.lock().epoch
	}

	/// Returns `true` while a refresh cycle is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().in_flight
	}

	/// Number of callers currently parked on the outstanding cycle.
	pub fn pending_waiters(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Counters for completed cycles and parked callers.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Joins the outstanding refresh cycle or starts a new one by running `refresh`.
	///
	/// `observed_epoch` is the value of [`epoch`](Self::epoch) captured before the failing
	/// request was dispatched.
	pub async fn await_or_trigger_refresh<F, Fut>(&self, observed_epoch: u64, refresh: F) -> RefreshTurn
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = RefreshOutcome>,
	{
		match self.enter(observed_epoch) {
			Ticket::Late(None) => RefreshTurn::AlreadyRefreshed,
			Ticket::Late(Some(failure)) => RefreshTurn::AlreadyFailed(failure),
			Ticket::Waiter(receiver) => {
				let outcome = receiver.await.unwrap_or(Err(RefreshError::Abandoned));

				RefreshTurn::Joined(outcome)
			},
			Ticket::Leader(lease) => {
				let outcome = refresh().await;

				lease.settle(outcome.clone());

				RefreshTurn::Led(outcome)
			},
		}
	}

	fn enter(&self, observed_epoch: u64) -> Ticket<'_> {
		let mut state = self.state.lock();

		if state.in_flight {
			let (sender, receiver) = oneshot::channel();

			state.waiters.push(sender);
			self.metrics.record_wait();

			return Ticket::Waiter(receiver);
		}
		if state.epoch != observed_epoch {
			return Ticket::Late(state.last_failure.clone());
		}

		state.in_flight = true;
		self.metrics.record_cycle();

		Ticket::Leader(RefreshLease { coordinator: self, settled: false })
	}

	fn release(&self, outcome: RefreshOutcome) {
		let mut state = self.state.lock();
		let waiters = mem::take(&mut state.waiters);
		let waiter_count = waiters.len();

		obs::op_event!(debug, waiters = waiter_count, ok = outcome.is_ok(), "settling refresh cycle");

		for waiter in waiters {
			// A waiter whose caller went away has nothing left to settle.
			let _ = waiter.send(outcome.clone());
		}

		match &outcome {
			Ok(_) => {
				state.epoch = state.epoch.wrapping_add(1);
				state.last_failure = None;
				self.metrics.record_success();
			},
			Err(RefreshError::Abandoned) => self.metrics.record_failure(),
			Err(e) => {
				state.epoch = state.epoch.wrapping_add(1);
				state.last_failure = Some(e.clone());
				self.metrics.record_failure();
			},
		}

		obs::record_refresh_waiters(waiter_count);

		state.in_flight = false;
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("in_flight", &state.in_flight)
			.field("epoch", &state.epoch)
			.field("waiters", &state.waiters.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Leadership of one refresh cycle; dropping it unsettled releases waiters as abandoned.
struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	fn settle(mut self, outcome: RefreshOutcome) {
		self.settled = true;
		self.coordinator.release(outcome);
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			obs::op_event!(warn, "refresh leader dropped before settling");

			self.coordinator.release(Err(RefreshError::Abandoned));
		}
	}
}

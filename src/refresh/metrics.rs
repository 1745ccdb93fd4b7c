// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh cycles.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	cycles: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	waits: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh cycles started (network calls attempted or skipped for a
	/// missing refresh token).
	pub fn cycles(&self) -> u64 {
		self.cycles.load(Ordering::Relaxed)
	}

	/// Returns the number of cycles that produced a new access token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of cycles that failed or were abandoned.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many requests parked behind an outstanding cycle instead of starting one.
	pub fn waits(&self) -> u64 {
		self.waits.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cycle(&self) {
		self.cycles.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_wait(&self) {
		self.waits.fetch_add(1, Ordering::Relaxed);
	}
}

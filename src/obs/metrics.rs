// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"ems_gateway_op_total",
			"op" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Adds the number of waiters a settled refresh cycle released.
pub fn record_refresh_waiters(count: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ems_gateway_refresh_waiters_total").increment(count as u64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = count;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_noops_without_recorder() {
		record_op_outcome(OpKind::Logout, OpOutcome::Failure);
		record_refresh_waiters(3);
	}
}

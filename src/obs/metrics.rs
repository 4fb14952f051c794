// self
use crate::obs::{OpKind, OpOutcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"session_broker_op_total",
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

/// Records a phase transition via the global metrics recorder (when enabled).
pub fn record_transition(from: &'static str, to: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("session_broker_transition_total", "from" => from, "to" => to)
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (from, to);
	}
}

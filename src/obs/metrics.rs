// self
use crate::obs::{CallKind, CallOutcome};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"ads_gateway_call_total",
			"call" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a circuit breaker transition into `state` (`CLOSED`, `OPEN`, `HALF_OPEN`).
pub fn record_circuit_transition(state: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(target: "ads_gateway::circuit", state, "circuit breaker transitioned");

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ads_gateway_circuit_transition_total", "state" => state).increment(1);
	}

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = state;
	}
}

/// Records a local rate-limit or quota rejection labeled by its kind.
pub fn record_rate_limit_rejection(kind: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(target: "ads_gateway::rate_limit", kind, "request rejected by rate limiter");

	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ads_gateway_rate_limit_rejection_total", "kind" => kind).increment(1);
	}

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = kind;
	}
}

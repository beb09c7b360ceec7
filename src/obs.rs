//! Optional observability helpers for client calls and resilience transitions.
//!
//! # Feature Flags
//!
//! - `tracing` wraps every API call and token flow in an `ads_gateway.call` span carrying the
//!   `call` and `stage` fields, and emits events on circuit transitions and rate-limit
//!   rejections.
//! - `metrics` increments `ads_gateway_call_total{call,outcome}`,
//!   `ads_gateway_circuit_transition_total{state}` and
//!   `ads_gateway_rate_limit_rejection_total{kind}`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outbound calls observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Query against the search endpoint.
	Search,
	/// Bulk write against a mutate endpoint.
	Mutate,
	/// Single-resource lookup.
	Get,
	/// One page of a streamed search.
	StreamPage,
	/// Accessible-account listing.
	ListAccounts,
	/// Authorization-code exchange.
	ExchangeCode,
	/// Refresh-token exchange.
	RefreshToken,
	/// Token revocation.
	RevokeToken,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Search => "search",
			CallKind::Mutate => "mutate",
			CallKind::Get => "get",
			CallKind::StreamPage => "stream_page",
			CallKind::ListAccounts => "list_accounts",
			CallKind::ExchangeCode => "exchange_code",
			CallKind::RefreshToken => "refresh_token",
			CallKind::RevokeToken => "revoke_token",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a client helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Call rejected locally before reaching the network.
	Rejected,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
			CallOutcome::Rejected => "rejected",
		}
	}

	/// Classifies a finished call from its result.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Self::Success,
			Err(Error::CircuitOpen { .. } | Error::Quota { .. }) => Self::Rejected,
			Err(_) => Self::Failure,
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

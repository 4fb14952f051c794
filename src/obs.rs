//! Optional observability helpers for coordinator operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `session_broker.op` with the `op` and
//!   `stage` (call site) fields, plus `debug` events for every phase transition.
//! - Enable `metrics` to increment the `session_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, and the
//!   `session_broker_transition_total` counter labeled by `from` + `to`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Coordinator operations observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Startup identity resolution.
	Bootstrap,
	/// Proactive freshness check before dispatch.
	EnsureFresh,
	/// Refresh-token exchange.
	Renew,
	/// Reactive recovery after a `401`.
	Unauthorized,
	/// Credential login.
	Login,
	/// Session teardown.
	Logout,
	/// Login hint consumption.
	SyncHint,
	/// Authenticated request through the dispatcher.
	Dispatch,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Bootstrap => "bootstrap",
			OpKind::EnsureFresh => "ensure_fresh",
			OpKind::Renew => "renew",
			OpKind::Unauthorized => "unauthorized",
			OpKind::Login => "login",
			OpKind::Logout => "logout",
			OpKind::SyncHint => "sync_hint",
			OpKind::Dispatch => "dispatch",
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
	/// Entry to a coordinator operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Rejected by the debounce window without doing any work.
	Debounced,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Debounced => "debounced",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

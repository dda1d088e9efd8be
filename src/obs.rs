//! Optional observability helpers for coordinator and HTTP-layer operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_account.op` with the `op`, `stage`
//!   (call site), and `identity` fields.
//! - Enable `metrics` to increment the `oauth2_account_op_total` counter for every
//!   attempt/success/failure/join, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Cached-or-refresh token lookup.
	GetToken,
	/// Single-flight refresh cycle.
	Refresh,
	/// Bearer stamping on an outbound request.
	Intercept,
	/// 401 handling by the retry authenticator.
	Retry,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::GetToken => "get_token",
			OpKind::Refresh => "refresh",
			OpKind::Intercept => "intercept",
			OpKind::Retry => "retry",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Caller queued behind an in-flight refresh instead of starting one.
	Joined,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::Joined => "joined",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

//! Optional observability helpers for client calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `idp_client.call` with the `call` (operation)
//!   and `stage` (call site) fields, plus the structured warning used by the relaxed-validation
//!   escape hatch.
//! - Enable `metrics` to increment the `idp_client_call_total` counter for every
//!   attempt/success/failure/retry, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Resource creation.
	Create,
	/// Single-resource fetch.
	Get,
	/// Collection fetch.
	GetAll,
	/// Partial update.
	Patch,
	/// Full replacement.
	Put,
	/// Resource deletion.
	Delete,
	/// Token exchange.
	Exchange,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Create => "create",
			CallKind::Get => "get",
			CallKind::GetAll => "get_all",
			CallKind::Patch => "patch",
			CallKind::Put => "put",
			CallKind::Delete => "delete",
			CallKind::Exchange => "exchange",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a client operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Retryable failure about to be re-attempted after backoff.
	Retry,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
			CallOutcome::Retry => "retry",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

// self
use crate::obs::{CallKind, CallOutcome};

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_call_outcome(kind: CallKind, outcome: CallOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"idp_client_call_total",
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

/// Records a skipped identity-token verification (when enabled).
pub fn record_verification_skipped(reason: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("idp_client_verification_skipped_total", "reason" => reason).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = reason;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_call_outcome_noop_without_metrics() {
		record_call_outcome(CallKind::Create, CallOutcome::Failure);
	}

	#[test]
	fn record_verification_skipped_noop_without_metrics() {
		record_verification_skipped("missing_client_secret");
	}
}

//! Bounded, jittered retry wrapper for REST-like resources.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	encode::RequestParams,
	error::ArgumentError,
	obs::{self, CallKind, CallOutcome},
	rest::{ResourceFuture, RestResource},
};

/// Governs how [`RetryingRestClient`] re-issues failed calls.
///
/// The policy is a per-instance value; wrapping two resources with different
/// policies never shares retry state between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	enabled: bool,
	max_retries: u32,
	base_delay: Duration,
}
impl RetryPolicy {
	/// Default retry budget.
	pub const DEFAULT_MAX_RETRIES: u32 = 3;
	/// Upper bound on a single backoff delay.
	const MAX_DELAY: Duration = Duration::seconds(10);
	/// Largest accepted retry budget.
	pub const MAX_RETRY_BUDGET: u32 = 10;

	/// Builds a policy, validating the retry budget into `0..=10`.
	pub fn new(enabled: bool, max_retries: u32) -> Result<Self, ArgumentError> {
		if max_retries > Self::MAX_RETRY_BUDGET {
			return Err(ArgumentError::RetryBudgetOutOfRange { value: max_retries });
		}

		Ok(Self { enabled, max_retries, base_delay: Duration::milliseconds(500) })
	}

	/// Builds a policy that always calls through exactly once.
	pub fn disabled() -> Self {
		Self { enabled: false, max_retries: 0, base_delay: Duration::ZERO }
	}

	/// Overrides the base backoff delay (negative values clamp to zero).
	pub fn with_base_delay(mut self, delay: Duration) -> Self {
		self.base_delay = if delay.is_negative() { Duration::ZERO } else { delay };

		self
	}

	/// Returns whether retries are enabled.
	pub fn enabled(&self) -> bool {
		self.enabled
	}

	/// Returns the retry budget.
	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}

	/// Computes the sleep before re-attempt number `attempt` (zero-based).
	///
	/// Exponential growth with full jitter: the delay is drawn uniformly from
	/// the upper half of `base * 2^attempt`, floored by any upstream
	/// Retry-After hint, and capped so a hostile hint cannot park the caller.
	pub(crate) fn backoff_delay(&self, attempt: u32, floor: Option<Duration>) -> StdDuration {
		let base_ms = self.base_delay.whole_milliseconds().clamp(0, i64::MAX as i128) as u64;
		let exp_ms = base_ms.saturating_mul(1_u64 << attempt.min(16));
		let jittered_ms = if exp_ms <= 1 {
			exp_ms
		} else {
			rand::rng().random_range(exp_ms / 2..=exp_ms)
		};
		let floor_ms = floor
			.map(|hint| hint.whole_milliseconds().clamp(0, i64::MAX as i128) as u64)
			.unwrap_or(0);
		let max_ms = Self::MAX_DELAY.whole_milliseconds() as u64;

		StdDuration::from_millis(jittered_ms.max(floor_ms).min(max_ms))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			enabled: true,
			max_retries: Self::DEFAULT_MAX_RETRIES,
			base_delay: Duration::milliseconds(500),
		}
	}
}

/// Wraps any [`RestResource`] and re-executes failed calls under the policy.
///
/// Retryable failures (network-transient, 5xx, rate-limit) consume budget and
/// sleep a jittered backoff before the next attempt; terminal failures and
/// successes return immediately. Total attempts never exceed
/// `max_retries + 1`.
#[derive(Clone, Debug)]
pub struct RetryingRestClient<R>
where
	R: ?Sized + RestResource,
{
	inner: Arc<R>,
	policy: RetryPolicy,
}
impl<R> RetryingRestClient<R>
where
	R: ?Sized + RestResource,
{
	/// Wraps a resource with the given policy.
	pub fn new(inner: impl Into<Arc<R>>, policy: RetryPolicy) -> Self {
		Self { inner: inner.into(), policy }
	}

	/// Wraps a resource with the default policy (enabled, budget 3).
	pub fn with_default_policy(inner: impl Into<Arc<R>>) -> Self {
		Self::new(inner, RetryPolicy::default())
	}

	/// Returns the active policy.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Returns the wrapped resource.
	pub fn inner(&self) -> &Arc<R> {
		&self.inner
	}

	fn run<'a, T, F>(&'a self, kind: CallKind, attempt: F) -> ResourceFuture<'a, T>
	where
		T: 'a + Send,
		F: 'a + Send + Fn() -> ResourceFuture<'a, T>,
	{
		Box::pin(async move {
			if !self.policy.enabled() {
				return attempt().await;
			}

			let mut retries = 0;

			loop {
				match attempt().await {
					Ok(value) => return Ok(value),
					Err(err) if err.is_retryable() && retries < self.policy.max_retries() => {
						let delay = self.policy.backoff_delay(retries, err.retry_after());

						obs::record_call_outcome(kind, CallOutcome::Retry);
						tokio::time::sleep(delay).await;

						retries += 1;
					},
					Err(err) => return Err(err),
				}
			}
		})
	}
}
impl<R> RestResource for RetryingRestClient<R>
where
	R: ?Sized + RestResource,
{
	fn create<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value> {
		self.run(CallKind::Create, move || self.inner.create(params, body))
	}

	fn get<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		self.run(CallKind::Get, move || self.inner.get(params))
	}

	fn get_all<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		self.run(CallKind::GetAll, move || self.inner.get_all(params))
	}

	fn patch<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value> {
		self.run(CallKind::Patch, move || self.inner.patch(params, body))
	}

	fn put<'a>(&'a self, params: &'a RequestParams, body: &'a Value) -> ResourceFuture<'a, Value> {
		self.run(CallKind::Put, move || self.inner.put(params, body))
	}

	fn delete<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		self.run(CallKind::Delete, move || self.inner.delete(params))
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicU32, Ordering};
	// self
	use super::*;
	use crate::{
		error::TransportError,
		rest::{Method, RequestSnapshot},
	};

	struct ScriptedResource {
		attempts: AtomicU32,
		failures_before_success: u32,
		status: u16,
	}
	impl ScriptedResource {
		fn new(failures_before_success: u32, status: u16) -> Self {
			Self { attempts: AtomicU32::new(0), failures_before_success, status }
		}

		fn attempts(&self) -> u32 {
			self.attempts.load(Ordering::SeqCst)
		}

		fn respond(&self) -> Result<Value> {
			let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

			if attempt < self.failures_before_success {
				Err(TransportError::Status {
					status: self.status,
					message: "scripted".into(),
					retry_after: None,
					request: RequestSnapshot::new(Method::Get, "https://example.com/x"),
				}
				.into())
			} else {
				Ok(serde_json::json!({"attempt": attempt}))
			}
		}
	}
	impl RestResource for ScriptedResource {
		fn create<'a>(
			&'a self,
			_: &'a RequestParams,
			_: &'a Value,
		) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}

		fn get<'a>(&'a self, _: &'a RequestParams) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}

		fn get_all<'a>(&'a self, _: &'a RequestParams) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}

		fn patch<'a>(&'a self, _: &'a RequestParams, _: &'a Value) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}

		fn put<'a>(&'a self, _: &'a RequestParams, _: &'a Value) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}

		fn delete<'a>(&'a self, _: &'a RequestParams) -> ResourceFuture<'a, Value> {
			Box::pin(async move { self.respond() })
		}
	}

	fn fast_policy(max_retries: u32) -> RetryPolicy {
		RetryPolicy::new(true, max_retries)
			.expect("Policy should accept budgets within range.")
			.with_base_delay(Duration::milliseconds(1))
	}

	#[test]
	fn budget_outside_range_is_rejected() {
		let err = RetryPolicy::new(true, 11).expect_err("Budgets above 10 should be rejected.");

		assert!(matches!(err, ArgumentError::RetryBudgetOutOfRange { value: 11 }));
		assert!(RetryPolicy::new(true, 10).is_ok());
		assert_eq!(RetryPolicy::default().max_retries(), 3);
	}

	#[test]
	fn backoff_grows_and_respects_floor_and_cap() {
		let policy = RetryPolicy::default();

		for attempt in 0..4 {
			let delay = policy.backoff_delay(attempt, None);
			let exp_ms = 500 * (1 << attempt);

			assert!(delay >= StdDuration::from_millis(exp_ms / 2));
			assert!(delay <= StdDuration::from_millis(exp_ms.min(10_000)));
		}

		let floored = policy.backoff_delay(0, Some(Duration::seconds(2)));

		assert!(floored >= StdDuration::from_secs(2));

		let capped = policy.backoff_delay(0, Some(Duration::seconds(120)));

		assert_eq!(capped, StdDuration::from_secs(10));
	}

	#[tokio::test]
	async fn exhausted_budget_returns_last_error_after_n_plus_one_attempts() {
		let resource = Arc::new(ScriptedResource::new(u32::MAX, 503));
		let client: RetryingRestClient<ScriptedResource> =
			RetryingRestClient::new(resource.clone(), fast_policy(2));
		let params = RequestParams::new();
		let err = client.get(&params).await.expect_err("Exhausted retries should fail.");

		assert!(matches!(err, Error::Transport(TransportError::Status { status: 503, .. })));
		assert_eq!(resource.attempts(), 3);
	}

	#[tokio::test]
	async fn transient_failure_recovers_within_budget() {
		let resource = Arc::new(ScriptedResource::new(2, 500));
		let client: RetryingRestClient<ScriptedResource> =
			RetryingRestClient::new(resource.clone(), fast_policy(3));
		let params = RequestParams::new();
		let body = client.get(&params).await.expect("Recovery within budget should succeed.");

		assert_eq!(body, serde_json::json!({"attempt": 2}));
		assert_eq!(resource.attempts(), 3);
	}

	#[tokio::test]
	async fn terminal_failure_never_consumes_budget() {
		let resource = Arc::new(ScriptedResource::new(u32::MAX, 400));
		let client: RetryingRestClient<ScriptedResource> =
			RetryingRestClient::new(resource.clone(), fast_policy(5));
		let params = RequestParams::new();

		client.get(&params).await.expect_err("Terminal failures should surface immediately.");

		assert_eq!(resource.attempts(), 1);
	}

	#[tokio::test]
	async fn disabled_policy_calls_through_once() {
		let resource = Arc::new(ScriptedResource::new(u32::MAX, 503));
		let client: RetryingRestClient<ScriptedResource> =
			RetryingRestClient::new(resource.clone(), RetryPolicy::disabled());
		let params = RequestParams::new();

		client.get(&params).await.expect_err("Single attempt should fail.");

		assert_eq!(resource.attempts(), 1);
	}

	#[tokio::test]
	async fn zero_budget_calls_through_once() {
		let resource = Arc::new(ScriptedResource::new(u32::MAX, 503));
		let client: RetryingRestClient<ScriptedResource> = RetryingRestClient::new(
			resource.clone(),
			RetryPolicy::new(true, 0).expect("Zero budgets are valid."),
		);
		let params = RequestParams::new();

		client.get(&params).await.expect_err("Single attempt should fail.");

		assert_eq!(resource.attempts(), 1);
	}

	#[tokio::test]
	async fn rate_limit_consumes_budget_like_5xx() {
		let resource = Arc::new(ScriptedResource::new(1, 429));
		let client: RetryingRestClient<ScriptedResource> =
			RetryingRestClient::new(resource.clone(), fast_policy(1));
		let params = RequestParams::new();

		client.get(&params).await.expect("Rate-limited call should recover.");

		assert_eq!(resource.attempts(), 2);
	}
}

// crates.io
use httpmock::prelude::*;
// self
use idp_client::{
	_preludet::*,
	client::AuthenticatedRestClient,
	encode::RequestParams,
	error::TransportError,
	rest::{ReqwestRestTransport, RestResource},
	retry::{RetryPolicy, RetryingRestClient},
};

fn build_client(
	resource_url: &str,
	policy: RetryPolicy,
) -> RetryingRestClient<AuthenticatedRestClient<ReqwestRestTransport>> {
	RetryingRestClient::new(build_test_rest_client(resource_url, "it-access-token"), policy)
}

fn fast_policy(max_retries: u32) -> RetryPolicy {
	RetryPolicy::new(true, max_retries)
		.expect("Policy should accept budgets within range.")
		.with_base_delay(Duration::milliseconds(1))
}

#[tokio::test]
async fn server_errors_retry_until_the_budget_is_exhausted() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users/42");
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"message\":\"boom\"}");
		})
		.await;
	let client = build_client(&server.url("/api/v2/users/:id"), fast_policy(2));
	let params = RequestParams::new().with("id", "42");
	let err = client.get(&params).await.expect_err("Exhausted retries should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 500, .. })));

	mock.assert_calls_async(3).await;
}

#[tokio::test]
async fn client_errors_are_terminal() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users/42");
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"message\":\"not found\"}");
		})
		.await;
	let client = build_client(&server.url("/api/v2/users/:id"), fast_policy(5));
	let params = RequestParams::new().with("id", "42");
	let err = client.get(&params).await.expect_err("Not-found calls should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 404, .. })));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn disabled_policy_issues_a_single_call() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users/42");
			then.status(503);
		})
		.await;
	let client = build_client(&server.url("/api/v2/users/:id"), RetryPolicy::disabled());
	let params = RequestParams::new().with("id", "42");

	client.get(&params).await.expect_err("Single attempt should fail.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rate_limits_are_retried_with_the_hinted_floor() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/users/42");
			then.status(429)
				.header("retry-after", "0")
				.header("content-type", "application/json")
				.body("{\"message\":\"slow down\"}");
		})
		.await;
	let client = build_client(&server.url("/api/v2/users/:id"), fast_policy(1));
	let params = RequestParams::new().with("id", "42");
	let err = client.get(&params).await.expect_err("Exhausted retries should fail.");

	match err {
		Error::Transport(TransportError::Status { status, retry_after, .. }) => {
			assert_eq!(status, 429);
			assert_eq!(retry_after, Some(Duration::ZERO));
		},
		other => panic!("Expected a status error, got {other:?}"),
	}

	mock.assert_calls_async(2).await;
}

//! Demonstrates an authenticated, retry-wrapped resource fetch against a mock tenant with the
//! default reqwest transport.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use idp_client::{
	client::{AuthenticatedRestClient, RestClientOptions},
	encode::RequestParams,
	reqwest::Client,
	rest::{ReqwestRestTransport, RestResource},
	retry::{RetryPolicy, RetryingRestClient},
	token::StaticTokenProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/users/1234")
				.header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(
				"{\"user_id\":\"1234\",\"email\":\"demo@example.com\",\"name\":\"Demo User\"}",
			);
		})
		.await;
	let transport = ReqwestRestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let client = AuthenticatedRestClient::with_transport(
		&server.url("/api/v2/users/:id"),
		RestClientOptions::new().with_header("x-request-language", "en"),
		Arc::new(StaticTokenProvider::new("demo-access")),
		transport,
	)?;
	let client = RetryingRestClient::new(client, RetryPolicy::new(true, 2)?);
	let user = client.get(&RequestParams::new().with("id", "1234")).await?;

	println!("Fetched user: {user}.");

	user_mock.assert_async().await;

	Ok(())
}

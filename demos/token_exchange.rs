//! Demonstrates a verified token exchange: the returned identity token is checked against the
//! algorithm allow-list, issuer, audience, and configured client secret before release.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::OffsetDateTime;
// self
use idp_client::{
	client::{AuthenticatedRestClient, RestClientOptions},
	encode::RequestParams,
	jsonwebtoken::{Algorithm, EncodingKey, Header, encode},
	reqwest::Client,
	rest::ReqwestRestTransport,
	token::StaticTokenProvider,
	verify::{ExchangeOptions, IdTokenVerifyingOAuthClient},
};

const CLIENT_ID: &str = "demo-client";
const SECRET_BYTES: &[u8] = b"demo-exchange-secret";
// STANDARD base64 of `SECRET_BYTES`.
const SECRET_B64: &str = "ZGVtby1leGNoYW5nZS1zZWNyZXQ=";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let now = OffsetDateTime::now_utc().unix_timestamp();
	let claims = serde_json::json!({
		"iss": format!("{}/", server.base_url()),
		"sub": "user-1234",
		"aud": CLIENT_ID,
		"iat": now,
		"exp": now + 600,
	});
	let id_token =
		encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET_BYTES))?;
	let token_mock = server
		.mock_async(move |when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").json_body(
				serde_json::json!({
					"access_token": "demo-access",
					"id_token": id_token,
					"token_type": "Bearer",
				}),
			);
		})
		.await;
	let transport = ReqwestRestTransport::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let rest = AuthenticatedRestClient::with_transport(
		&server.url("/oauth/token"),
		RestClientOptions::new(),
		Arc::new(StaticTokenProvider::new("demo-access")),
		transport,
	)?;
	let exchanger = IdTokenVerifyingOAuthClient::new(
		rest,
		ExchangeOptions::new(server.base_url())
			.with_client_id(CLIENT_ID)
			.with_client_secret(SECRET_B64),
	)?;
	let body = serde_json::json!({
		"grant_type": "authorization_code",
		"client_id": CLIENT_ID,
		"code": "demo-code",
	});
	let response = exchanger.create(&RequestParams::new(), &body).await?;

	println!("Verified exchange response: {response}.");

	token_mock.assert_async().await;

	Ok(())
}

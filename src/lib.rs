//! Identity-provider API client core—token-injecting REST calls, jittered retries, and
//! verified token exchanges in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod encode;
pub mod error;
pub mod obs;
pub mod rest;
pub mod retry;
pub mod token;
pub mod verify;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{AuthenticatedRestClient, RestClientOptions},
		rest::ReqwestRestTransport,
		token::StaticTokenProvider,
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestRestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestRestTransport::with_client(client)
	}

	/// Constructs an [`AuthenticatedRestClient`] over the insecure test transport with a
	/// fixed bearer token.
	pub fn build_test_rest_client(
		resource_url: &str,
		token: &str,
	) -> AuthenticatedRestClient<ReqwestRestTransport> {
		AuthenticatedRestClient::with_transport(
			resource_url,
			RestClientOptions::new(),
			Arc::new(StaticTokenProvider::new(token)),
			test_reqwest_transport(),
		)
		.expect("Failed to build authenticated REST client for tests.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, idp_client as _};

//! Token provider contract and the redacting credential wrapper.

// self
use crate::{_prelude::*, error::BoxError};

/// Boxed future returned by [`TokenProvider::access_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Credential, BoxError>> + 'a + Send>>;

/// Produces a bearer credential on demand, asynchronously, and may fail.
///
/// The client consults the provider once per call and propagates failures
/// verbatim without inspecting their shape; when the provider fails, no
/// network attempt is made.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Fetches a fresh credential for the next outbound call.
	fn access_token(&self) -> TokenFuture<'_>;
}

/// Opaque bearer token wrapper keeping credential material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential(String);
impl Credential {
	/// Wraps a new credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for Credential {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Credential").field(&"<redacted>").finish()
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Provider that always yields the same fixed credential.
///
/// Useful for machine-to-machine deployments where a long-lived token is
/// injected through configuration, and for tests.
#[derive(Clone, Debug)]
pub struct StaticTokenProvider(Credential);
impl StaticTokenProvider {
	/// Wraps a fixed token value.
	pub fn new(token: impl Into<String>) -> Self {
		Self(Credential::new(token))
	}
}
impl TokenProvider for StaticTokenProvider {
	fn access_token(&self) -> TokenFuture<'_> {
		let credential = self.0.clone();

		Box::pin(async move { Ok(credential) })
	}
}

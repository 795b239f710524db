//! Transport primitives for REST calls against the identity-provider API.
//!
//! The module exposes [`RestTransport`] alongside [`RequestDescriptor`] and
//! [`RequestSnapshot`] so downstream crates can integrate custom HTTP clients
//! without losing the client's error-sanitization guarantees. Implementations
//! build a [`RequestSnapshot`] before dispatching a request and attach it to
//! every failure they emit, so the authenticated layer can redact credential
//! material with a typed field access instead of structural guessing.

// std
use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, encode::RequestParams, error::TransportError};

/// Literal marker written over redacted authorization header values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Boxed future returned by [`RestTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RestResponse>> + 'a + Send>>;
/// Boxed future returned by [`RestResource`] operations.
pub type ResourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// HTTP method subset used by the resource operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// HTTP GET.
	Get,
	/// HTTP POST.
	Post,
	/// HTTP PATCH.
	Patch,
	/// HTTP PUT.
	Put,
	/// HTTP DELETE.
	Delete,
}
impl Method {
	/// Returns the canonical uppercase method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Patch => "PATCH",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable per-call request value built fresh for every operation.
///
/// Nothing here is shared across concurrent calls; the authenticated layer
/// assembles a new descriptor from static configuration plus the freshly
/// fetched credential on each invocation.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Fully encoded request URL.
	pub url: Url,
	/// Header map sent with the request.
	pub headers: BTreeMap<String, String>,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl RequestDescriptor {
	/// Creates a descriptor for the given method and URL.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: BTreeMap::new(), body: None }
	}

	/// Adds a header, replacing any previous value for the name.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Captures the outbound shape of this request for error reporting.
	pub fn snapshot(&self) -> RequestSnapshot {
		RequestSnapshot {
			method: self.method,
			url: self.url.to_string(),
			headers: self.headers.clone(),
		}
	}
}

/// Typed snapshot of an outbound request, carried inside transport errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSnapshot {
	/// HTTP method.
	pub method: Method,
	/// Request URL as sent.
	pub url: String,
	/// Header map as sent.
	pub headers: BTreeMap<String, String>,
}
impl RequestSnapshot {
	/// Creates a snapshot without headers.
	pub fn new(method: Method, url: impl Into<String>) -> Self {
		Self { method, url: url.into(), headers: BTreeMap::new() }
	}

	/// Returns the authorization header value, when present.
	pub fn authorization(&self) -> Option<&str> {
		self.headers
			.iter()
			.find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
			.map(|(_, value)| value.as_str())
	}

	/// Overwrites any authorization header value with [`REDACTION_MARKER`].
	pub fn redact_authorization(&mut self) {
		for (name, value) in self.headers.iter_mut() {
			if name.eq_ignore_ascii_case("authorization") {
				*value = REDACTION_MARKER.into();
			}
		}
	}
}

/// Successful transport result: status code plus decoded JSON body.
///
/// Empty bodies decode to [`Value::Null`].
#[derive(Clone, Debug, Default)]
pub struct RestResponse {
	/// HTTP status code.
	pub status: u16,
	/// Decoded JSON body.
	pub body: Value,
}

/// Abstraction over HTTP transports capable of executing REST calls.
///
/// The trait is the client's only dependency on an HTTP stack. Implementations
/// must map failures into [`TransportError`] values carrying the request
/// snapshot so sanitization and retry classification work uniformly.
pub trait RestTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one request, decoding the response body as JSON.
	fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_>;
}

/// Contract shared by every REST-like resource the retry layer can wrap.
///
/// `params` carries the template substitutions plus extra query parameters;
/// write operations additionally take a JSON body. Each operation is a single
/// awaitable returning the decoded response body.
pub trait RestResource
where
	Self: Send + Sync,
{
	/// Creates a resource instance (HTTP POST).
	fn create<'a>(&'a self, params: &'a RequestParams, body: &'a Value)
	-> ResourceFuture<'a, Value>;

	/// Fetches one resource instance (HTTP GET).
	fn get<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value>;

	/// Fetches a resource collection (HTTP GET).
	fn get_all<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value>;

	/// Partially updates a resource instance (HTTP PATCH).
	fn patch<'a>(&'a self, params: &'a RequestParams, body: &'a Value)
	-> ResourceFuture<'a, Value>;

	/// Replaces a resource instance (HTTP PUT).
	fn put<'a>(&'a self, params: &'a RequestParams, body: &'a Value) -> ResourceFuture<'a, Value>;

	/// Deletes a resource instance (HTTP DELETE).
	fn delete<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The client sends descriptors as-is; callers configure timeouts, TLS, and
/// proxies on the [`ReqwestClient`] they pass in.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestRestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestRestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestRestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestRestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RestTransport for ReqwestRestTransport {
	fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let snapshot = request.snapshot();
			let mut builder =
				client.request(reqwest_method(request.method), request.url.clone());

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = &request.body {
				let bytes = serde_json::to_vec(body)
					.map_err(|err| TransportError::network(err, snapshot.clone()))?;

				builder = builder.header("content-type", "application/json").body(bytes);
			}

			let response = builder
				.send()
				.await
				.map_err(|err| TransportError::network(err, snapshot.clone()))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let bytes = response
				.bytes()
				.await
				.map_err(|err| TransportError::network(err, snapshot.clone()))?;

			if !status.is_success() {
				return Err(TransportError::Status {
					status: status.as_u16(),
					message: status_message(&bytes, &status),
					retry_after: parse_retry_after(&headers),
					request: snapshot,
				}
				.into());
			}

			let body = if bytes.is_empty() {
				Value::Null
			} else {
				let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

				serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
					TransportError::ResponseParse { source, status: Some(status.as_u16()) }
				})?
			};

			Ok(RestResponse { status: status.as_u16(), body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn reqwest_method(method: Method) -> reqwest::Method {
	match method {
		Method::Get => reqwest::Method::GET,
		Method::Post => reqwest::Method::POST,
		Method::Patch => reqwest::Method::PATCH,
		Method::Put => reqwest::Method::PUT,
		Method::Delete => reqwest::Method::DELETE,
	}
}

#[cfg(feature = "reqwest")]
fn status_message(bytes: &[u8], status: &reqwest::StatusCode) -> String {
	if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
		for field in ["error_description", "message", "error"] {
			if let Some(text) = body.get(field).and_then(Value::as_str) {
				return text.to_owned();
			}
		}
	}

	status.canonical_reason().unwrap_or("unknown status").to_owned()
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

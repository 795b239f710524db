//! Token-injecting REST client for identity-provider resources.

// self
use crate::{
	_prelude::*,
	encode::{RequestParams, UrlTemplate},
	error::ArgumentError,
	obs::{self, CallKind, CallOutcome, CallSpan},
	rest::{Method, RequestDescriptor, ResourceFuture, RestResource, RestTransport},
	token::TokenProvider,
};
#[cfg(feature = "reqwest")] use crate::rest::ReqwestRestTransport;

#[cfg(feature = "reqwest")]
/// Authenticated client specialized for the crate's default reqwest transport.
pub type ReqwestRestClient = AuthenticatedRestClient<ReqwestRestTransport>;

/// Static configuration recognized by [`AuthenticatedRestClient`].
///
/// Every field has a default; unknown concerns simply do not exist here, so
/// configuration mistakes surface at construction instead of per call.
#[derive(Clone, Debug, Default)]
pub struct RestClientOptions {
	/// Header template attached to every outbound request. The authorization
	/// header is owned by the credential flow; static entries for it are
	/// discarded at construction.
	pub headers: BTreeMap<String, String>,
}
impl RestClientOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a static header sent with every request.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}
}

/// REST client that fetches a bearer credential per call, injects it as an
/// authorization header, and sanitizes credential leakage from errors.
///
/// The client owns the transport, token provider, and encoded URL template.
/// All six resource operations funnel through one internal dispatch, so the
/// credential flow, the per-call request build, and the sanitization pass are
/// implemented exactly once.
#[derive(Clone)]
pub struct AuthenticatedRestClient<T>
where
	T: ?Sized + RestTransport,
{
	transport: Arc<T>,
	token_provider: Arc<dyn TokenProvider>,
	template: UrlTemplate,
	headers: BTreeMap<String, String>,
}
impl<T> AuthenticatedRestClient<T>
where
	T: ?Sized + RestTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	///
	/// `resource_url` must be a non-empty absolute URL, optionally containing
	/// `:name` placeholders; each violation raises a distinct
	/// [`ArgumentError`] at construction, not per call.
	pub fn with_transport(
		resource_url: &str,
		options: RestClientOptions,
		token_provider: Arc<dyn TokenProvider>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self> {
		let template = UrlTemplate::parse(resource_url)?;

		// Probe the base so malformed URLs fail here rather than on first use.
		// Colons inside placeholder segments are legal URL path characters, so
		// the raw template parses whenever the substituted target would.
		Url::parse(template.as_str())
			.map_err(|source| ArgumentError::InvalidResourceUrl { source })?;

		// A static authorization entry would ride alongside the per-call bearer
		// value as a second case-variant header.
		let mut headers = options.headers;

		headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));

		Ok(Self { transport: transport.into(), token_provider, template, headers })
	}

	/// Returns the parsed URL template.
	pub fn template(&self) -> &UrlTemplate {
		&self.template
	}

	async fn dispatch(
		&self,
		kind: CallKind,
		method: Method,
		params: &RequestParams,
		body: Option<&Value>,
	) -> Result<Value> {
		let span = CallSpan::new(kind, "dispatch");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span.instrument(self.dispatch_inner(method, params, body)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		result
	}

	async fn dispatch_inner(
		&self,
		method: Method,
		params: &RequestParams,
		body: Option<&Value>,
	) -> Result<Value> {
		// Provider failures surface verbatim; no network attempt is made.
		let credential =
			self.token_provider.access_token().await.map_err(Error::TokenProvider)?;
		let url = self.template.encode(params)?;
		let mut request = RequestDescriptor::new(method, url);

		for (name, value) in &self.headers {
			request = request.with_header(name.clone(), value.clone());
		}

		request =
			request.with_header("authorization", format!("Bearer {}", credential.expose()));

		if let Some(body) = body {
			request = request.with_body(body.clone());
		}

		match self.transport.execute(request).await {
			Ok(response) => Ok(response.body),
			Err(mut err) => {
				if let Some(snapshot) = err.request_snapshot_mut() {
					snapshot.redact_authorization();
				}

				Err(err)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl AuthenticatedRestClient<ReqwestRestTransport> {
	/// Creates a client backed by a default reqwest transport.
	pub fn new(
		resource_url: &str,
		options: RestClientOptions,
		token_provider: Arc<dyn TokenProvider>,
	) -> Result<Self> {
		Self::with_transport(resource_url, options, token_provider, ReqwestRestTransport::default())
	}
}
impl<T> RestResource for AuthenticatedRestClient<T>
where
	T: ?Sized + RestTransport,
{
	fn create<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::Create, Method::Post, params, Some(body)))
	}

	fn get<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::Get, Method::Get, params, None))
	}

	fn get_all<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::GetAll, Method::Get, params, None))
	}

	fn patch<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::Patch, Method::Patch, params, Some(body)))
	}

	fn put<'a>(&'a self, params: &'a RequestParams, body: &'a Value) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::Put, Method::Put, params, Some(body)))
	}

	fn delete<'a>(&'a self, params: &'a RequestParams) -> ResourceFuture<'a, Value> {
		Box::pin(self.dispatch(CallKind::Delete, Method::Delete, params, None))
	}
}
impl<T> Debug for AuthenticatedRestClient<T>
where
	T: ?Sized + RestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedRestClient")
			.field("template", &self.template.as_str())
			.field("headers", &self.headers)
			.finish()
	}
}

//! Identity-token verification for OAuth token exchanges.
//!
//! [`IdTokenVerifyingOAuthClient`] decorates a token-exchange resource: after
//! a successful exchange it verifies any returned identity token against the
//! configured algorithm allow-list, issuer, and audience, resolving asymmetric
//! signing keys through a [`SigningKeyResolver`] (by default a JWKS endpoint
//! under the provider domain). A documented escape hatch downgrades exactly
//! one failure class to a warning: a symmetric-algorithm token with no
//! configured client secret.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
#[cfg(feature = "reqwest")] use jsonwebtoken::jwk::JwkSet;
// self
use crate::{
	_prelude::*,
	encode::RequestParams,
	error::{ArgumentError, BoxError, VerificationError},
	obs::{self, CallKind, CallOutcome, CallSpan},
	rest::{ResourceFuture, RestResource},
};

/// Leeway applied to time-based claim checks, in seconds.
const CLOCK_LEEWAY_SECS: i64 = 60;

/// Boxed future returned by [`SigningKeyResolver::signing_key`].
pub type KeyFuture<'a> = Pin<Box<dyn Future<Output = Result<DecodingKey, BoxError>> + 'a + Send>>;

/// Resolves asymmetric signing keys by key id.
///
/// Implementations own whatever caching they need; the verifying client asks
/// for a key per verification and propagates failures as hard verification
/// errors.
pub trait SigningKeyResolver
where
	Self: Send + Sync,
{
	/// Resolves the verification key for `kid`.
	fn signing_key<'a>(&'a self, kid: &'a str) -> KeyFuture<'a>;
}

/// Token-exchange contract consumed by [`IdTokenVerifyingOAuthClient`].
///
/// Every [`RestResource`] satisfies it through its `create` operation, so the
/// verifying client stacks directly on top of the authenticated/retrying
/// clients.
pub trait TokenExchange
where
	Self: Send + Sync,
{
	/// Performs the exchange (HTTP POST to the token endpoint).
	fn exchange<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value>;
}
impl<R> TokenExchange for R
where
	R: ?Sized + RestResource,
{
	fn exchange<'a>(
		&'a self,
		params: &'a RequestParams,
		body: &'a Value,
	) -> ResourceFuture<'a, Value> {
		self.create(params, body)
	}
}

/// Static configuration for the verifying exchange client.
#[derive(Clone)]
pub struct ExchangeOptions {
	/// Provider domain, with or without a scheme (`https://` assumed when absent).
	pub domain: String,
	/// OAuth client identifier; checked against the token audience when set.
	pub client_id: Option<String>,
	/// Base64-encoded client secret for symmetric verification.
	pub client_secret: Option<String>,
	/// Algorithm allow-list applied to every identity token.
	pub supported_algorithms: Vec<Algorithm>,
	/// Disables identity-token verification entirely when set.
	pub bypass_id_token_validation: bool,
}
impl ExchangeOptions {
	/// Creates options for the given domain with defaults: both the symmetric
	/// and asymmetric algorithm families allowed, verification enabled.
	pub fn new(domain: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			client_id: None,
			client_secret: None,
			supported_algorithms: vec![Algorithm::HS256, Algorithm::RS256],
			bypass_id_token_validation: false,
		}
	}

	/// Sets the client identifier.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the base64-encoded client secret.
	pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Replaces the algorithm allow-list.
	pub fn with_supported_algorithms(mut self, algorithms: impl Into<Vec<Algorithm>>) -> Self {
		self.supported_algorithms = algorithms.into();

		self
	}

	/// Disables identity-token verification (deliberately weak validation).
	pub fn bypass_id_token_validation(mut self) -> Self {
		self.bypass_id_token_validation = true;

		self
	}

	fn base_url(&self) -> String {
		let trimmed = self.domain.trim_end_matches('/');

		if trimmed.contains("://") {
			trimmed.to_owned()
		} else {
			format!("https://{trimmed}")
		}
	}

	/// Returns the issuer value identity tokens must carry.
	pub fn issuer(&self) -> String {
		format!("{}/", self.base_url())
	}

	/// Returns the JWKS endpoint under the provider domain.
	pub fn jwks_url(&self) -> String {
		format!("{}/.well-known/jwks.json", self.base_url())
	}
}
impl Debug for ExchangeOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ExchangeOptions")
			.field("domain", &self.domain)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("supported_algorithms", &self.supported_algorithms)
			.field("bypass_id_token_validation", &self.bypass_id_token_validation)
			.finish()
	}
}

/// Decorates a token-exchange call with identity-token verification.
pub struct IdTokenVerifyingOAuthClient<E>
where
	E: ?Sized + TokenExchange,
{
	exchange: Arc<E>,
	options: ExchangeOptions,
	resolver: Arc<dyn SigningKeyResolver>,
}
impl<E> IdTokenVerifyingOAuthClient<E>
where
	E: ?Sized + TokenExchange,
{
	/// Creates a verifying client with a caller-provided key resolver.
	pub fn with_resolver(
		exchange: impl Into<Arc<E>>,
		options: ExchangeOptions,
		resolver: Arc<dyn SigningKeyResolver>,
	) -> Result<Self> {
		if options.domain.trim().is_empty() {
			return Err(ArgumentError::MissingDomain.into());
		}

		Ok(Self { exchange: exchange.into(), options, resolver })
	}

	/// Creates a verifying client with the default JWKS resolver pointed at
	/// `https://<domain>/.well-known/jwks.json`.
	#[cfg(feature = "reqwest")]
	pub fn new(exchange: impl Into<Arc<E>>, options: ExchangeOptions) -> Result<Self> {
		if options.domain.trim().is_empty() {
			return Err(ArgumentError::MissingDomain.into());
		}

		let jwks_url = Url::parse(&options.jwks_url())
			.map_err(|source| ArgumentError::InvalidResourceUrl { source })?;
		let resolver: Arc<dyn SigningKeyResolver> = Arc::new(JwksResolver::new(jwks_url));

		Self::with_resolver(exchange, options, resolver)
	}

	/// Returns the active options.
	pub fn options(&self) -> &ExchangeOptions {
		&self.options
	}

	/// Performs the exchange and verifies any returned identity token.
	///
	/// The response passes through unchanged when the bypass flag is set or no
	/// identity token is present. Any true verification failure rejects the
	/// call; the exchanged token is never returned unverified, with the single
	/// documented exception of a symmetric-algorithm token and no configured
	/// client secret, which is downgraded to a structured warning.
	pub async fn create(&self, params: &RequestParams, body: &Value) -> Result<Value> {
		const KIND: CallKind = CallKind::Exchange;

		let span = CallSpan::new(KIND, "create");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let response = self.exchange.exchange(params, body).await?;

				if self.options.bypass_id_token_validation {
					return Ok(response);
				}

				let Some(id_token) = response.get("id_token").and_then(Value::as_str) else {
					return Ok(response);
				};

				self.verify_id_token(id_token, body).await?;

				Ok(response)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	async fn verify_id_token(&self, token: &str, request_body: &Value) -> Result<()> {
		let header = decode_header(token).map_err(VerificationError::from)?;

		if !self.options.supported_algorithms.contains(&header.alg) {
			return Err(VerificationError::DisallowedAlgorithm {
				alg: format!("{:?}", header.alg),
			}
			.into());
		}

		let key = if is_symmetric(header.alg) {
			match &self.options.client_secret {
				Some(secret) => {
					let bytes = BASE64_STANDARD
						.decode(secret)
						.map_err(|source| VerificationError::InvalidClientSecret { source })?;

					DecodingKey::from_secret(&bytes)
				},
				None => {
					// Relaxed-validation escape hatch: warn and return the
					// response unverified rather than failing the call.
					obs::warn_verification_skipped("missing_client_secret");
					obs::record_verification_skipped("missing_client_secret");

					return Ok(());
				},
			}
		} else {
			let kid = header.kid.as_deref().ok_or(VerificationError::MissingKeyId)?;

			self.resolver
				.signing_key(kid)
				.await
				.map_err(|source| VerificationError::KeyResolution { kid: kid.into(), source })?
		};
		let mut validation = Validation::new(header.alg);

		validation.set_issuer(&[self.options.issuer()]);
		validation.leeway = CLOCK_LEEWAY_SECS as u64;

		if let Some(client_id) = &self.options.client_id {
			validation.set_audience(&[client_id]);
		} else {
			validation.validate_aud = false;
		}

		let data = decode::<serde_json::Map<String, Value>>(token, &key, &validation)
			.map_err(VerificationError::from)?;
		let expectations = ClaimExpectations::from_request(request_body);

		validate_claims(&data.claims, &expectations, self.options.client_id.as_deref())?;

		Ok(())
	}
}
impl<E> Debug for IdTokenVerifyingOAuthClient<E>
where
	E: ?Sized + TokenExchange,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdTokenVerifyingOAuthClient").field("options", &self.options).finish()
	}
}

fn is_symmetric(alg: Algorithm) -> bool {
	matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Per-request claim expectations extracted from the exchange request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClaimExpectations {
	/// Expected `nonce` claim value.
	pub nonce: Option<String>,
	/// Expected organization (`org_id` or `org_name` claim).
	pub organization: Option<String>,
	/// Maximum allowable age of the authentication, in seconds.
	pub max_age: Option<i64>,
}
impl ClaimExpectations {
	/// Reads `nonce`, `organization`, and `max_age` out of the request body.
	pub fn from_request(body: &Value) -> Self {
		Self {
			nonce: body.get("nonce").and_then(Value::as_str).map(str::to_owned),
			organization: body.get("organization").and_then(Value::as_str).map(str::to_owned),
			max_age: body.get("max_age").and_then(Value::as_i64),
		}
	}
}

/// Validates required claim presence and shape after the signature check.
///
/// Signature and issuer/audience/expiry verification happen first through the
/// JWT library; this validator covers the remaining local rules: `sub`/`iat`
/// presence, `azp` when the audience is an array, the per-request `nonce`,
/// organization membership, and `auth_time` freshness under `max_age`.
pub fn validate_claims(
	claims: &serde_json::Map<String, Value>,
	expectations: &ClaimExpectations,
	client_id: Option<&str>,
) -> Result<(), VerificationError> {
	if !claims.get("sub").map(Value::is_string).unwrap_or(false) {
		return Err(claim_error("sub", "missing or not a string"));
	}
	if !claims.get("iat").map(Value::is_number).unwrap_or(false) {
		return Err(claim_error("iat", "missing or not a number"));
	}

	if let Some(audiences) = claims.get("aud").and_then(Value::as_array)
		&& audiences.len() > 1
	{
		let azp = claims.get("azp").and_then(Value::as_str);

		match (azp, client_id) {
			(None, _) => return Err(claim_error("azp", "required when `aud` has multiple values")),
			(Some(azp), Some(client_id)) if azp != client_id =>
				return Err(claim_error("azp", "does not match the configured client id")),
			_ => {},
		}
	}

	if let Some(expected) = &expectations.nonce {
		let nonce = claims.get("nonce").and_then(Value::as_str);

		if nonce != Some(expected.as_str()) {
			return Err(claim_error("nonce", "missing or does not match the request"));
		}
	}

	if let Some(organization) = &expectations.organization {
		if organization.starts_with("org_") {
			// Organization ids are matched verbatim.
			if claims.get("org_id").and_then(Value::as_str) != Some(organization.as_str()) {
				return Err(claim_error("org_id", "missing or does not match the request"));
			}
		} else {
			let expected = organization.to_lowercase();

			if claims.get("org_name").and_then(Value::as_str) != Some(expected.as_str()) {
				return Err(claim_error("org_name", "missing or does not match the request"));
			}
		}
	}

	if let Some(max_age) = expectations.max_age {
		let Some(auth_time) = claims.get("auth_time").and_then(Value::as_i64) else {
			return Err(claim_error("auth_time", "required when `max_age` is requested"));
		};
		let now = OffsetDateTime::now_utc().unix_timestamp();

		if auth_time + max_age + CLOCK_LEEWAY_SECS < now {
			return Err(claim_error("auth_time", "authentication is older than `max_age`"));
		}
	}

	Ok(())
}

fn claim_error(claim: &'static str, reason: &str) -> VerificationError {
	VerificationError::Claim { claim, reason: reason.to_owned() }
}

/// Default [`SigningKeyResolver`] backed by a JWKS endpoint.
///
/// Keys are cached by `kid` for the resolver's lifetime; providers rotate key
/// ids rather than re-keying under the same id, so the cache never needs
/// invalidation during normal operation.
#[cfg(feature = "reqwest")]
pub struct JwksResolver {
	client: ReqwestClient,
	jwks_url: Url,
	cache: RwLock<HashMap<String, DecodingKey>>,
}
#[cfg(feature = "reqwest")]
impl JwksResolver {
	/// Creates a resolver with a default HTTP client.
	pub fn new(jwks_url: Url) -> Self {
		Self::with_client(jwks_url, ReqwestClient::default())
	}

	/// Creates a resolver that reuses the caller-provided HTTP client.
	pub fn with_client(jwks_url: Url, client: ReqwestClient) -> Self {
		Self { client, jwks_url, cache: RwLock::new(HashMap::new()) }
	}

	/// Returns the JWKS endpoint URL.
	pub fn jwks_url(&self) -> &Url {
		&self.jwks_url
	}
}
#[cfg(feature = "reqwest")]
impl SigningKeyResolver for JwksResolver {
	fn signing_key<'a>(&'a self, kid: &'a str) -> KeyFuture<'a> {
		Box::pin(async move {
			if let Some(key) = self.cache.read().get(kid) {
				return Ok(key.clone());
			}

			let response = self.client.get(self.jwks_url.clone()).send().await?;
			let status = response.status();

			if !status.is_success() {
				return Err(format!("JWKS endpoint returned status {status}").into());
			}

			let bytes = response.bytes().await?;
			let set: JwkSet = serde_json::from_slice(&bytes)?;
			let jwk = set
				.find(kid)
				.ok_or_else(|| format!("key set does not contain key `{kid}`"))?;
			let key = DecodingKey::from_jwk(jwk)?;

			self.cache.write().insert(kid.to_owned(), key.clone());

			Ok(key)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn claims(entries: &[(&str, Value)]) -> serde_json::Map<String, Value> {
		entries.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect()
	}

	fn base_claims() -> serde_json::Map<String, Value> {
		claims(&[("sub", Value::from("user-1")), ("iat", Value::from(1_700_000_000))])
	}

	#[test]
	fn required_claims_must_be_present_and_shaped() {
		let missing_sub = claims(&[("iat", Value::from(1))]);
		let missing_iat = claims(&[("sub", Value::from("user-1"))]);

		assert!(matches!(
			validate_claims(&missing_sub, &ClaimExpectations::default(), None),
			Err(VerificationError::Claim { claim: "sub", .. })
		));
		assert!(matches!(
			validate_claims(&missing_iat, &ClaimExpectations::default(), None),
			Err(VerificationError::Claim { claim: "iat", .. })
		));
		assert!(validate_claims(&base_claims(), &ClaimExpectations::default(), None).is_ok());
	}

	#[test]
	fn nonce_must_match_the_request() {
		let mut token_claims = base_claims();

		token_claims.insert("nonce".into(), Value::from("expected"));

		let matching =
			ClaimExpectations { nonce: Some("expected".into()), ..Default::default() };
		let mismatched =
			ClaimExpectations { nonce: Some("other".into()), ..Default::default() };

		assert!(validate_claims(&token_claims, &matching, None).is_ok());
		assert!(matches!(
			validate_claims(&token_claims, &mismatched, None),
			Err(VerificationError::Claim { claim: "nonce", .. })
		));
	}

	#[test]
	fn multiple_audiences_require_matching_azp() {
		let mut token_claims = base_claims();

		token_claims.insert("aud".into(), serde_json::json!(["client-a", "client-b"]));

		let err = validate_claims(&token_claims, &ClaimExpectations::default(), Some("client-a"))
			.expect_err("Missing azp should be rejected.");

		assert!(matches!(err, VerificationError::Claim { claim: "azp", .. }));

		token_claims.insert("azp".into(), Value::from("client-a"));

		assert!(
			validate_claims(&token_claims, &ClaimExpectations::default(), Some("client-a"))
				.is_ok()
		);

		token_claims.insert("azp".into(), Value::from("client-c"));

		assert!(matches!(
			validate_claims(&token_claims, &ClaimExpectations::default(), Some("client-a")),
			Err(VerificationError::Claim { claim: "azp", .. })
		));
	}

	#[test]
	fn organization_checks_id_or_name() {
		let mut token_claims = base_claims();

		token_claims.insert("org_id".into(), Value::from("org_AbC123"));
		token_claims.insert("org_name".into(), Value::from("acme"));

		let by_id = ClaimExpectations {
			organization: Some("org_AbC123".into()),
			..Default::default()
		};
		let by_name =
			ClaimExpectations { organization: Some("Acme".into()), ..Default::default() };
		let wrong_id = ClaimExpectations {
			organization: Some("org_Other".into()),
			..Default::default()
		};

		assert!(validate_claims(&token_claims, &by_id, None).is_ok());
		assert!(validate_claims(&token_claims, &by_name, None).is_ok());
		assert!(matches!(
			validate_claims(&token_claims, &wrong_id, None),
			Err(VerificationError::Claim { claim: "org_id", .. })
		));
	}

	#[test]
	fn max_age_requires_fresh_auth_time() {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let mut token_claims = base_claims();

		token_claims.insert("auth_time".into(), Value::from(now - 30));

		let fresh = ClaimExpectations { max_age: Some(120), ..Default::default() };

		assert!(validate_claims(&token_claims, &fresh, None).is_ok());

		token_claims.insert("auth_time".into(), Value::from(now - 1_000));

		let stale = ClaimExpectations { max_age: Some(120), ..Default::default() };

		assert!(matches!(
			validate_claims(&token_claims, &stale, None),
			Err(VerificationError::Claim { claim: "auth_time", .. })
		));

		let without_auth_time = base_claims();

		assert!(matches!(
			validate_claims(&without_auth_time, &stale, None),
			Err(VerificationError::Claim { claim: "auth_time", .. })
		));
	}

	#[test]
	fn expectations_read_from_the_request_body() {
		let body = serde_json::json!({
			"grant_type": "authorization_code",
			"nonce": "abc",
			"organization": "org_123",
			"max_age": 300,
		});
		let expectations = ClaimExpectations::from_request(&body);

		assert_eq!(expectations.nonce.as_deref(), Some("abc"));
		assert_eq!(expectations.organization.as_deref(), Some("org_123"));
		assert_eq!(expectations.max_age, Some(300));
		assert_eq!(ClaimExpectations::from_request(&Value::Null), ClaimExpectations::default());
	}

	#[test]
	fn options_debug_redacts_the_client_secret() {
		let options = ExchangeOptions::new("tenant.example.com")
			.with_client_id("client-1")
			.with_client_secret("c2VjcmV0");
		let rendered = format!("{options:?}");

		assert!(!rendered.contains("c2VjcmV0"));
		assert!(rendered.contains("client_secret_set: true"));
	}

	#[test]
	fn issuer_and_jwks_urls_derive_from_the_domain() {
		let bare = ExchangeOptions::new("tenant.example.com");
		let schemed = ExchangeOptions::new("http://127.0.0.1:8080/");

		assert_eq!(bare.issuer(), "https://tenant.example.com/");
		assert_eq!(bare.jwks_url(), "https://tenant.example.com/.well-known/jwks.json");
		assert_eq!(schemed.issuer(), "http://127.0.0.1:8080/");
		assert_eq!(schemed.jwks_url(), "http://127.0.0.1:8080/.well-known/jwks.json");
	}
}

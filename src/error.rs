//! Client-level error types shared across encoding, transport, retry, and verification.

// self
use crate::{_prelude::*, rest::RequestSnapshot};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by external collaborators (token providers, key resolvers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed construction input or call-entry validation failure.
	#[error(transparent)]
	Argument(#[from] ArgumentError),
	/// Credential acquisition failed; surfaced verbatim, no network call was attempted.
	#[error("{0}")]
	TokenProvider(#[source] BoxError),
	/// Network/HTTP-layer failure from the underlying call.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Identity-token signature or claims verification failed.
	#[error(transparent)]
	Verification(#[from] VerificationError),
}
impl Error {
	/// Wraps an arbitrary token-provider failure.
	pub fn token_provider(src: impl Into<BoxError>) -> Self {
		Self::TokenProvider(src.into())
	}

	/// Returns whether a bounded retry may succeed for this failure.
	///
	/// Only transport-layer failures are ever retryable; argument, token-provider,
	/// and verification failures are terminal by construction.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Transport(inner) => inner.is_retryable(),
			_ => false,
		}
	}

	/// Returns the upstream Retry-After hint, when one was captured.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transport(inner) => inner.retry_after(),
			_ => None,
		}
	}

	/// Mutable access to the captured outbound request, when the failure carries one.
	pub fn request_snapshot_mut(&mut self) -> Option<&mut RequestSnapshot> {
		match self {
			Self::Transport(inner) => inner.request_snapshot_mut(),
			_ => None,
		}
	}

	/// Read access to the captured outbound request, when the failure carries one.
	pub fn request_snapshot(&self) -> Option<&RequestSnapshot> {
		match self {
			Self::Transport(inner) => inner.request_snapshot(),
			_ => None,
		}
	}
}

/// Construction and call-entry validation failures.
#[derive(Debug, ThisError)]
pub enum ArgumentError {
	/// Resource URL was omitted or empty.
	#[error("Resource URL must be a non-empty string.")]
	MissingResourceUrl,
	/// Resource URL could not be parsed as an absolute URL.
	#[error("Resource URL is invalid.")]
	InvalidResourceUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// URL template contains an unusable placeholder.
	#[error("URL template `{template}` is malformed.")]
	MalformedTemplate {
		/// Offending template string.
		template: String,
	},
	/// A template placeholder has no value in the request params.
	#[error("Request params are missing a value for placeholder `{name}`.")]
	MissingParam {
		/// Placeholder name without the leading colon.
		name: String,
	},
	/// Retry budget falls outside the supported range.
	#[error("Retry budget must be within 0..=10, got {value}.")]
	RetryBudgetOutOfRange {
		/// Rejected budget value.
		value: u32,
	},
	/// Token-exchange options are missing the provider domain.
	#[error("Token-exchange options require a non-empty domain.")]
	MissingDomain,
}

/// Transport-level failures (network, HTTP status, body decoding).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Endpoint answered with a non-success status code.
	#[error("Endpoint returned status {status}: {message}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Provider-supplied message summarizing the failure.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Snapshot of the outbound request that triggered the failure.
		request: RequestSnapshot,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
		/// Snapshot of the outbound request that triggered the failure.
		request: RequestSnapshot,
	},
	/// Endpoint responded with malformed JSON that could not be parsed.
	#[error("Endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error together with the request snapshot.
	pub fn network(
		src: impl 'static + Send + Sync + std::error::Error,
		request: RequestSnapshot,
	) -> Self {
		Self::Network { source: Box::new(src), request }
	}

	/// Returns whether this failure class is transient.
	///
	/// 5xx and rate-limit statuses, connectivity failures, and malformed bodies are
	/// treated as transient; remaining 4xx statuses are terminal.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Status { status, .. } => *status >= 500 || *status == 429,
			Self::Network { .. } | Self::ResponseParse { .. } | Self::Io(_) => true,
		}
	}

	/// Returns the upstream Retry-After hint, when one was captured.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Status { retry_after, .. } => *retry_after,
			_ => None,
		}
	}

	/// Mutable access to the captured outbound request, when present.
	pub fn request_snapshot_mut(&mut self) -> Option<&mut RequestSnapshot> {
		match self {
			Self::Status { request, .. } | Self::Network { request, .. } => Some(request),
			_ => None,
		}
	}

	/// Read access to the captured outbound request, when present.
	pub fn request_snapshot(&self) -> Option<&RequestSnapshot> {
		match self {
			Self::Status { request, .. } | Self::Network { request, .. } => Some(request),
			_ => None,
		}
	}
}

/// Identity-token verification failures; never retried.
#[derive(Debug, ThisError)]
pub enum VerificationError {
	/// Token header advertises an algorithm outside the configured allow-list.
	#[error("Identity token uses disallowed algorithm `{alg}`.")]
	DisallowedAlgorithm {
		/// Advertised algorithm label.
		alg: String,
	},
	/// Token header omits the key id needed for asymmetric key resolution.
	#[error("Identity token header is missing a key id.")]
	MissingKeyId,
	/// Signing key could not be resolved from the key set.
	#[error("Signing key `{kid}` could not be resolved.")]
	KeyResolution {
		/// Requested key id.
		kid: String,
		/// Underlying resolver failure.
		#[source]
		source: BoxError,
	},
	/// Configured client secret is not valid base64.
	#[error("Client secret is not valid base64.")]
	InvalidClientSecret {
		/// Underlying decoding failure.
		#[source]
		source: base64::DecodeError,
	},
	/// Signature or standard claim validation failed.
	#[error("Identity token signature or standard claims are invalid.")]
	Jwt(#[from] jsonwebtoken::errors::Error),
	/// Local claims validation failed after the signature check passed.
	#[error("Identity token claim `{claim}` is invalid: {reason}.")]
	Claim {
		/// Name of the offending claim.
		claim: &'static str,
		/// Human-readable reason.
		reason: String,
	},
}

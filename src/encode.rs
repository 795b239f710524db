//! Request target encoding for templated resource URLs.
//!
//! A [`UrlTemplate`] holds a resource URL containing zero or more `:name`
//! placeholders. At call time, [`UrlTemplate::encode`] substitutes each
//! placeholder from the supplied [`RequestParams`] using a strict
//! percent-encoding set (so `/`, `|`, and every other reserved character is
//! escaped inside a path segment), while leftover params are appended as query
//! pairs with the URL library's default form encoding.

// crates.io
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
// self
use crate::{_prelude::*, error::ArgumentError};

/// Strict encoding set for identifier substitutions: everything outside the
/// RFC 3986 unreserved characters is escaped.
const STRICT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
	Literal(String),
	Placeholder(String),
}

/// Immutable parse of a resource URL containing `:name` placeholders.
#[derive(Clone, Debug)]
pub struct UrlTemplate {
	raw: String,
	segments: Vec<Segment>,
}
impl UrlTemplate {
	/// Parses and validates a template string.
	///
	/// The template must be non-empty and every placeholder segment must carry a
	/// usable name (`[A-Za-z0-9_]+` after the colon). A template without any
	/// placeholder is valid and encodes to itself.
	pub fn parse(raw: impl Into<String>) -> Result<Self, ArgumentError> {
		let raw = raw.into();

		if raw.trim().is_empty() {
			return Err(ArgumentError::MissingResourceUrl);
		}

		let mut segments = Vec::new();

		for part in raw.split('/') {
			if let Some(name) = part.strip_prefix(':') {
				if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
					return Err(ArgumentError::MalformedTemplate { template: raw });
				}

				segments.push(Segment::Placeholder(name.to_owned()));
			} else {
				segments.push(Segment::Literal(part.to_owned()));
			}
		}

		Ok(Self { raw, segments })
	}

	/// Returns the original template string.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// Iterates over the placeholder names in template order.
	pub fn placeholders(&self) -> impl Iterator<Item = &str> {
		self.segments.iter().filter_map(|segment| match segment {
			Segment::Placeholder(name) => Some(name.as_str()),
			Segment::Literal(_) => None,
		})
	}

	/// Builds the concrete request URL for the given params.
	///
	/// Placeholder values are strict-encoded into the path; every param that did
	/// not feed a placeholder becomes a query pair with default encoding. Fails
	/// with [`ArgumentError::MissingParam`] when a placeholder has no value and
	/// [`ArgumentError::InvalidResourceUrl`] when the substituted target is not
	/// an absolute URL.
	pub fn encode(&self, params: &RequestParams) -> Result<Url, ArgumentError> {
		let mut target = String::with_capacity(self.raw.len());
		let mut consumed = Vec::new();

		for (idx, segment) in self.segments.iter().enumerate() {
			if idx > 0 {
				target.push('/');
			}

			match segment {
				Segment::Literal(part) => target.push_str(part),
				Segment::Placeholder(name) => {
					let value = params
						.get(name)
						.ok_or_else(|| ArgumentError::MissingParam { name: name.clone() })?;

					target.extend(utf8_percent_encode(value, STRICT));
					consumed.push(name.as_str());
				},
			}
		}

		let mut url = Url::parse(&target)
			.map_err(|source| ArgumentError::InvalidResourceUrl { source })?;
		let extras: Vec<_> =
			params.iter().filter(|(key, _)| !consumed.contains(&key.as_str())).collect();

		if !extras.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in extras {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}
}

/// Placeholder values plus arbitrary extra keys treated as query parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams(BTreeMap<String, String>);
impl RequestParams {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a parameter, replacing any previous value for the key.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.insert(key.into(), value.into());
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);

		self
	}

	/// Looks up a parameter value.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Iterates over all parameters in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
		self.0.iter()
	}

	/// Returns whether no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<K, V> FromIterator<(K, V)> for RequestParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

//! Proxy-level error types shared across the token manager, proxy routes, and refresher.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Cache failures never appear here; [`crate::cache::ResourceCache`] absorbs them.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while talking to the upstream.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The authorization endpoint rejected the credentials or returned an unusable response.
	#[error(transparent)]
	AuthGrant(#[from] AuthGrantError),
	/// A proxied resource fetch returned a non-success status.
	#[error(transparent)]
	UpstreamFetch(#[from] UpstreamFetchError),

	/// Style or source JSON lacks an entry the proxy needs to discover.
	#[error("Upstream manifest is malformed: {reason}.")]
	MalformedManifest {
		/// Human-readable description of the missing or invalid entry.
		reason: String,
	},
}
impl Error {
	/// Upstream HTTP status carried by the error, when one exists.
	pub fn upstream_status(&self) -> Option<u16> {
		match self {
			Self::AuthGrant(AuthGrantError::Rejected { status, .. }) => Some(*status),
			Self::UpstreamFetch(err) => Some(err.status),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Proxy configuration failed validation.
	#[error(transparent)]
	Proxy(#[from] crate::config::ProxyConfigError),
	/// An upstream URL could not be assembled from the configured root.
	#[error("Upstream URL `{url}` is invalid.")]
	InvalidUpstreamUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Token grant failures, shared by the server-side grant and the client-side token fetch.
#[derive(Debug, ThisError)]
pub enum AuthGrantError {
	/// Token endpoint answered with a non-success status.
	#[error("Token request failed ({status} {status_text}).")]
	Rejected {
		/// HTTP status code returned by the endpoint.
		status: u16,
		/// Canonical reason phrase for the status.
		status_text: String,
	},
	/// Token endpoint responded with JSON lacking the required fields.
	#[error("Token endpoint returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access_token.")]
	MissingAccessToken,
	/// The `expires_in` field is not a usable number of seconds.
	#[error("Token endpoint returned an invalid expires_in value `{value}`.")]
	InvalidLifetime {
		/// Raw value received from the endpoint.
		value: String,
	},
}
impl AuthGrantError {
	/// Builds a [`AuthGrantError::Rejected`] from a status code.
	pub fn rejected(status: reqwest::StatusCode) -> Self {
		Self::Rejected {
			status: status.as_u16(),
			status_text: status.canonical_reason().unwrap_or("Unknown Status").into(),
		}
	}
}

/// Non-success response from a proxied upstream resource.
#[derive(Debug, ThisError)]
#[error("Upstream request for {resource} failed: {status} {reason}.")]
pub struct UpstreamFetchError {
	/// HTTP status code returned by the upstream.
	pub status: u16,
	/// Canonical reason phrase for the status.
	pub reason: String,
	/// Path of the upstream resource, without query parameters.
	pub resource: String,
}
impl UpstreamFetchError {
	/// Builds an error for the given upstream URL and status.
	pub fn new(url: &Url, status: reqwest::StatusCode) -> Self {
		Self {
			status: status.as_u16(),
			reason: status.canonical_reason().unwrap_or("Unknown Status").into(),
			resource: url.path().into(),
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the upstream.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the upstream.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<ReqwestError> for Error {
	fn from(e: ReqwestError) -> Self {
		if e.is_builder() {
			ConfigError::http_client_build(e).into()
		} else {
			TransportError::from(e).into()
		}
	}
}

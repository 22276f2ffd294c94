//! Validated proxy configuration and its builder.
//!
//! [`ProxyConfig`] captures everything the access layer needs from its host application: the API
//! credentials, the upstream authorization and vector-tile endpoints, the local mount points,
//! and the cache lifetime. Endpoints must use HTTPS unless they point at a loopback host, which
//! keeps local fakes usable in tests.

// self
use crate::{_prelude::*, auth::ApiCredentials};

/// Errors raised while constructing or validating a [`ProxyConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProxyConfigError {
	/// API key or secret is blank.
	#[error("API key and secret must both be provided.")]
	MissingCredentials,
	/// Authorization endpoint is mandatory.
	#[error("Missing authorization endpoint.")]
	MissingAuthUrl,
	/// Vector source root is mandatory.
	#[error("Missing vector source root URL.")]
	MissingVectorRoot,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint URL cannot carry path segments (e.g. `data:` URLs).
	#[error("The {endpoint} endpoint cannot be used as a base URL: {url}.")]
	OpaqueEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Local mount path contains characters that cannot appear in a route.
	#[error("Local path `{path}` is invalid.")]
	InvalidLocalPath {
		/// Offending path.
		path: String,
	},
	/// Cache lifetime must be positive.
	#[error("Cache TTL must be positive.")]
	NonPositiveCacheTtl,
	/// Spatial reference system identifier must be non-empty and alphanumeric.
	#[error("Spatial reference `{srs}` is invalid.")]
	InvalidSrs {
		/// Offending value.
		srs: String,
	},
}

/// Immutable proxy configuration consumed by [`crate::proxy::ProxyState`].
#[derive(Clone, Debug)]
pub struct ProxyConfig {
	/// API key/secret used for the client-credentials grant.
	pub credentials: ApiCredentials,
	/// Upstream OAuth2 token endpoint.
	pub auth_url: Url,
	/// Upstream vector-tile service root, always ending in `/vts` and without a trailing slash.
	pub vector_root: Url,
	/// Local mount point for the resource routes, e.g. `/os-map/vector`.
	pub base_path: String,
	/// Local path of the browser token route.
	pub token_path: String,
	/// Lifetime of cached resources, also advertised via `Cache-Control`.
	pub cache_ttl: Duration,
	/// Spatial reference used when the caller does not pass `srs`.
	pub default_srs: String,
}
impl ProxyConfig {
	/// Default local mount point.
	pub const DEFAULT_BASE_PATH: &'static str = "/os-map/vector";
	/// Default browser token route.
	pub const DEFAULT_TOKEN_PATH: &'static str = "/map/token";
	/// Default cache lifetime.
	pub const DEFAULT_CACHE_TTL: Duration = Duration::seconds(600);
	/// Default spatial reference (Web Mercator).
	pub const DEFAULT_SRS: &'static str = "3857";

	/// Creates a new builder for the provided credentials.
	pub fn builder(credentials: ApiCredentials) -> ProxyConfigBuilder {
		ProxyConfigBuilder::new(credentials)
	}

	/// Local URL prefix that rewritten manifests point at.
	pub fn local_prefix(&self) -> &str {
		&self.base_path
	}
}

/// Builder for [`ProxyConfig`] values.
#[derive(Debug)]
pub struct ProxyConfigBuilder {
	/// API credentials.
	pub credentials: ApiCredentials,
	/// Upstream token endpoint.
	pub auth_url: Option<Url>,
	/// Upstream vector-tile service root.
	pub vector_root: Option<Url>,
	/// Local mount point.
	pub base_path: String,
	/// Browser token route.
	pub token_path: String,
	/// Cache lifetime.
	pub cache_ttl: Duration,
	/// Default spatial reference.
	pub default_srs: String,
}
impl ProxyConfigBuilder {
	/// Creates a new builder seeded with the provided credentials and defaults.
	pub fn new(credentials: ApiCredentials) -> Self {
		Self {
			credentials,
			auth_url: None,
			vector_root: None,
			base_path: ProxyConfig::DEFAULT_BASE_PATH.into(),
			token_path: ProxyConfig::DEFAULT_TOKEN_PATH.into(),
			cache_ttl: ProxyConfig::DEFAULT_CACHE_TTL,
			default_srs: ProxyConfig::DEFAULT_SRS.into(),
		}
	}

	/// Sets the upstream token endpoint.
	pub fn auth_url(mut self, url: Url) -> Self {
		self.auth_url = Some(url);

		self
	}

	/// Sets the upstream vector-tile root; `/vts` is appended when missing.
	pub fn vector_root(mut self, url: Url) -> Self {
		self.vector_root = Some(url);

		self
	}

	/// Overrides the local mount point.
	pub fn base_path(mut self, path: impl Into<String>) -> Self {
		self.base_path = path.into();

		self
	}

	/// Overrides the browser token route.
	pub fn token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	/// Overrides the cache lifetime.
	pub fn cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Overrides the default spatial reference.
	pub fn default_srs(mut self, srs: impl Into<String>) -> Self {
		self.default_srs = srs.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ProxyConfig, ProxyConfigError> {
		if self.credentials.is_blank() {
			return Err(ProxyConfigError::MissingCredentials);
		}

		let auth_url = self.auth_url.ok_or(ProxyConfigError::MissingAuthUrl)?;
		let vector_root = self.vector_root.ok_or(ProxyConfigError::MissingVectorRoot)?;

		validate_endpoint("authorization", &auth_url)?;
		validate_endpoint("vector root", &vector_root)?;

		if !self.cache_ttl.is_positive() {
			return Err(ProxyConfigError::NonPositiveCacheTtl);
		}
		if self.default_srs.is_empty()
			|| !self.default_srs.chars().all(|c| c.is_ascii_alphanumeric())
		{
			return Err(ProxyConfigError::InvalidSrs { srs: self.default_srs });
		}

		let token_path = normalize_local_path(&self.token_path)?;

		if token_path.is_empty() {
			return Err(ProxyConfigError::InvalidLocalPath { path: self.token_path });
		}

		Ok(ProxyConfig {
			credentials: self.credentials,
			auth_url,
			vector_root: normalize_vector_root(vector_root),
			base_path: normalize_local_path(&self.base_path)?,
			token_path,
			cache_ttl: self.cache_ttl,
			default_srs: self.default_srs,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProxyConfigError> {
	if url.cannot_be_a_base() {
		return Err(ProxyConfigError::OpaqueEndpoint { endpoint: name, url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProxyConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn normalize_vector_root(mut url: Url) -> Url {
	let path = url.path().trim_end_matches('/').to_owned();
	let path = if path.ends_with("/vts") { path } else { format!("{path}/vts") };

	url.set_path(&path);
	url.set_query(None);
	url.set_fragment(None);

	url
}

fn normalize_local_path(raw: &str) -> Result<String, ProxyConfigError> {
	let trimmed = raw.trim().trim_matches('/');

	if trimmed.is_empty() {
		return Ok(String::new());
	}
	if trimmed.split('/').any(|segment| {
		segment.is_empty()
			|| segment.starts_with(':')
			|| segment.starts_with('*')
			|| segment.chars().any(|c| c.is_whitespace() || matches!(c, '?' | '#' | '{' | '}'))
	}) {
		return Err(ProxyConfigError::InvalidLocalPath { path: raw.into() });
	}

	Ok(format!("/{trimmed}"))
}

//! Upstream HTTP transport shared by the token manager, proxy routes, and client refresher.
//!
//! [`ReqwestHttpClient`] is the crate's only dependency on an HTTP client stack. It keeps the
//! three request shapes the access layer needs in one place: the client-credentials grant,
//! bearer-authenticated resource fetches, and the unauthenticated client token fetch.

// std
use std::ops::Deref;
// crates.io
use reqwest::{
	Response,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	auth::{ApiCredentials, TokenSecret},
	error::{ConfigError, TransportError},
};

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token requests should not follow redirects; configure any custom [`ReqwestClient`]
/// accordingly before wrapping it.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the provided per-request timeout.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// POSTs `grant_type=client_credentials` with HTTP Basic client authentication.
	pub async fn client_credentials_grant(
		&self,
		auth_url: &Url,
		credentials: &ApiCredentials,
	) -> Result<Response, TransportError> {
		let response = self
			.0
			.post(auth_url.clone())
			.basic_auth(credentials.key(), Some(credentials.expose_secret()))
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body("grant_type=client_credentials")
			.send()
			.await?;

		Ok(response)
	}

	/// GETs an upstream resource with `Authorization: Bearer <token>`.
	pub async fn get_with_bearer(
		&self,
		url: &Url,
		token: &TokenSecret,
	) -> Result<Response, TransportError> {
		let response =
			self.0.get(url.clone()).header(AUTHORIZATION, token.bearer_header()).send().await?;

		Ok(response)
	}

	/// GETs a URL without credentials.
	pub async fn get(&self, url: &Url) -> Result<Response, TransportError> {
		let response = self.0.get(url.clone()).header(ACCEPT, "application/json").send().await?;

		Ok(response)
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

/// Reads the full body of a response, mapping read failures into transport errors.
pub(crate) async fn read_body(response: Response) -> Result<Vec<u8>, TransportError> {
	Ok(response.bytes().await?.to_vec())
}

/// Returns the response's `Content-Type`, if it is present and valid UTF-8.
pub(crate) fn content_type(response: &Response) -> Option<String> {
	response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.filter(|value| !value.trim().is_empty())
		.map(ToOwned::to_owned)
}

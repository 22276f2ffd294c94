//! Where the client-side refresher gets its tokens from.

// self
use crate::{
	_prelude::*,
	auth::{TokenResponse, TokenSecret},
	error::AuthGrantError,
	http::{self, ReqwestHttpClient},
};

/// Boxed future returned by [`TokenSource::request_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<ClientToken>> + 'a + Send>>;

/// Token handed to the browser-side consumer together with its stated lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientToken {
	/// Bearer token value.
	pub token: TokenSecret,
	/// Lifetime stated by the token endpoint.
	pub expires_in: Duration,
}
impl Debug for ClientToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientToken")
			.field("token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Asynchronous supplier of fresh client tokens.
pub trait TokenSource
where
	Self: 'static + Send + Sync,
{
	/// Requests a new token.
	fn request_token(&self) -> TokenFuture<'_>;
}

/// [`TokenSource`] backed by an HTTP token route such as the proxy's `/map/token`.
#[derive(Clone, Debug)]
pub struct HttpTokenSource {
	http_client: ReqwestHttpClient,
	url: Url,
}
impl HttpTokenSource {
	/// Creates a source that GETs `url` with the provided client.
	pub fn new(http_client: ReqwestHttpClient, url: Url) -> Self {
		Self { http_client, url }
	}

	/// Token route URL.
	pub fn url(&self) -> &Url {
		&self.url
	}
}
impl TokenSource for HttpTokenSource {
	fn request_token(&self) -> TokenFuture<'_> {
		Box::pin(fetch_access_token(&self.http_client, &self.url))
	}
}

/// Fetches a token from an unauthenticated token route.
///
/// The route must answer 2xx with an `access_token` and a numeric `expires_in` (a JSON number
/// or a numeric string).
pub async fn fetch_access_token(http_client: &ReqwestHttpClient, url: &Url) -> Result<ClientToken> {
	let response = http_client.get(url).await?;
	let status = response.status();

	if !status.is_success() {
		return Err(AuthGrantError::rejected(status).into());
	}

	let body = http::read_body(response).await?;
	let parsed = TokenResponse::from_slice(&body)?;
	let expires_in = parsed.lifetime()?;

	Ok(ClientToken { token: TokenSecret::new(parsed.access_token), expires_in })
}

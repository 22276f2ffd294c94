//! Generic cached fetch for binary upstream resources plus the plain upstream GET used by the
//! manifest routes.

// crates.io
use axum::{
	http::{
		StatusCode,
		header::{CACHE_CONTROL, CONTENT_TYPE, ETAG},
	},
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	cache::ETag,
	error::UpstreamFetchError,
	http,
	obs::{self, Operation, Outcome},
	proxy::{ProxyState, guess_content_type},
};

/// Binary resource families served through the cache; the label prefixes cache keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
	/// Vector tile.
	Tile,
	/// Font glyph range, sprite sheet, or other style resource.
	Asset,
}
impl ResourceKind {
	/// Stable label used as the cache key prefix.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Tile => "tile",
			Self::Asset => "asset",
		}
	}

	/// Cache key for an upstream URL: `"{kind}:{url}"`.
	pub fn cache_key(self, upstream: &Url) -> String {
		format!("{}:{upstream}", self.as_str())
	}

	const fn operation(self) -> Operation {
		match self {
			Self::Tile => Operation::Tile,
			Self::Asset => Operation::Asset,
		}
	}
}

/// Raw upstream reply for manifest fetches, where failures may be forwarded verbatim.
#[derive(Debug)]
pub(crate) enum UpstreamReply {
	Success(Vec<u8>),
	Failure { status: StatusCode, content_type: Option<String>, body: Vec<u8> },
}
impl UpstreamReply {
	/// Converts a failure into a [`UpstreamFetchError`] for `url`, or yields the body.
	pub(crate) fn into_body(self, url: &Url) -> Result<Vec<u8>> {
		match self {
			Self::Success(body) => Ok(body),
			Self::Failure { status, .. } => Err(UpstreamFetchError::new(url, status).into()),
		}
	}
}

impl ProxyState {
	/// Serves a binary upstream resource through the cache.
	///
	/// A cached payload whose [`ETag`] matches `if_none_match` yields `304` with no body; any
	/// other hit is served with an extension-derived `Content-Type`. Misses fetch the resource
	/// with the bearer token, store the bytes, and reply with the upstream `Content-Type`.
	/// Non-success upstream statuses fail with [`UpstreamFetchError`].
	pub async fn cached_fetch(
		&self,
		kind: ResourceKind,
		upstream: &Url,
		if_none_match: Option<&str>,
	) -> Result<Response> {
		let op = kind.operation();
		let cache = self.cache();
		let key = kind.cache_key(upstream);
		let cache_control = format!("public, max-age={}", cache.ttl_seconds());

		if let Some(payload) = cache.get(&key).await {
			let etag = ETag::of(&payload);

			if if_none_match.is_some_and(|candidate| etag.matches(candidate)) {
				tracing::debug!(resource = upstream.path(), "cache hit, not modified");
				obs::record_outcome(op, Outcome::NotModified);

				return Ok((
					StatusCode::NOT_MODIFIED,
					[(ETAG, etag.header_value()), (CACHE_CONTROL, cache_control)],
				)
					.into_response());
			}

			tracing::debug!(resource = upstream.path(), "cache hit");
			obs::record_outcome(op, Outcome::CacheHit);

			return Ok(binary_response(
				guess_content_type(upstream).to_owned(),
				&etag,
				cache_control,
				payload,
			));
		}

		tracing::debug!(resource = upstream.path(), "cache miss");
		obs::record_outcome(op, Outcome::CacheMiss);

		let token = self.tokens().access_token().await?;
		let response = self.http_client().get_with_bearer(upstream, &token).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(UpstreamFetchError::new(upstream, status).into());
		}

		let content_type =
			http::content_type(&response).unwrap_or_else(|| guess_content_type(upstream).into());
		let payload = http::read_body(response).await?;
		let etag = ETag::of(&payload);

		cache.set(&key, &payload).await;

		Ok(binary_response(content_type, &etag, cache_control, payload))
	}

	pub(crate) async fn fetch_upstream(
		&self,
		url: &Url,
		token: &TokenSecret,
	) -> Result<UpstreamReply> {
		let response = self.http_client().get_with_bearer(url, token).await?;
		let status = response.status();

		if status.is_success() {
			return Ok(UpstreamReply::Success(http::read_body(response).await?));
		}

		let content_type = http::content_type(&response);
		let body = http::read_body(response).await?;

		Ok(UpstreamReply::Failure { status, content_type, body })
	}
}

fn binary_response(
	content_type: String,
	etag: &ETag,
	cache_control: String,
	payload: Vec<u8>,
) -> Response {
	(
		StatusCode::OK,
		[(CONTENT_TYPE, content_type), (ETAG, etag.header_value()), (CACHE_CONTROL, cache_control)],
		payload,
	)
		.into_response()
}

//! Axum handlers for the proxy routes.

// crates.io
use axum::{
	Json,
	extract::{Path, Query, RawQuery, State},
	http::{
		HeaderMap, StatusCode,
		header::{CACHE_CONTROL, CONTENT_TYPE, IF_NONE_MATCH},
	},
	response::{IntoResponse, Response},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	manifest,
	obs::{self, OpSpan, Operation, Outcome},
	proxy::{ProxyState, ResourceKind, fetch::UpstreamReply},
};

/// Query parameters accepted by the tile route.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TileQuery {
	/// Spatial reference system; the configured default applies when absent.
	pub srs: Option<String>,
}

/// Body returned by the browser token route.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserToken {
	/// Bearer token for direct upstream raster requests.
	pub access_token: String,
	/// Seconds until the token expires.
	pub expires_in: i64,
}

/// `GET {base}/style`: fetches the upstream style and rewrites its URLs to local routes.
pub async fn style(State(state): State<ProxyState>) -> Response {
	observe(Operation::Style, "style", async move {
		let url = state.style_url()?;
		let token = state.tokens().access_token().await?;
		let body = state.fetch_upstream(&url, &token).await?.into_body(&url)?;
		let style = parse_manifest(&body)?;

		Ok(Json(state.rewriter().rewrite_style(&style)).into_response())
	})
	.await
}

/// `GET {base}/source`: discovers the vector source through the style, fetches it, and
/// rewrites its tile templates. Upstream failures are forwarded with their status and body.
pub async fn source(State(state): State<ProxyState>) -> Response {
	observe(Operation::Source, "source", async move {
		let token = state.tokens().access_token().await?;
		let style_url = state.style_url()?;
		let style = match state.fetch_upstream(&style_url, &token).await? {
			UpstreamReply::Success(body) => parse_manifest(&body)?,
			UpstreamReply::Failure { status, content_type, body } =>
				return Ok(forward_failure("style", status, content_type, body)),
		};
		let source_url = manifest::first_source_url(&style)?;

		tracing::debug!(source = source_url.path(), "fetching vector source");

		let source = match state.fetch_upstream(&source_url, &token).await? {
			UpstreamReply::Success(body) => parse_manifest(&body)?,
			UpstreamReply::Failure { status, content_type, body } =>
				return Ok(forward_failure("source", status, content_type, body)),
		};

		Ok(Json(state.rewriter().rewrite_source(&source)).into_response())
	})
	.await
}

/// `GET {base}/tiles/:z/:x/:y.pbf[?srs=]`: serves a vector tile through the cache.
pub async fn tile(
	State(state): State<ProxyState>,
	Path((z, x, y)): Path<(String, String, String)>,
	Query(query): Query<TileQuery>,
	headers: HeaderMap,
) -> Response {
	let Some((z, x, y)) = tile_coordinates(&z, &x, &y) else {
		return StatusCode::NOT_FOUND.into_response();
	};

	observe(Operation::Tile, "tile", async move {
		let upstream = state.tile_url(z, x, y, query.srs.as_deref())?;

		state.cached_fetch(ResourceKind::Tile, &upstream, if_none_match(&headers)).await
	})
	.await
}

/// `GET {base}/assets/*path`: serves fonts, sprites, and other style resources through the
/// cache.
pub async fn asset(
	State(state): State<ProxyState>,
	Path(path): Path<String>,
	RawQuery(query): RawQuery,
	headers: HeaderMap,
) -> Response {
	let path = path.trim_start_matches('/').to_owned();

	if !is_resource_path(&path) {
		return StatusCode::NOT_FOUND.into_response();
	}

	observe(Operation::Asset, "asset", async move {
		let upstream = state.asset_url(&path, query.as_deref())?;

		state.cached_fetch(ResourceKind::Asset, &upstream, if_none_match(&headers)).await
	})
	.await
}

/// `GET {token_path}`: hands the cached server token to browser-side raster layers.
pub async fn token(State(state): State<ProxyState>) -> Response {
	observe(Operation::TokenRoute, "token", async move {
		let token = state.tokens().token().await?;
		let remaining = token.remaining_at(state.tokens().clock().now());
		let body = BrowserToken {
			access_token: token.access_token.expose().to_owned(),
			expires_in: remaining.whole_seconds(),
		};

		Ok(([(CACHE_CONTROL, "no-store")], Json(body)).into_response())
	})
	.await
}

async fn observe<Fut>(op: Operation, stage: &'static str, fut: Fut) -> Response
where
	Fut: Future<Output = Result<Response>>,
{
	obs::record_outcome(op, Outcome::Attempt);

	match OpSpan::new(op, stage).instrument(fut).await {
		Ok(response) => {
			obs::record_outcome(op, Outcome::Success);

			response
		},
		Err(err) => {
			tracing::error!(op = op.as_str(), error = %err, "proxy request failed");
			obs::record_outcome(op, Outcome::Failure);

			err.into_response()
		},
	}
}

fn forward_failure(
	resource: &'static str,
	status: StatusCode,
	content_type: Option<String>,
	body: Vec<u8>,
) -> Response {
	tracing::error!(
		resource,
		status = status.as_u16(),
		body = %String::from_utf8_lossy(&body),
		"upstream manifest request failed, forwarding"
	);

	match content_type {
		Some(content_type) => (status, [(CONTENT_TYPE, content_type)], body).into_response(),
		None => (status, body).into_response(),
	}
}

fn parse_manifest(body: &[u8]) -> Result<Value> {
	serde_json::from_slice(body).map_err(|e| Error::MalformedManifest {
		reason: format!("upstream returned invalid JSON ({e})"),
	})
}

fn if_none_match(headers: &HeaderMap) -> Option<&str> {
	headers.get(IF_NONE_MATCH).and_then(|value| value.to_str().ok())
}

fn tile_coordinates(z: &str, x: &str, y: &str) -> Option<(u32, u32, u32)> {
	Some((decimal(z)?, decimal(x)?, decimal(y.strip_suffix(".pbf")?)?))
}

fn decimal(raw: &str) -> Option<u32> {
	if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	raw.parse().ok()
}

fn is_resource_path(path: &str) -> bool {
	!path.is_empty()
		&& path.split('/').all(|segment| !matches!(segment, "" | "." | ".."))
}

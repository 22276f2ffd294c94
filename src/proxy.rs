//! Resource proxy: axum routes that fetch upstream map resources with the server-side token.
//!
//! The browser only ever talks to these routes. Each one obtains a bearer token from the shared
//! [`TokenManager`], fetches the upstream resource, and either rewrites it (style and source
//! manifests) or serves it through the [`ResourceCache`] (tiles and assets).
//!
//! | Route | Upstream |
//! |---|---|
//! | `{base}/style` | `{root}/resources/styles?srs=<default>` |
//! | `{base}/source` | first source URL listed in the style |
//! | `{base}/tiles/:z/:x/:y.pbf` | `{root}/tile/{z}/{x}/{y}.pbf?srs=<srs>` |
//! | `{base}/assets/*path` | `{root}/resources/{path}` |
//! | `{token_path}` | cached server token, for browser-side raster layers |

pub mod content_type;
pub mod fetch;
pub mod response;
pub mod routes;

pub use content_type::guess_content_type;
pub use fetch::ResourceKind;

// crates.io
use axum::{Router, routing::get};
// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	cache::ResourceCache,
	clock::{Clock, SystemClock},
	config::ProxyConfig,
	error::ConfigError,
	http::ReqwestHttpClient,
	manifest::UrlRewriter,
};

/// Shared state handed to every proxy route; cheap to clone.
#[derive(Clone, Debug)]
pub struct ProxyState(Arc<ProxyInner>);
#[derive(Debug)]
struct ProxyInner {
	config: ProxyConfig,
	tokens: TokenManager,
	cache: ResourceCache,
	http_client: ReqwestHttpClient,
	rewriter: UrlRewriter,
}
impl ProxyState {
	/// Creates proxy state using the system clock.
	pub fn new(config: ProxyConfig, cache: ResourceCache, http_client: ReqwestHttpClient) -> Self {
		Self::with_clock(config, cache, http_client, Arc::new(SystemClock))
	}

	/// Creates proxy state whose token manager judges freshness against `clock`.
	pub fn with_clock(
		config: ProxyConfig,
		cache: ResourceCache,
		http_client: ReqwestHttpClient,
		clock: Arc<dyn Clock>,
	) -> Self {
		let tokens = TokenManager::from_config(&config, http_client.clone()).with_clock(clock);
		let rewriter = UrlRewriter::new(&config.vector_root, config.local_prefix());

		Self(Arc::new(ProxyInner { config, tokens, cache, http_client, rewriter }))
	}

	/// Validated configuration.
	pub fn config(&self) -> &ProxyConfig {
		&self.0.config
	}

	/// Token manager shared by all routes.
	pub fn tokens(&self) -> &TokenManager {
		&self.0.tokens
	}

	/// Resource cache used by the tile and asset routes.
	pub fn cache(&self) -> &ResourceCache {
		&self.0.cache
	}

	/// Manifest rewriter bound to the configured upstream root and local prefix.
	pub fn rewriter(&self) -> &UrlRewriter {
		&self.0.rewriter
	}

	pub(crate) fn http_client(&self) -> &ReqwestHttpClient {
		&self.0.http_client
	}

	/// Upstream style manifest URL.
	pub fn style_url(&self) -> Result<Url> {
		let mut url = self.upstream_url(["resources", "styles"])?;

		url.query_pairs_mut().append_pair("srs", &self.0.config.default_srs);

		Ok(url)
	}

	/// Upstream tile URL; `srs` falls back to the configured default when absent or empty.
	pub fn tile_url(&self, z: u32, x: u32, y: u32, srs: Option<&str>) -> Result<Url> {
		let (z, x, y) = (z.to_string(), x.to_string(), format!("{y}.pbf"));
		let mut url = self.upstream_url(["tile", z.as_str(), x.as_str(), y.as_str()])?;
		let srs = srs.filter(|srs| !srs.is_empty()).unwrap_or(&self.0.config.default_srs);

		url.query_pairs_mut().append_pair("srs", srs);

		Ok(url)
	}

	/// Upstream resource URL for a slash-separated asset path, keeping the caller's raw query.
	pub fn asset_url(&self, path: &str, query: Option<&str>) -> Result<Url> {
		let mut url =
			self.upstream_url(std::iter::once("resources").chain(path.split('/')))?;

		url.set_query(query.filter(|query| !query.is_empty()));

		Ok(url)
	}

	fn upstream_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
		let root = &self.0.config.vector_root;
		let mut upstream = root.clone();

		upstream
			.path_segments_mut()
			.map_err(|_| ConfigError::InvalidUpstreamUrl {
				url: root.to_string(),
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.extend(segments);

		Ok(upstream)
	}
}

/// Builds the axum router serving every proxy route under the configured mount points.
pub fn router(state: ProxyState) -> Router {
	let base = state.config().base_path.clone();
	let token_path = state.config().token_path.clone();

	Router::new()
		.route(&format!("{base}/style"), get(routes::style))
		.route(&format!("{base}/source"), get(routes::source))
		.route(&format!("{base}/tiles/:z/:x/:y"), get(routes::tile))
		.route(&format!("{base}/assets/*path"), get(routes::asset))
		.route(&token_path, get(routes::token))
		.with_state(state)
}

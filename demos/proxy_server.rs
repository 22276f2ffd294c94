//! Runs the map proxy against a mocked upstream and fetches a rewritten style, a tile, and the
//! browser token through it.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use tracing_subscriber::EnvFilter;
use url::Url;
// self
use os_maps_proxy::{
	auth::ApiCredentials,
	cache::{MemoryStore, ResourceCache},
	config::ProxyConfig,
	http::ReqwestHttpClient,
	proxy::{self, ProxyState},
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
		.init();

	let upstream = MockServer::start_async().await;
	let vts = upstream.url("/maps/vector/v1/vts");

	upstream
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"demo-token\",\"expires_in\":\"299\"}");
		})
		.await;
	upstream
		.mock_async(|when, then| {
			when.method(GET).path("/maps/vector/v1/vts/resources/styles");
			then.status(200).json_body(serde_json::json!({
				"version": 8,
				"sources": { "esri": { "type": "vector", "url": format!("{vts}?srs=3857") } },
				"sprite": format!("{vts}/resources/sprites/sprite"),
				"glyphs": format!("{vts}/resources/fonts/{{fontstack}}/{{range}}.pbf"),
				"layers": []
			}));
		})
		.await;
	upstream
		.mock_async(|when, then| {
			when.method(GET).path("/maps/vector/v1/vts/tile/7/63/42.pbf");
			then.status(200).header("content-type", "application/x-protobuf").body([0x1a, 0x00]);
		})
		.await;

	let config = ProxyConfig::builder(ApiCredentials::new("demo-key", "demo-secret"))
		.auth_url(Url::parse(&upstream.url("/oauth2/token/v1"))?)
		.vector_root(Url::parse(&vts)?)
		.build()?;
	let cache = ResourceCache::new(Arc::new(MemoryStore::default()), config.cache_ttl);
	let http_client = ReqwestHttpClient::with_timeout(std::time::Duration::from_secs(10))?;
	let state = ProxyState::new(config, cache, http_client);
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
	let address = listener.local_addr()?;

	tokio::spawn(async move { axum::serve(listener, proxy::router(state)).await });

	let browser = Client::new();
	let style = browser.get(format!("http://{address}/os-map/vector/style")).send().await?;

	println!("Rewritten style: {}", style.text().await?);

	for attempt in 1..=2 {
		let tile =
			browser.get(format!("http://{address}/os-map/vector/tiles/7/63/42.pbf")).send().await?;

		println!(
			"Tile attempt {attempt}: {} (etag {:?})",
			tile.status(),
			tile.headers().get("etag")
		);
	}

	let token = browser.get(format!("http://{address}/map/token")).send().await?;

	println!("Browser token payload: {}", token.text().await?);

	Ok(())
}

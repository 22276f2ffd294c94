//! Keeps a browser-side token fresh by polling a mocked token route with the refresh scheduler.

// std
use std::time::Duration as StdDuration;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;
// self
use os_maps_proxy::{
	http::ReqwestHttpClient,
	refresh::{HttpTokenSource, RefreshScheduler, fetch_access_token},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
		.init();

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/map/token");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"browser-token\",\"expires_in\":30}");
		})
		.await;
	let http_client = ReqwestHttpClient::default();
	let url = Url::parse(&server.url("/map/token"))?;
	let initial = fetch_access_token(&http_client, &url).await?;

	println!("Initial token lifetime: {}s.", initial.expires_in.whole_seconds());

	// Lifetimes under a minute refresh after the 10s floor.
	let handle = RefreshScheduler::new(
		HttpTokenSource::new(http_client, url),
		initial.expires_in,
		|token| println!("Received refreshed token ({} bytes).", token.expose().len()),
	)
	.with_check_interval(Duration::seconds(5))
	.start();

	tokio::time::sleep(StdDuration::from_secs(12)).await;
	handle.cancel();

	// One initial fetch plus one scheduled refresh.
	token_mock.assert_calls_async(2).await;

	Ok(())
}

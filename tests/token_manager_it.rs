// crates.io
use httpmock::prelude::*;
use time::macros;
// self
use os_maps_proxy::{
	_preludet::*,
	auth::{ApiCredentials, TokenManager},
	clock::ManualClock,
	error::AuthGrantError,
	http::ReqwestHttpClient,
};

fn build_manager(server: &MockServer, clock: &ManualClock) -> TokenManager {
	let auth_url = Url::parse(&server.url("/oauth2/token/v1"))
		.expect("Mock authorization endpoint should parse successfully.");

	TokenManager::new(
		auth_url,
		ApiCredentials::new(TEST_API_KEY, TEST_API_SECRET),
		ReqwestHttpClient::default(),
	)
	.with_clock(Arc::new(clock.clone()))
}

fn start_clock() -> ManualClock {
	ManualClock::new(macros::datetime!(2025-03-01 09:00 UTC))
}

#[tokio::test]
async fn caches_token_until_one_minute_before_expiry() {
	let server = MockServer::start_async().await;
	let clock = start_clock();
	let manager = build_manager(&server, &clock);
	let mut first = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/token/v1")
				.header("authorization", TEST_BASIC_AUTH)
				.header("content-type", "application/x-www-form-urlencoded")
				.body("grant_type=client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T1\",\"expires_in\":\"3600\",\"token_type\":\"Bearer\"}");
		})
		.await;
	let token = manager.access_token().await.expect("Initial grant should succeed.");

	assert_eq!(token.expose(), "T1");

	clock.advance(Duration::milliseconds(1_000));

	let token = manager.access_token().await.expect("Cached token should be returned.");

	assert_eq!(token.expose(), "T1");

	first.assert_calls_async(1).await;
	first.delete_async().await;

	let second = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"T2\",\"expires_in\":3600}");
		})
		.await;

	clock.advance(Duration::milliseconds(3_540_000 - 1_000 - 1));

	let token = manager.access_token().await.expect("Token should still be fresh.");

	assert_eq!(token.expose(), "T1");

	clock.advance(Duration::milliseconds(1));

	let token = manager.access_token().await.expect("Stale token should be replaced.");

	assert_eq!(token.expose(), "T2");

	second.assert_calls_async(1).await;

	assert_eq!(manager.metrics().attempts(), 2);
	assert_eq!(manager.metrics().successes(), 2);
	assert_eq!(
		manager.current_token().expect("A token should be cached.").issued_at,
		macros::datetime!(2025-03-01 09:59 UTC)
	);
}

#[tokio::test]
async fn concurrent_stale_callers_share_one_grant() {
	let server = MockServer::start_async().await;
	let clock = start_clock();
	let manager = build_manager(&server, &clock);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"shared\",\"expires_in\":900}");
		})
		.await;
	let (first, second, third) =
		tokio::join!(manager.access_token(), manager.access_token(), manager.access_token());

	for token in [first, second, third] {
		assert_eq!(token.expect("Concurrent calls should succeed.").expose(), "shared");
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_grant_carries_status() {
	let server = MockServer::start_async().await;
	let clock = start_clock();
	let manager = build_manager(&server, &clock);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(401)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_client\"}");
		})
		.await;
	let err = manager.access_token().await.expect_err("Rejected grants should surface.");

	assert!(matches!(
		err,
		Error::AuthGrant(AuthGrantError::Rejected { status: 401, ref status_text })
			if status_text == "Unauthorized"
	));
	assert_eq!(err.to_string(), "Token request failed (401 Unauthorized).");
	assert!(manager.current_token().is_none());
	assert_eq!(manager.metrics().failures(), 1);

	mock.assert_async().await;
}

#[tokio::test]
async fn malformed_grant_response_is_reported() {
	let server = MockServer::start_async().await;
	let clock = start_clock();
	let manager = build_manager(&server, &clock);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(200).header("content-type", "application/json").body("{\"token\":\"x\"}");
		})
		.await;
	let err = manager.access_token().await.expect_err("Malformed responses should surface.");

	assert!(matches!(err, Error::AuthGrant(AuthGrantError::MalformedResponse { .. })));

	mock.assert_async().await;
}

#[tokio::test]
async fn oversized_grant_lifetime_is_rejected() {
	let server = MockServer::start_async().await;
	let clock = start_clock();
	let manager = build_manager(&server, &clock);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token/v1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"forever\",\"expires_in\":1000000000000}");
		})
		.await;
	let err = manager.access_token().await.expect_err("Unbounded lifetimes should be refused.");

	assert!(matches!(err, Error::AuthGrant(AuthGrantError::InvalidLifetime { .. })));
	assert!(manager.current_token().is_none());

	mock.assert_async().await;
}

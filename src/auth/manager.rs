//! Client-credentials token lifecycle with expiry-aware caching + singleflight guard.
//!
//! [`TokenManager`] owns the single cached token for the upstream account. Callers ask for an
//! access token and the manager either hands back the cached one or, once it is within a minute
//! of expiry, performs a `grant_type=client_credentials` exchange. A singleflight guard makes
//! concurrent stale callers piggy-back on one in-flight exchange instead of stampeding the
//! authorization endpoint.

mod metrics;

pub use metrics::GrantMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ApiCredentials, CachedToken, TokenResponse, TokenSecret},
	clock::{Clock, SystemClock},
	config::ProxyConfig,
	error::AuthGrantError,
	http::{self, ReqwestHttpClient},
	obs::{self, OpSpan, Operation, Outcome},
};

/// Acquires and caches the upstream bearer token.
pub struct TokenManager {
	http_client: ReqwestHttpClient,
	auth_url: Url,
	credentials: ApiCredentials,
	clock: Arc<dyn Clock>,
	// At most one live token; replaced wholesale on refresh.
	current: RwLock<Option<Arc<CachedToken>>>,
	grant_guard: AsyncMutex<()>,
	metrics: GrantMetrics,
}
impl TokenManager {
	/// Creates a manager for the given authorization endpoint and credentials.
	pub fn new(
		auth_url: Url,
		credentials: ApiCredentials,
		http_client: ReqwestHttpClient,
	) -> Self {
		Self {
			http_client,
			auth_url,
			credentials,
			clock: Arc::new(SystemClock),
			current: RwLock::new(None),
			grant_guard: AsyncMutex::new(()),
			metrics: GrantMetrics::default(),
		}
	}

	/// Creates a manager from a validated proxy configuration.
	pub fn from_config(config: &ProxyConfig, http_client: ReqwestHttpClient) -> Self {
		Self::new(config.auth_url.clone(), config.credentials.clone(), http_client)
	}

	/// Replaces the clock used for freshness checks and issued-at stamps.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns a usable access token, performing a grant exchange when the cached one is stale.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		Ok(self.token().await?.access_token.clone())
	}

	/// Returns the full cached token, refreshing it first when stale.
	pub async fn token(&self) -> Result<Arc<CachedToken>> {
		if let Some(token) = self.fresh_token(self.clock.now()) {
			return Ok(token);
		}

		let _singleflight = self.grant_guard.lock().await;

		// Another caller may have finished an exchange while this one waited.
		if let Some(token) = self.fresh_token(self.clock.now()) {
			return Ok(token);
		}

		let token = Arc::new(self.exchange().await?);

		*self.current.write() = Some(token.clone());

		Ok(token)
	}

	/// Snapshot of the cached token without triggering a refresh.
	pub fn current_token(&self) -> Option<Arc<CachedToken>> {
		self.current.read().clone()
	}

	/// Grant exchange counters.
	pub fn metrics(&self) -> &GrantMetrics {
		&self.metrics
	}

	/// Clock used by the manager.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	fn fresh_token(&self, now: OffsetDateTime) -> Option<Arc<CachedToken>> {
		self.current.read().as_ref().filter(|token| !token.is_expired_at(now)).cloned()
	}

	async fn exchange(&self) -> Result<CachedToken> {
		const OP: Operation = Operation::TokenGrant;

		let span = OpSpan::new(OP, "client_credentials");

		obs::record_outcome(OP, Outcome::Attempt);
		self.metrics.record(Outcome::Attempt);

		let result = span
			.instrument(async {
				let response = self
					.http_client
					.client_credentials_grant(&self.auth_url, &self.credentials)
					.await?;
				let status = response.status();

				if !status.is_success() {
					tracing::error!(status = status.as_u16(), "token grant rejected");

					return Err(AuthGrantError::rejected(status).into());
				}

				let body = http::read_body(response).await?;
				let parsed = TokenResponse::from_slice(&body)?;
				let token = CachedToken::from_response(parsed, self.clock.now())?;

				tracing::debug!(expires_in = token.expires_in.whole_seconds(), "token granted");

				Ok(token)
			})
			.await;
		let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };

		self.metrics.record(outcome);
		obs::record_outcome(OP, outcome);

		result
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("auth_url", &self.auth_url.as_str())
			.field("credentials", &self.credentials)
			.field("has_token", &self.current.read().is_some())
			.finish()
	}
}

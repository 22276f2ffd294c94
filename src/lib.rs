//! Ordnance Survey access layer: client-credentials token caching, a caching map resource proxy
//! that hides upstream credentials from browsers, and a drift-aware client token refresher.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod manifest;
pub mod obs;
pub mod proxy;
pub mod refresh;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::ApiCredentials,
		cache::{MemoryStore, ResourceCache},
		clock::{Clock, ManualClock},
		config::ProxyConfig,
		http::ReqwestHttpClient,
		proxy::ProxyState,
	};

	/// API key used by test fixtures.
	pub const TEST_API_KEY: &str = "test-key";
	/// API secret used by test fixtures.
	pub const TEST_API_SECRET: &str = "test-secret";
	/// `Authorization` header the fake upstream expects for [`TEST_API_KEY`]/[`TEST_API_SECRET`].
	pub const TEST_BASIC_AUTH: &str = "Basic dGVzdC1rZXk6dGVzdC1zZWNyZXQ=";

	/// Builds a proxy configuration whose upstream endpoints live on the provided mock base URL.
	pub fn test_config(upstream_base: &str) -> ProxyConfig {
		let base = upstream_base.trim_end_matches('/');

		ProxyConfig::builder(ApiCredentials::new(TEST_API_KEY, TEST_API_SECRET))
			.auth_url(
				Url::parse(&format!("{base}/oauth2/token/v1"))
					.expect("Mock authorization URL should parse."),
			)
			.vector_root(
				Url::parse(&format!("{base}/maps/vector/v1/vts"))
					.expect("Mock vector root URL should parse."),
			)
			.build()
			.expect("Test proxy configuration should build.")
	}

	/// Builds proxy state backed by an in-memory cache and the provided manual clock.
	pub fn build_test_state(
		upstream_base: &str,
		clock: ManualClock,
	) -> (ProxyState, Arc<MemoryStore>) {
		let clock: Arc<dyn Clock> = Arc::new(clock);
		let store = Arc::new(MemoryStore::with_clock(clock.clone()));
		let cache = ResourceCache::new(store.clone(), Duration::seconds(600));
		let state = ProxyState::with_clock(
			test_config(upstream_base),
			cache,
			ReqwestHttpClient::default(),
			clock,
		);

		(state, store)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use axum;
pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _, tracing_subscriber as _};

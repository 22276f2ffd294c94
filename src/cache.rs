//! Optional shared cache for upstream map resources (tiles, glyphs, sprites).
//!
//! [`ResourceCache`] sits in front of an injectable text [`KeyValueStore`]. Payloads are stored
//! base64-encoded with the cache TTL as the store-side expiry. The cache is strictly best
//! effort: a missing store makes every lookup a miss and every write a no-op, and store
//! failures are logged and absorbed so a request never fails because of the cache.

pub mod etag;
pub mod memory;

pub use etag::ETag;
pub use memory::MemoryStore;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// Boxed future returned by [`KeyValueStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Text key-value backend with per-entry expiry (Redis-style `SET key value EX ttl`).
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Fetches the value for `key`, if present and unexpired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores `value` under `key`, expiring it after `ttl`.
	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// Backend could not be reached (connection refused, timeout, ...).
	#[error("Cache backend unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Best-effort binary cache keyed by upstream URL.
#[derive(Clone)]
pub struct ResourceCache {
	store: Option<Arc<dyn KeyValueStore>>,
	ttl: Duration,
}
impl ResourceCache {
	/// Creates a cache backed by `store`, expiring entries after `ttl`.
	pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
		Self { store: Some(store), ttl }
	}

	/// Creates a cache with no backing store; lookups always miss and writes are dropped.
	pub fn disabled(ttl: Duration) -> Self {
		Self { store: None, ttl }
	}

	/// Returns `true` when a backing store is configured.
	pub fn is_enabled(&self) -> bool {
		self.store.is_some()
	}

	/// Entry lifetime.
	pub fn ttl(&self) -> Duration {
		self.ttl
	}

	/// Entry lifetime in whole seconds, as advertised in `Cache-Control: max-age`.
	pub fn ttl_seconds(&self) -> u64 {
		u64::try_from(self.ttl.whole_seconds()).unwrap_or(0)
	}

	/// Looks up a cached payload. Store failures and undecodable values count as misses.
	pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
		let store = self.store.as_ref()?;
		let encoded = match store.get(key).await {
			Ok(value) => value?,
			Err(err) => {
				tracing::warn!(error = %err, key, "cache lookup failed, treating as miss");

				return None;
			},
		};

		match STANDARD.decode(encoded.as_bytes()) {
			Ok(payload) => Some(payload),
			Err(err) => {
				tracing::warn!(error = %err, key, "cached value is not valid base64, ignoring");

				None
			},
		}
	}

	/// Stores a payload. Store failures are logged and skipped.
	pub async fn set(&self, key: &str, payload: &[u8]) {
		let Some(store) = self.store.as_ref() else {
			return;
		};

		if let Err(err) = store.set(key, STANDARD.encode(payload), self.ttl).await {
			tracing::warn!(error = %err, key, "cache write failed, skipping");
		}
	}
}
impl Debug for ResourceCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResourceCache")
			.field("enabled", &self.is_enabled())
			.field("ttl", &self.ttl)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct BrokenStore;
	impl KeyValueStore for BrokenStore {
		fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async { Err(StoreError::Unavailable { message: "connection refused".into() }) })
		}

		fn set<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> StoreFuture<'a, ()> {
			Box::pin(async { Err(StoreError::Backend { message: "read only replica".into() }) })
		}
	}

	#[tokio::test]
	async fn round_trips_binary_payloads() {
		let cache = ResourceCache::new(Arc::new(MemoryStore::default()), Duration::seconds(60));
		let payload = [0_u8, 159, 146, 150, 255, 10];

		cache.set("tile:https://example.com/1/2/3.pbf", &payload).await;

		assert_eq!(
			cache.get("tile:https://example.com/1/2/3.pbf").await.as_deref(),
			Some(&payload[..])
		);
		assert_eq!(cache.get("tile:https://example.com/unset.pbf").await, None);
	}

	#[tokio::test]
	async fn disabled_cache_is_a_noop() {
		let cache = ResourceCache::disabled(Duration::seconds(600));

		cache.set("asset:key", b"payload").await;

		assert!(!cache.is_enabled());
		assert_eq!(cache.get("asset:key").await, None);
		assert_eq!(cache.ttl_seconds(), 600);
	}

	#[tokio::test]
	async fn store_failures_are_swallowed() {
		let cache = ResourceCache::new(Arc::new(BrokenStore), Duration::seconds(60));

		cache.set("asset:key", b"payload").await;

		assert_eq!(cache.get("asset:key").await, None);
	}

	#[tokio::test]
	async fn undecodable_values_are_misses() {
		let store = Arc::new(MemoryStore::default());

		store
			.set("asset:key", "%%% not base64 %%%".into(), Duration::seconds(60))
			.await
			.expect("Memory store writes should succeed.");

		let cache = ResourceCache::new(store, Duration::seconds(60));

		assert_eq!(cache.get("asset:key").await, None);
	}
}

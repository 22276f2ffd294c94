//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	cache::{KeyValueStore, StoreError, StoreFuture},
	clock::{Clock, SystemClock},
};

/// Stored entry count above which a write first drops expired entries.
pub const SWEEP_THRESHOLD: usize = 256;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	written_at: OffsetDateTime,
	ttl: Duration,
}
impl Entry {
	fn is_live_at(&self, now: OffsetDateTime) -> bool {
		now - self.written_at < self.ttl
	}
}

#[derive(Debug)]
struct Entries {
	map: HashMap<String, Entry>,
	// Stored count that triggers the next sweep; at least twice the live count after a sweep.
	sweep_at: usize,
}
impl Entries {
	fn sweep(&mut self, now: OffsetDateTime) {
		self.map.retain(|_, entry| entry.is_live_at(now));
		self.sweep_at = (self.map.len() * 2).max(SWEEP_THRESHOLD);
	}
}
impl Default for Entries {
	fn default() -> Self {
		Self { map: HashMap::new(), sweep_at: SWEEP_THRESHOLD }
	}
}

/// Storage backend that keeps entries in-process.
///
/// Expired entries are never returned. They are dropped when read, and writes sweep them out
/// in bulk once the store grows past a threshold that doubles with the live set.
#[derive(Clone)]
pub struct MemoryStore {
	entries: Arc<RwLock<Entries>>,
	clock: Arc<dyn Clock>,
}
impl MemoryStore {
	/// Creates an empty store that judges expiry against `clock`.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: Default::default(), clock }
	}

	/// Number of live entries.
	pub fn len(&self) -> usize {
		let now = self.clock.now();

		self.entries.read().map.values().filter(|entry| entry.is_live_at(now)).count()
	}

	/// Returns `true` when no live entries remain.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns `true` when `key` holds a live entry.
	pub fn contains_key(&self, key: &str) -> bool {
		let now = self.clock.now();

		self.entries.read().map.get(key).is_some_and(|entry| entry.is_live_at(now))
	}

	fn get_now(&self, key: &str) -> Option<String> {
		let now = self.clock.now();
		let mut entries = self.entries.write();

		match entries.map.get(key) {
			Some(entry) if entry.is_live_at(now) => Some(entry.value.clone()),
			Some(_) => {
				entries.map.remove(key);

				None
			},
			None => None,
		}
	}

	fn set_now(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
		if !ttl.is_positive() {
			return Err(StoreError::Backend { message: format!("invalid expiry {ttl} for {key}") });
		}

		let now = self.clock.now();
		let mut entries = self.entries.write();

		entries.map.insert(key.to_owned(), Entry { value, written_at: now, ttl });

		if entries.map.len() > entries.sweep_at {
			entries.sweep(now);
		}

		Ok(())
	}

	#[cfg(test)]
	fn stored(&self) -> usize {
		self.entries.read().map.len()
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}
}
impl Debug for MemoryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore").field("entries", &self.entries.read().map.len()).finish()
	}
}
impl KeyValueStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.get_now(key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.set_now(key, value, ttl) })
	}
}

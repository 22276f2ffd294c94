//! Counters for client-credentials grant exchanges.
//!
//! With single-flight enabled every counted attempt is a real POST to the token endpoint, so
//! `attempts` is also the number of grants the upstream has seen from this process.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::Outcome;

/// Grant exchange counters owned by a [`TokenManager`](crate::auth::TokenManager).
#[derive(Debug, Default)]
pub struct GrantMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
}
impl GrantMetrics {
	/// Grant requests sent.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Grants that produced a cached token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Grants rejected upstream, malformed, or lost in transport.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Grants started but not yet settled; at most one while single-flight holds.
	pub fn in_flight(&self) -> u64 {
		let settled = self.successes() + self.failures();

		self.attempts().saturating_sub(settled)
	}

	pub(crate) fn record(&self, outcome: Outcome) {
		let counter = match outcome {
			Outcome::Attempt => &self.attempts,
			Outcome::Success => &self.successes,
			Outcome::Failure => &self.failures,
			_ => return,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

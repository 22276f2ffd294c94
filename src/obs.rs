//! Observability helpers for proxy operations.
//!
//! Every operation runs inside a `tracing` span named `os_maps_proxy.op` carrying the `op` and
//! `stage` fields. Enable the `metrics` feature to increment the `os_maps_proxy_op_total` counter,
//! labeled by `op` + `outcome`.

mod metrics;
mod span;

pub use metrics::*;
pub use span::*;

// self
use crate::_prelude::*;

/// Operations observed by the access layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Client-credentials grant exchange.
	TokenGrant,
	/// Style manifest route.
	Style,
	/// Vector source manifest route.
	Source,
	/// Vector tile route.
	Tile,
	/// Font/sprite asset route.
	Asset,
	/// Browser token route.
	TokenRoute,
	/// Client-side scheduled refresh.
	ClientRefresh,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::TokenGrant => "token_grant",
			Operation::Style => "style",
			Operation::Source => "source",
			Operation::Tile => "tile",
			Operation::Asset => "asset",
			Operation::TokenRoute => "token_route",
			Operation::ClientRefresh => "client_refresh",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Resource served from the cache.
	CacheHit,
	/// Resource missing from the cache (or no cache configured).
	CacheMiss,
	/// Conditional request answered with 304.
	NotModified,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
			Outcome::CacheHit => "cache_hit",
			Outcome::CacheMiss => "cache_miss",
			Outcome::NotModified => "not_modified",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

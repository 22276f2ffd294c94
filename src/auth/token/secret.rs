//! Bearer token values that stay out of logs.
//!
//! Both the server-side grant and the browser-facing token route hand tokens around as
//! [`TokenSecret`]. Formatting one prints `<redacted>`; the raw value is only reachable through
//! [`TokenSecret::expose`] or as a ready-made `Authorization` header.

// self
use crate::_prelude::*;

/// Opaque bearer token issued by the OS token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value, for handing to the browser or a test assertion.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Bearer <token>`, as sent upstream on tile and asset fetches.
	pub fn bearer_header(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

//! API key/secret pair used for the client-credentials grant.

// self
use crate::_prelude::*;

/// API key and secret issued by the upstream; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
	key: String,
	secret: String,
}
impl ApiCredentials {
	/// Creates a credential pair.
	pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { key: key.into(), secret: secret.into() }
	}

	/// Returns the API key.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Returns the API secret. Callers must avoid logging this string.
	pub fn expose_secret(&self) -> &str {
		&self.secret
	}

	/// Returns `true` when either half of the pair is blank.
	pub fn is_blank(&self) -> bool {
		self.key.trim().is_empty() || self.secret.trim().is_empty()
	}
}
impl Debug for ApiCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiCredentials")
			.field("key", &self.key)
			.field("secret", &"<redacted>")
			.finish()
	}
}

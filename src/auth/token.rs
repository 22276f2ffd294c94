//! Immutable cached token model and token-endpoint response parsing.

pub mod secret;

// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthGrantError};

/// Longest lifetime accepted from a token endpoint.
pub const MAX_LIFETIME: Duration = Duration::days(365);

/// Bearer token obtained from a client-credentials grant.
///
/// A token is replaced, never mutated, once [`CachedToken::is_expired_at`] reports it stale.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the endpoint (usually `Bearer`).
	pub token_type: String,
	/// Lifetime stated by the endpoint.
	pub expires_in: Duration,
	/// Instant the grant response was received.
	pub issued_at: OffsetDateTime,
}
impl CachedToken {
	/// Tokens are treated as stale this long before their stated expiry.
	pub const STALE_WINDOW: Duration = Duration::seconds(60);

	/// Builds a token from a parsed endpoint response stamped with `issued_at`.
	pub fn from_response(
		response: TokenResponse,
		issued_at: OffsetDateTime,
	) -> Result<Self, AuthGrantError> {
		let expires_in = response.lifetime()?;

		Ok(Self {
			access_token: TokenSecret::new(response.access_token),
			token_type: response.token_type.unwrap_or_else(|| "Bearer".into()),
			expires_in,
			issued_at,
		})
	}

	/// Instant at which the endpoint says the token stops working.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.issued_at.saturating_add(self.expires_in)
	}

	/// Instant from which the token must be replaced.
	pub fn stale_at(&self) -> OffsetDateTime {
		self.expires_at().saturating_sub(Self::STALE_WINDOW)
	}

	/// Returns `true` once the token is within [`Self::STALE_WINDOW`] of expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.stale_at()
	}

	/// Lifetime left at `now`, clamped at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at() - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("issued_at", &self.issued_at)
			.finish()
	}
}

/// Token endpoint payload shared by the grant exchange and the client token fetch.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Access token value.
	pub access_token: String,
	/// Optional token type.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Lifetime in seconds, as a JSON number or numeric string.
	pub expires_in: RawLifetime,
}
impl TokenResponse {
	/// Parses a token endpoint body, reporting the path of the offending field on failure.
	pub fn from_slice(body: &[u8]) -> Result<Self, AuthGrantError> {
		let deserializer = &mut serde_json::Deserializer::from_slice(body);
		let response: Self = serde_path_to_error::deserialize(deserializer)
			.map_err(|source| AuthGrantError::MalformedResponse { source })?;

		if response.access_token.is_empty() {
			return Err(AuthGrantError::MissingAccessToken);
		}

		Ok(response)
	}

	/// Validated lifetime.
	pub fn lifetime(&self) -> Result<Duration, AuthGrantError> {
		self.expires_in.to_duration()
	}
}

/// Raw `expires_in` value; the upstream sends strings while other endpoints send numbers.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawLifetime {
	/// JSON number.
	Number(serde_json::Number),
	/// Numeric string.
	Text(String),
}
impl RawLifetime {
	/// Converts the raw value into whole seconds.
	///
	/// Negative and non-numeric input is rejected, as is anything above [`MAX_LIFETIME`].
	pub fn to_duration(&self) -> Result<Duration, AuthGrantError> {
		let seconds = match self {
			Self::Number(number) => number
				.as_i64()
				.or_else(|| number.as_f64().filter(|value| value.is_finite()).map(|v| v as i64)),
			Self::Text(text) => {
				let text = text.trim();

				text.parse::<i64>().ok().or_else(|| {
					text.parse::<f64>().ok().filter(|value| value.is_finite()).map(|v| v as i64)
				})
			},
		};

		match seconds {
			Some(seconds) if (0..=MAX_LIFETIME.whole_seconds()).contains(&seconds) =>
				Ok(Duration::seconds(seconds)),
			_ => Err(AuthGrantError::InvalidLifetime { value: self.to_string() }),
		}
	}
}
impl Display for RawLifetime {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Number(number) => write!(f, "{number}"),
			Self::Text(text) => f.write_str(text),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn token(issued_at: OffsetDateTime, expires_in: i64) -> CachedToken {
		CachedToken {
			access_token: TokenSecret::new("access"),
			token_type: "Bearer".into(),
			expires_in: Duration::seconds(expires_in),
			issued_at,
		}
	}

	#[test]
	fn staleness_flips_exactly_one_minute_before_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = token(issued, 3600);
		let boundary = issued + Duration::milliseconds(3_600_000 - 60_000);

		assert!(!token.is_expired_at(issued));
		assert!(!token.is_expired_at(boundary - Duration::milliseconds(1)));
		assert!(token.is_expired_at(boundary));
		assert!(token.is_expired_at(boundary + Duration::hours(5)));
	}

	#[test]
	fn short_lived_tokens_are_stale_immediately() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);

		assert!(token(issued, 30).is_expired_at(issued));
		assert!(token(issued, 60).is_expired_at(issued));
	}

	#[test]
	fn remaining_lifetime_clamps_at_zero() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = token(issued, 300);

		assert_eq!(token.remaining_at(issued + Duration::seconds(100)), Duration::seconds(200));
		assert_eq!(token.remaining_at(issued + Duration::hours(1)), Duration::ZERO);
	}

	#[test]
	fn response_accepts_numeric_and_string_lifetimes() {
		let numeric = TokenResponse::from_slice(br#"{"access_token":"a","expires_in":299}"#)
			.expect("Numeric lifetime should parse.");
		let text = TokenResponse::from_slice(
			br#"{"access_token":"b","expires_in":"299","token_type":"BearerToken"}"#,
		)
		.expect("String lifetime should parse.");

		assert_eq!(numeric.lifetime().expect("Lifetime should convert."), Duration::seconds(299));
		assert_eq!(text.lifetime().expect("Lifetime should convert."), Duration::seconds(299));
		assert_eq!(text.token_type.as_deref(), Some("BearerToken"));
	}

	#[test]
	fn response_rejects_missing_fields_and_bad_lifetimes() {
		let missing = TokenResponse::from_slice(br#"{"expires_in":299}"#)
			.expect_err("Missing access_token should fail.");

		assert!(matches!(missing, AuthGrantError::MalformedResponse { .. }));

		let empty = TokenResponse::from_slice(br#"{"access_token":"","expires_in":299}"#)
			.expect_err("Empty access_token should fail.");

		assert!(matches!(empty, AuthGrantError::MissingAccessToken));

		let garbage = TokenResponse::from_slice(br#"{"access_token":"a","expires_in":"soon"}"#)
			.expect("Shape is valid even when the lifetime is not.");

		assert!(matches!(garbage.lifetime(), Err(AuthGrantError::InvalidLifetime { .. })));
	}

	#[test]
	fn lifetimes_beyond_the_ceiling_are_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let ceiling = TokenResponse::from_slice(br#"{"access_token":"a","expires_in":31536000}"#)
			.expect("Ceiling lifetime should parse.");

		assert_eq!(ceiling.lifetime().expect("Ceiling lifetime should convert."), MAX_LIFETIME);

		for body in [
			br#"{"access_token":"a","expires_in":31536001}"#.as_slice(),
			br#"{"access_token":"a","expires_in":1000000000000}"#,
			br#"{"access_token":"a","expires_in":"9223372036854775807"}"#,
			br#"{"access_token":"a","expires_in":1e300}"#,
		] {
			let response = TokenResponse::from_slice(body).expect("Shape should be valid.");

			assert!(matches!(
				CachedToken::from_response(response, issued),
				Err(AuthGrantError::InvalidLifetime { .. })
			));
		}
	}

	#[test]
	fn oversized_lifetimes_saturate_instead_of_overflowing() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = CachedToken { expires_in: Duration::MAX, ..token(issued, 0) };

		assert!(!token.is_expired_at(issued + Duration::days(365 * 100)));
		assert!(token.remaining_at(issued).is_positive());
	}

	#[test]
	fn debug_output_redacts_access_token() {
		let token = token(macros::datetime!(2025-01-01 00:00 UTC), 60);
		let rendered = format!("{token:?}");

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("\"access\""));
	}
}

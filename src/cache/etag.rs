//! Content-derived entity tags for cached payloads.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Strong entity tag computed from a payload's SHA-256 digest.
///
/// The same bytes always produce the same tag, so a tag can be recomputed from a cache hit
/// without storing it alongside the payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ETag(String);
impl ETag {
	/// Computes the tag of `payload`.
	pub fn of(payload: &[u8]) -> Self {
		Self(URL_SAFE_NO_PAD.encode(Sha256::digest(payload)))
	}

	/// Unquoted digest in unpadded URL-safe base64.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Quoted form suitable for the `ETag` response header.
	pub fn header_value(&self) -> String {
		format!("\"{}\"", self.0)
	}

	/// Evaluates an `If-None-Match` header value against this tag.
	///
	/// Uses weak comparison: `W/` prefixes are ignored, lists are split on commas, and `*`
	/// matches anything. Unquoted tags are tolerated.
	pub fn matches(&self, if_none_match: &str) -> bool {
		if_none_match.split(',').map(str::trim).filter(|candidate| !candidate.is_empty()).any(
			|candidate| {
				if candidate == "*" {
					return true;
				}

				let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
				let candidate = candidate
					.strip_prefix('"')
					.and_then(|rest| rest.strip_suffix('"'))
					.unwrap_or(candidate);

				candidate == self.0
			},
		)
	}
}
impl Display for ETag {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "\"{}\"", self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn tags_are_deterministic_and_content_sensitive() {
		let a = ETag::of(b"tile-bytes");

		assert_eq!(a, ETag::of(b"tile-bytes"));
		assert_ne!(a, ETag::of(b"tile-bytes!"));
		assert_eq!(a.as_str().len(), 43);
		assert_eq!(ETag::of(b"").as_str(), "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU");
		assert_eq!(a.header_value(), format!("\"{}\"", a.as_str()));
		assert_eq!(a.to_string(), a.header_value());
	}

	#[test]
	fn if_none_match_forms_are_recognized() {
		let tag = ETag::of(b"payload");
		let quoted = tag.header_value();

		assert!(tag.matches(&quoted));
		assert!(tag.matches(tag.as_str()));
		assert!(tag.matches(&format!("W/{quoted}")));
		assert!(tag.matches(&format!("\"stale\", {quoted}")));
		assert!(tag.matches("*"));
		assert!(!tag.matches("\"stale\""));
		assert!(!tag.matches(""));
	}
}

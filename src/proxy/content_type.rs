//! Extension-based `Content-Type` inference for proxied resources.

// self
use crate::_prelude::*;

/// Fallback for unknown or missing extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Guesses a `Content-Type` from the extension of the URL's last path segment.
pub fn guess_content_type(url: &Url) -> &'static str {
	let extension = url
		.path_segments()
		.and_then(|mut segments| segments.next_back())
		.and_then(|name| name.rsplit_once('.'))
		.map(|(_, extension)| extension.to_ascii_lowercase());

	match extension.as_deref() {
		Some("pbf") => "application/x-protobuf",
		Some("mvt") => "application/vnd.mapbox-vector-tile",
		Some("json") => "application/json",
		Some("png") => "image/png",
		Some("jpg" | "jpeg") => "image/jpeg",
		_ => OCTET_STREAM,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn guess(url: &str) -> &'static str {
		guess_content_type(&Url::parse(url).expect("Fixture URL should parse."))
	}

	#[test]
	fn known_extensions_map_to_media_types() {
		assert_eq!(guess("https://h/vts/tile/1/2/3.pbf?srs=3857"), "application/x-protobuf");
		assert_eq!(guess("https://h/tiles/1/2/3.MVT"), "application/vnd.mapbox-vector-tile");
		assert_eq!(guess("https://h/resources/sprites/sprite.json"), "application/json");
		assert_eq!(guess("https://h/resources/sprites/sprite@2x.png"), "image/png");
		assert_eq!(guess("https://h/a.jpg"), "image/jpeg");
		assert_eq!(guess("https://h/a.jpeg"), "image/jpeg");
	}

	#[test]
	fn unknown_or_missing_extensions_fall_back() {
		assert_eq!(guess("https://h/resources/sprites/sprite"), OCTET_STREAM);
		assert_eq!(guess("https://h/a.webp"), OCTET_STREAM);
		assert_eq!(guess("https://h/"), OCTET_STREAM);
		assert_eq!(guess("https://h/dir.json/file"), OCTET_STREAM);
	}
}

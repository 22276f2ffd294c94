//! Style and vector-source manifest rewriting.
//!
//! Upstream manifests embed absolute URLs for sources, tile templates, sprites, and glyphs. The
//! browser must never call those directly (they require the server-side bearer token), so the
//! proxy rewrites them to point at its own routes before returning the JSON.
//!
//! Matching is done with explicit prefix predicates over parsed URLs rather than text patterns:
//! a URL is upstream when its scheme, host, and port equal the configured root and its path
//! starts with the expected prefix on a segment boundary. Everything after the prefix (path
//! tail, query string, `{z}`-style template braces) is carried over untouched.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Rewrites upstream URLs inside style and source manifests to local proxy routes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlRewriter {
	scheme: String,
	host: Option<String>,
	port: Option<u16>,
	tile_path: String,
	resources_path: String,
	local_prefix: String,
}
impl UrlRewriter {
	/// Creates a rewriter for manifests served from `upstream_root` (the `.../vts` root),
	/// targeting routes mounted at `local_prefix`.
	pub fn new(upstream_root: &Url, local_prefix: impl Into<String>) -> Self {
		let root_path = upstream_root.path().trim_end_matches('/');
		let local_prefix = local_prefix.into();

		Self {
			scheme: upstream_root.scheme().into(),
			host: upstream_root.host_str().map(ToOwned::to_owned),
			port: upstream_root.port_or_known_default(),
			tile_path: format!("{root_path}/tile"),
			resources_path: format!("{root_path}/resources"),
			local_prefix: local_prefix.trim_end_matches('/').into(),
		}
	}

	/// Local mount point rewritten URLs start with.
	pub fn local_prefix(&self) -> &str {
		&self.local_prefix
	}

	/// Returns a rewritten copy of a style manifest.
	///
	/// Every string `sources.*.url` points at the local source route, upstream
	/// `sources.*.tiles[]` templates point at the local tile route, and upstream `sprite` and
	/// `glyphs` point at the local asset route. Anything else is copied as-is.
	pub fn rewrite_style(&self, style: &Value) -> Value {
		let mut style = style.clone();

		if let Some(root) = style.as_object_mut() {
			if let Some(sources) = root.get_mut("sources").and_then(Value::as_object_mut) {
				for source in sources.values_mut().filter_map(Value::as_object_mut) {
					self.rewrite_source_entry(source);
				}
			}

			for field in ["sprite", "glyphs"] {
				if let Some(Value::String(url)) = root.get_mut(field) {
					if let Some(local) = self.to_local(url, &self.resources_path, "assets") {
						*url = local;
					}
				}
			}
		}

		style
	}

	/// Returns a rewritten copy of a vector source manifest; only the top-level `tiles[]`
	/// templates change.
	pub fn rewrite_source(&self, source: &Value) -> Value {
		let mut source = source.clone();

		if let Some(tiles) = source.get_mut("tiles") {
			self.rewrite_tiles(tiles);
		}

		source
	}

	fn rewrite_source_entry(&self, source: &mut Map<String, Value>) {
		if source.get("url").is_some_and(Value::is_string) {
			source.insert("url".into(), Value::String(format!("{}/source", self.local_prefix)));
		}
		if let Some(tiles) = source.get_mut("tiles") {
			self.rewrite_tiles(tiles);
		}
	}

	fn rewrite_tiles(&self, tiles: &mut Value) {
		let Some(tiles) = tiles.as_array_mut() else {
			return;
		};

		for tile in tiles {
			if let Value::String(template) = tile {
				if let Some(local) = self.to_local(template, &self.tile_path, "tiles") {
					*template = local;
				}
			}
		}
	}

	fn to_local(&self, raw: &str, upstream_path: &str, route: &str) -> Option<String> {
		let tail = self.upstream_tail(raw, upstream_path)?;

		Some(format!("{}/{route}{tail}", self.local_prefix))
	}

	// Works on the raw text after checking the parsed origin, since parsing would
	// percent-encode template braces.
	fn upstream_tail<'a>(&self, raw: &'a str, upstream_path: &str) -> Option<&'a str> {
		let parsed = Url::parse(raw).ok()?;

		if parsed.scheme() != self.scheme
			|| parsed.host_str() != self.host.as_deref()
			|| parsed.port_or_known_default() != self.port
		{
			return None;
		}

		let authority = &raw[raw.find("://")? + 3..];
		let path = &authority[authority.find(['/', '?', '#'])?..];
		let tail = path.strip_prefix(upstream_path)?;

		match tail.chars().next() {
			None | Some('/' | '?' | '#') => Some(tail),
			_ => None,
		}
	}
}

/// Finds the canonical vector source URL in a style manifest: the `url` of the first source
/// that has one.
pub fn first_source_url(style: &Value) -> Result<Url> {
	let raw = style
		.get("sources")
		.and_then(Value::as_object)
		.and_then(|sources| {
			sources.values().find_map(|source| source.get("url").and_then(Value::as_str))
		})
		.ok_or_else(|| Error::MalformedManifest {
			reason: "could not determine vector source URL".into(),
		})?;

	Url::parse(raw).map_err(|e| Error::MalformedManifest {
		reason: format!("vector source URL `{raw}` is invalid ({e})"),
	})
}

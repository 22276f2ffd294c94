//! Mapping of crate errors onto HTTP responses.

// crates.io
use axum::{
	http::{StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

impl Error {
	/// Status code reported to the browser for this error.
	///
	/// Upstream and token failures are gateway errors; local misconfiguration is a server error.
	pub fn http_status(&self) -> StatusCode {
		match self {
			Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Transport(_)
			| Self::AuthGrant(_)
			| Self::UpstreamFetch(_)
			| Self::MalformedManifest { .. } => StatusCode::BAD_GATEWAY,
		}
	}
}
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.http_status();
		let body = match &self {
			Self::Config(_) => "Proxy is misconfigured.".to_owned(),
			_ => self.to_string(),
		};

		(status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{AuthGrantError, ConfigError, TransportError, UpstreamFetchError};

	#[test]
	fn upstream_failures_are_bad_gateway() {
		let url = Url::parse("https://api.os.uk/maps/vector/v1/vts/tile/1/2/3.pbf")
			.expect("Fixture URL should parse.");
		let errors: [Error; 4] = [
			AuthGrantError::rejected(reqwest::StatusCode::UNAUTHORIZED).into(),
			UpstreamFetchError::new(&url, reqwest::StatusCode::NOT_FOUND).into(),
			TransportError::Io(std::io::Error::other("reset")).into(),
			Error::MalformedManifest { reason: "no sources".into() },
		];

		for err in errors {
			assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
		}
	}

	#[test]
	fn configuration_failures_are_internal_errors_without_detail() {
		let err: Error = ConfigError::http_client_build(std::io::Error::other("tls")).into();
		let response = err.into_response();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(
			response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("text/plain; charset=utf-8")
		);
	}
}

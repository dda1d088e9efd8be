//! Bearer header access for outbound requests.

// crates.io
use oauth2::http::{HeaderMap, HeaderValue, Request as HttpRequest, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::TokenSecret};

const BEARER: &str = "Bearer";

/// Reads and writes the `Authorization: Bearer` credential of a request without constraining the
/// HTTP client type.
pub trait RequestSigner {
	/// Returns the bearer token the request currently carries, if any.
	fn bearer_token(&self) -> Option<&str>;

	/// Replaces any existing `Authorization` header with `token`.
	fn set_bearer_token(&mut self, token: &TokenSecret) -> Result<()>;
}
impl<B> RequestSigner for HttpRequest<B> {
	fn bearer_token(&self) -> Option<&str> {
		read_bearer(self.headers())
	}

	fn set_bearer_token(&mut self, token: &TokenSecret) -> Result<()> {
		write_bearer(self.headers_mut(), token)
	}
}
#[cfg(feature = "reqwest")]
impl RequestSigner for reqwest::Request {
	fn bearer_token(&self) -> Option<&str> {
		read_bearer(self.headers())
	}

	fn set_bearer_token(&mut self, token: &TokenSecret) -> Result<()> {
		write_bearer(self.headers_mut(), token)
	}
}

/// Extracts the token from an `Authorization` header; the scheme is matched case-insensitively.
pub fn read_bearer(headers: &HeaderMap) -> Option<&str> {
	let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
	let (scheme, token) = value.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case(BEARER) && !token.is_empty()).then_some(token)
}

/// Writes `token` as a sensitive `Authorization: Bearer` header.
pub fn write_bearer(headers: &mut HeaderMap, token: &TokenSecret) -> Result<()> {
	let mut value =
		HeaderValue::from_str(&format!("{BEARER} {}", token.expose())).map_err(Error::unexpected)?;

	value.set_sensitive(true);
	headers.insert(AUTHORIZATION, value);

	Ok(())
}

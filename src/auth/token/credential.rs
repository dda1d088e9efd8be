//! Credential pairs stored per identity and returned by refresh operations.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access/refresh token pair produced by a [`RefreshOperation`](crate::refresh::RefreshOperation)
/// or supplied at login.
///
/// Providers that do not rotate refresh tokens return `refresh_token: None`; the coordinator then
/// keeps the previous one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Newly issued bearer credential.
	pub access_token: TokenSecret,
	/// Rotated refresh token, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	/// Creates a pair that rotates both secrets.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::non_empty(refresh_token),
		}
	}

	/// Creates a pair that leaves the stored refresh token untouched.
	pub fn access_only(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None }
	}
}

/// Credential held for one identity: the current access token plus the durable refresh token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Bearer credential attached to outbound requests.
	pub access_token: TokenSecret,
	/// Long-lived secret exchanged for new access tokens; `None` means "not logged in".
	pub refresh_token: Option<TokenSecret>,
}
impl Credential {
	/// Creates a credential from raw secrets.
	pub fn new(access_token: TokenSecret, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token, refresh_token }
	}

	/// Merges a refresh result with the refresh token that produced it.
	pub fn rotated(pair: TokenPair, previous_refresh: TokenSecret) -> Self {
		let refresh_token = pair.refresh_token.filter(|s| !s.is_empty()).unwrap_or(previous_refresh);

		Self { access_token: pair.access_token, refresh_token: Some(refresh_token) }
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rotation_keeps_previous_refresh_token_when_absent() {
		let kept = Credential::rotated(TokenPair::access_only("a1"), TokenSecret::new("r1"));

		assert_eq!(kept.access_token.expose(), "a1");
		assert_eq!(kept.refresh_token.as_ref().map(TokenSecret::expose), Some("r1"));

		let rotated = Credential::rotated(TokenPair::new("a2", "r2"), TokenSecret::new("r1"));

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
	}

	#[test]
	fn debug_output_redacts_both_secrets() {
		let credential = Credential::new(TokenSecret::new("a0"), Some(TokenSecret::new("r0")));
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("a0"));
		assert!(!rendered.contains("r0"));
	}
}

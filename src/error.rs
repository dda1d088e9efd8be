//! Crate-level error types shared by the coordinator, stores, refresh operations, and the HTTP
//! layer.

// self
use crate::{_prelude::*, auth::Identity};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared error source. Refresh outcomes are fanned out to every waiter, so sources must be
/// cloneable.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error delivered by every public operation.
///
/// The type is `Clone` because a single refresh result is delivered to every caller that queued
/// behind it.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// No refresh token is stored for the identity; no network call was made.
	#[error("No refresh token is available{}; login is required.", display_identity(.identity))]
	NotLoggedIn {
		/// Identity that lacks a refresh token, when one is known.
		identity: Option<Identity>,
	},
	/// Connectivity failure while talking to the authorization server or the API.
	#[error("Network error: {message}.")]
	Network {
		/// Human-readable summary.
		message: String,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Underlying transport failure.
		#[source]
		source: Option<SharedError>,
	},
	/// The authorization server explicitly rejected the refresh token.
	#[error("Authorization server rejected the refresh token: {reason}.")]
	Rejected {
		/// Provider- or caller-supplied reason string.
		reason: String,
	},
	/// Any other refresh failure, wrapped instead of dropped.
	#[error("Unexpected refresh failure: {message}.")]
	Unexpected {
		/// Human-readable summary.
		message: String,
		/// Underlying failure, if any.
		#[source]
		source: Option<SharedError>,
	},
	/// Credential store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
}
impl Error {
	/// Builds a [`Error::Network`] from a transport failure.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network {
			message: src.to_string(),
			status: None,
			retry_after: None,
			source: Some(Arc::new(src)),
		}
	}

	/// Builds a [`Error::Rejected`] with the provided reason.
	pub fn rejected(reason: impl Into<String>) -> Self {
		Self::Rejected { reason: reason.into() }
	}

	/// Wraps an arbitrary failure inside [`Error::Unexpected`].
	pub fn unexpected(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Unexpected { message: src.to_string(), source: Some(Arc::new(src)) }
	}

	/// Builds a source-less [`Error::Unexpected`].
	pub fn unexpected_message(message: impl Into<String>) -> Self {
		Self::Unexpected { message: message.into(), source: None }
	}

	/// Returns `true` when the caller should re-authenticate the user.
	pub fn requires_login(&self) -> bool {
		matches!(self, Self::NotLoggedIn { .. } | Self::Rejected { .. })
	}

	/// Returns `true` for failures eligible for the caller's own retry policy.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Network { .. })
	}
}

fn display_identity(identity: &Option<Identity>) -> String {
	identity.as_ref().map(|id| format!(" for {id}")).unwrap_or_default()
}

/// Configuration and construction failures. These surface at setup time and never flow through
/// the refresh fan-out.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Token endpoint configuration failed validation.
	#[error(transparent)]
	TokenEndpoint(#[from] crate::refresh::TokenEndpointConfigError),
	/// Token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn classification_helpers_split_login_and_transient_failures() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");

		assert!(Error::NotLoggedIn { identity: None }.requires_login());
		assert!(Error::rejected("invalid_grant").requires_login());
		assert!(Error::network(io).is_transient());
		assert!(!Error::unexpected_message("boom").requires_login());
		assert!(!Error::unexpected_message("boom").is_transient());
	}

	#[test]
	fn not_logged_in_mentions_identity_when_known() {
		let identity =
			crate::auth::Identity::parse("u2", "example").expect("Identity should parse.");
		let err = Error::NotLoggedIn { identity: Some(identity) };

		assert_eq!(
			err.to_string(),
			"No refresh token is available for example/u2; login is required."
		);
		assert_eq!(
			Error::NotLoggedIn { identity: None }.to_string(),
			"No refresh token is available; login is required."
		);
	}

	#[test]
	fn network_error_keeps_shared_source() {
		let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
		let err = Error::network(io);
		let cloned = err.clone();
		let source = StdError::source(&cloned).expect("Network error should expose its source.");

		assert_eq!(source.to_string(), "timed out");
	}
}

//! Login signal surfaced when a refresh cannot proceed without the user.

// self
use crate::{_prelude::*, auth::Identity};

pub(crate) const LOGIN_CHANNEL_CAPACITY: usize = 16;

/// Why the embedding application should start its login flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginReason {
	/// No refresh token is stored; the account was never logged in or was logged out.
	NotLoggedIn,
	/// The authorization server rejected the stored refresh token.
	Rejected,
}

/// Intent to re-authenticate one identity.
///
/// The coordinator never performs UI work itself; subscribers decide how to prompt the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
	/// Identity that needs a fresh login.
	pub identity: Identity,
	/// What triggered the request.
	pub reason: LoginReason,
}

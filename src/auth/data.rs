//! Arbitrary string metadata persisted alongside an account.

// self
use crate::_prelude::*;

/// Key/value pairs stored with an account at login.
///
/// ```
/// use oauth2_account::auth::AccountData;
///
/// let data = AccountData::with("display_name", "Alice").and("locale", "en");
///
/// assert_eq!(data.get("locale"), Some("en"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData(BTreeMap<String, String>);
impl AccountData {
	/// Creates a container holding a single entry.
	pub fn with(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::default().and(key, value)
	}

	/// Adds (or replaces) an entry.
	pub fn and(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.insert(key.into(), value.into());

		self
	}

	/// Returns the value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Returns `true` when no entries were added.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over entries in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

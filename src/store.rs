//! Storage contract and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccountType, Credential, Identity, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable key/value storage for one identity's refresh token, access token, and metadata.
///
/// Implementations must provide read-your-writes consistency for a single identity. Empty
/// strings are reported as absent.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the stored refresh token, if any.
	fn refresh_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>>;

	/// Returns the cached access token, if any.
	fn access_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>>;

	/// Persists both secrets. A credential without a refresh token clears the stored one.
	fn set_credential<'a>(
		&'a self,
		identity: &'a Identity,
		credential: Credential,
	) -> StoreFuture<'a, ()>;

	/// Stores an arbitrary metadata entry for the identity.
	fn set_metadata<'a>(
		&'a self,
		identity: &'a Identity,
		key: &'a str,
		value: &'a str,
	) -> StoreFuture<'a, ()>;

	/// Reads a metadata entry for the identity.
	fn metadata<'a>(&'a self, identity: &'a Identity, key: &'a str)
	-> StoreFuture<'a, Option<String>>;

	/// Clears the cached access token when it still equals `token`.
	///
	/// Returns `true` when a token was cleared.
	fn invalidate_access_token<'a>(
		&'a self,
		identity: &'a Identity,
		token: &'a str,
	) -> StoreFuture<'a, bool>;

	/// Deletes every value stored for the identity.
	fn remove<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, ()>;

	/// Lists stored identities, optionally restricted to one account type, in a stable order.
	fn identities<'a>(
		&'a self,
		account_type: Option<&'a AccountType>,
	) -> StoreFuture<'a, Vec<Identity>>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Everything a store keeps for one identity.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct AccountEntry {
	pub(crate) access_token: Option<TokenSecret>,
	pub(crate) refresh_token: Option<TokenSecret>,
	#[serde(default)]
	pub(crate) metadata: BTreeMap<String, String>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub(crate) updated_at: Option<OffsetDateTime>,
}
impl AccountEntry {
	pub(crate) fn apply_credential(&mut self, credential: Credential) {
		self.access_token = Some(credential.access_token).filter(|s| !s.is_empty());
		self.refresh_token = credential.refresh_token.filter(|s| !s.is_empty());
		self.touch();
	}

	pub(crate) fn invalidate(&mut self, token: &str) -> bool {
		if self.access_token.as_ref().is_some_and(|current| current.expose() == token) {
			self.access_token = None;
			self.touch();

			true
		} else {
			false
		}
	}

	pub(crate) fn touch(&mut self) {
		self.updated_at = Some(OffsetDateTime::now_utc());
	}
}

pub(crate) fn sorted_identities<'a>(
	keys: impl Iterator<Item = &'a Identity>,
	account_type: Option<&AccountType>,
) -> Vec<Identity> {
	let mut identities: Vec<_> = keys
		.filter(|identity| account_type.is_none_or(|kind| &identity.account_type == kind))
		.cloned()
		.collect();

	identities.sort();

	identities
}

//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccountType, Credential, Identity, TokenSecret},
	store::{self, AccountEntry, CredentialStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<Identity, AccountEntry>>>;

/// Thread-safe storage backend that keeps credentials in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Seeds a credential synchronously; handy for fixtures.
	pub fn insert(&self, identity: Identity, credential: Credential) {
		self.0.write().entry(identity).or_default().apply_credential(credential);
	}

	fn read_now<T>(
		map: StoreMap,
		identity: &Identity,
		f: impl FnOnce(&AccountEntry) -> Option<T>,
	) -> Option<T> {
		map.read().get(identity).and_then(f)
	}
}
impl CredentialStore for MemoryStore {
	fn refresh_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(map, identity, |e| e.refresh_token.clone())) })
	}

	fn access_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(map, identity, |e| e.access_token.clone())) })
	}

	fn set_credential<'a>(
		&'a self,
		identity: &'a Identity,
		credential: Credential,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().entry(identity.clone()).or_default().apply_credential(credential);

			Ok(())
		})
	}

	fn set_metadata<'a>(
		&'a self,
		identity: &'a Identity,
		key: &'a str,
		value: &'a str,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();
			let entry = guard.entry(identity.clone()).or_default();

			entry.metadata.insert(key.to_owned(), value.to_owned());
			entry.touch();

			Ok(())
		})
	}

	fn metadata<'a>(
		&'a self,
		identity: &'a Identity,
		key: &'a str,
	) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::read_now(map, identity, |e| e.metadata.get(key).cloned())) })
	}

	fn invalidate_access_token<'a>(
		&'a self,
		identity: &'a Identity,
		token: &'a str,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map.write().get_mut(identity).is_some_and(|entry| entry.invalidate(token)))
		})
	}

	fn remove<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(identity);

			Ok(())
		})
	}

	fn identities<'a>(
		&'a self,
		account_type: Option<&'a AccountType>,
	) -> StoreFuture<'a, Vec<Identity>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::sorted_identities(map.read().keys(), account_type)) })
	}
}

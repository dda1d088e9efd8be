//! Simple file-backed [`CredentialStore`] for desktop tools, CLIs, and bots.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{AccountType, Credential, Identity, TokenSecret},
	store::{self, AccountEntry, CredentialStore, StoreError, StoreFuture},
};

type Snapshot = HashMap<Identity, AccountEntry>;

/// Persists credentials to a JSON file after each mutation.
///
/// Encryption at rest is out of scope; point the store at a location with suitable file
/// permissions.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<(Identity, AccountEntry)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot: Vec<_> = contents.iter().collect();

		snapshot.sort_by(|a, b| a.0.cmp(b.0));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate<T>(
		&self,
		identity: &Identity,
		f: impl FnOnce(&mut AccountEntry) -> T,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let value = f(guard.entry(identity.clone()).or_default());

		self.persist_locked(&guard)?;

		Ok(value)
	}
}
impl CredentialStore for FileStore {
	fn refresh_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>> {
		Box::pin(async move {
			Ok(self.inner.read().get(identity).and_then(|entry| entry.refresh_token.clone()))
		})
	}

	fn access_token<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, Option<TokenSecret>> {
		Box::pin(async move {
			Ok(self.inner.read().get(identity).and_then(|entry| entry.access_token.clone()))
		})
	}

	fn set_credential<'a>(
		&'a self,
		identity: &'a Identity,
		credential: Credential,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.mutate(identity, |entry| entry.apply_credential(credential)) })
	}

	fn set_metadata<'a>(
		&'a self,
		identity: &'a Identity,
		key: &'a str,
		value: &'a str,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(identity, |entry| {
				entry.metadata.insert(key.to_owned(), value.to_owned());
				entry.touch();
			})
		})
	}

	fn metadata<'a>(
		&'a self,
		identity: &'a Identity,
		key: &'a str,
	) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move {
			Ok(self.inner.read().get(identity).and_then(|entry| entry.metadata.get(key).cloned()))
		})
	}

	fn invalidate_access_token<'a>(
		&'a self,
		identity: &'a Identity,
		token: &'a str,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let cleared = guard.get_mut(identity).is_some_and(|entry| entry.invalidate(token));

			if cleared {
				self.persist_locked(&guard)?;
			}

			Ok(cleared)
		})
	}

	fn remove<'a>(&'a self, identity: &'a Identity) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(identity).is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}

	fn identities<'a>(
		&'a self,
		account_type: Option<&'a AccountType>,
	) -> StoreFuture<'a, Vec<Identity>> {
		Box::pin(async move { Ok(store::sorted_identities(self.inner.read().keys(), account_type)) })
	}
}

//! Single-current-account facade over the coordinator and its credential store.
//!
//! Applications that only ever have one signed-in user per account type can use
//! [`AccountManager`] instead of passing identities around: it remembers which identity is
//! current, persists tokens and profile data at login, and removes them at logout.

// self
use crate::{
	_prelude::*,
	auth::{AccountData, AccountName, AccountType, Credential, Identity, TokenPair, TokenSecret},
	coordinator::Coordinator,
	ext::{TokenFuture, TokenSource},
};

/// Tracks the signed-in account of one [`AccountType`].
#[derive(Clone, Debug)]
pub struct AccountManager {
	coordinator: Coordinator,
	account_type: AccountType,
	current: Arc<RwLock<Option<Identity>>>,
}
impl AccountManager {
	/// Creates a manager with nobody signed in.
	pub fn new(coordinator: Coordinator, account_type: AccountType) -> Self {
		Self { coordinator, account_type, current: Default::default() }
	}

	/// Creates a manager and adopts the first stored identity of `account_type`, if any.
	pub async fn restore(coordinator: Coordinator, account_type: AccountType) -> Result<Self> {
		let stored = coordinator.store().identities(Some(&account_type)).await?;
		let manager = Self::new(coordinator, account_type);

		*manager.current.write() = stored.into_iter().next();

		Ok(manager)
	}

	/// Account type managed by this instance.
	pub fn account_type(&self) -> &AccountType {
		&self.account_type
	}

	/// Coordinator shared with the rest of the application.
	pub fn coordinator(&self) -> &Coordinator {
		&self.coordinator
	}

	/// Currently signed-in identity.
	pub fn identity(&self) -> Option<Identity> {
		self.current.read().clone()
	}

	/// Returns `true` while an account is signed in.
	pub fn is_logged_in(&self) -> bool {
		self.current.read().is_some()
	}

	/// Persists `pair` and `data` for `name` and makes it the current account.
	///
	/// A different previously signed-in account is removed from the store first.
	pub async fn login(
		&self,
		name: AccountName,
		pair: TokenPair,
		data: AccountData,
	) -> Result<Identity> {
		let identity = Identity::new(name, self.account_type.clone());
		let store = self.coordinator.store();

		if let Some(previous) = self.identity().filter(|previous| previous != &identity) {
			store.remove(&previous).await?;
		}

		store
			.set_credential(&identity, Credential::new(pair.access_token, pair.refresh_token))
			.await?;

		for (key, value) in data.iter() {
			store.set_metadata(&identity, key, value).await?;
		}

		*self.current.write() = Some(identity.clone());

		#[cfg(feature = "tracing")]
		tracing::info!(%identity, "account logged in");

		Ok(identity)
	}

	/// Forgets the current account and deletes everything stored for it.
	pub async fn logout(&self) -> Result<()> {
		let Some(identity) = self.current.write().take() else {
			return Ok(());
		};

		self.coordinator.store().remove(&identity).await?;

		#[cfg(feature = "tracing")]
		tracing::info!(%identity, "account logged out");

		Ok(())
	}

	/// Stores one metadata entry for the current account; a no-op when logged out.
	pub async fn set_account_data(&self, key: &str, value: &str) -> Result<()> {
		let Some(identity) = self.identity() else {
			return Ok(());
		};

		Ok(self.coordinator.store().set_metadata(&identity, key, value).await?)
	}

	/// Stores every entry of `data` for the current account; a no-op when logged out.
	pub async fn set_all_account_data(&self, data: &AccountData) -> Result<()> {
		let Some(identity) = self.identity() else {
			return Ok(());
		};

		for (key, value) in data.iter() {
			self.coordinator.store().set_metadata(&identity, key, value).await?;
		}

		Ok(())
	}

	/// Reads one metadata entry of the current account.
	pub async fn account_data(&self, key: &str) -> Result<Option<String>> {
		match self.identity() {
			Some(identity) => Ok(self.coordinator.store().metadata(&identity, key).await?),
			None => Ok(None),
		}
	}

	/// Cached or refreshed access token of the current account.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		let identity = self.require_identity()?;

		Ok(self.coordinator.get_token(&identity).await?.access_token)
	}

	/// Invalidates `invalid` and returns a different access token for the current account.
	pub async fn new_access_token(&self, invalid: &str) -> Result<TokenSecret> {
		let identity = self.require_identity()?;

		self.coordinator.invalidate(&identity, invalid).await?;

		Ok(self.coordinator.request_refresh(&identity, Some(invalid)).await?.access_token)
	}

	fn require_identity(&self) -> Result<Identity> {
		self.identity().ok_or(Error::NotLoggedIn { identity: None })
	}
}
impl TokenSource for AccountManager {
	fn cached_access_token(&self) -> TokenFuture<'_, Option<TokenSecret>> {
		Box::pin(async move {
			match self.identity() {
				Some(identity) => self.coordinator.cached_access_token(&identity).await,
				None => Ok(None),
			}
		})
	}

	fn access_token(&self) -> TokenFuture<'_, TokenSecret> {
		Box::pin(AccountManager::access_token(self))
	}

	fn renew_access_token<'a>(&'a self, invalid: &'a str) -> TokenFuture<'a, TokenSecret> {
		Box::pin(self.new_access_token(invalid))
	}
}

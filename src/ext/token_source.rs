//! Token provider contract consumed by the HTTP middleware.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`TokenSource`] operations.
pub type TokenFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Supplies access tokens for one logical identity.
///
/// Implemented by [`IdentityTokens`](crate::coordinator::IdentityTokens) and
/// [`AccountManager`](crate::account::AccountManager).
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Non-refreshing cache lookup. Must never wait for a refresh or a login.
	fn cached_access_token(&self) -> TokenFuture<'_, Option<TokenSecret>>;

	/// Cached token, or a refreshed one when nothing usable is cached.
	fn access_token(&self) -> TokenFuture<'_, TokenSecret>;

	/// Invalidates `invalid` and returns a token other than it, refreshing if needed.
	fn renew_access_token<'a>(&'a self, invalid: &'a str) -> TokenFuture<'a, TokenSecret>;
}
impl<T> TokenSource for Arc<T>
where
	T: ?Sized + TokenSource,
{
	fn cached_access_token(&self) -> TokenFuture<'_, Option<TokenSecret>> {
		(**self).cached_access_token()
	}

	fn access_token(&self) -> TokenFuture<'_, TokenSecret> {
		(**self).access_token()
	}

	fn renew_access_token<'a>(&'a self, invalid: &'a str) -> TokenFuture<'a, TokenSecret> {
		(**self).renew_access_token(invalid)
	}
}

//! Refresh operation contract consumed by the coordinator, plus the OAuth 2.0 token endpoint
//! implementation.

pub mod endpoint;

pub use endpoint::*;

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenPair, TokenSecret},
};

/// Boxed future returned by [`RefreshOperation::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenPair>> + 'a + Send>>;

/// Exchanges a refresh token for a new token pair against one backend.
///
/// The coordinator calls this at most once per identity at a time and never while holding any
/// internal lock, so implementations may freely query the coordinator themselves. Failures should
/// be classified as [`Error::Network`], [`Error::Rejected`], or [`Error::Unexpected`]; the
/// coordinator never retries a failed refresh.
pub trait RefreshOperation
where
	Self: Send + Sync,
{
	/// Performs one refresh for `identity` using `refresh_token`.
	fn refresh<'a>(&'a self, identity: &'a Identity, refresh_token: &'a TokenSecret)
	-> RefreshFuture<'a>;
}
impl<F, Fut> RefreshOperation for F
where
	F: Send + Sync + Fn(Identity, TokenSecret) -> Fut,
	Fut: 'static + Send + Future<Output = Result<TokenPair>>,
{
	fn refresh<'a>(
		&'a self,
		identity: &'a Identity,
		refresh_token: &'a TokenSecret,
	) -> RefreshFuture<'a> {
		Box::pin(self(identity.clone(), refresh_token.clone()))
	}
}

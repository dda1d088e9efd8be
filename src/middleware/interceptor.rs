//! Pre-request hook attaching the cached access token.

// self
use crate::{
	_prelude::*,
	ext::{RequestSigner, TokenSource},
	obs::{self, OpKind, OpOutcome},
};

/// Stamps outbound requests with whatever access token is currently cached.
///
/// Never triggers or waits for a refresh; without a cached token the request is left untouched.
#[derive(Clone, Debug)]
pub struct RequestAuthInterceptor<S> {
	source: S,
}
impl<S> RequestAuthInterceptor<S>
where
	S: TokenSource,
{
	/// Creates an interceptor reading from `source`.
	pub fn new(source: S) -> Self {
		Self { source }
	}

	/// Attaches the cached token to `request`; returns whether a header was written.
	pub async fn intercept<R>(&self, request: &mut R) -> Result<bool>
	where
		R: RequestSigner,
	{
		obs::record_op_outcome(OpKind::Intercept, OpOutcome::Attempt);

		let Some(token) = self.source.cached_access_token().await? else {
			return Ok(false);
		};

		request.set_bearer_token(&token)?;
		obs::record_op_outcome(OpKind::Intercept, OpOutcome::Success);

		Ok(true)
	}
}

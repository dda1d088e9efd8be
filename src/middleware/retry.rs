//! Post-response hook retrying a rejected request once with a corrected token.

// self
use crate::{
	_prelude::*,
	ext::{RequestSigner, TokenSource},
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Authorization retries allowed per original request.
pub const MAX_AUTH_RETRIES: u8 = 1;

const UNAUTHORIZED: u16 = 401;

/// A request plus the number of authorization retries already spent on it.
#[derive(Clone, Debug)]
pub struct Attempt<R> {
	/// Request as it will be (re)sent.
	pub request: R,
	/// Authorization retries already performed for the original request.
	pub retries: u8,
}
impl<R> Attempt<R> {
	/// Wraps the first attempt of a request.
	pub fn new(request: R) -> Self {
		Self { request, retries: 0 }
	}
}

/// Decides whether an unauthorized response deserves a retry and rewrites the request for it.
#[derive(Clone, Debug)]
pub struct RequestRetryAuthenticator<S> {
	source: S,
}
impl<S> RequestRetryAuthenticator<S>
where
	S: TokenSource,
{
	/// Creates an authenticator renewing tokens through `source`.
	pub fn new(source: S) -> Self {
		Self { source }
	}

	/// Returns the attempt to send next, or `None` when the failure should propagate as is.
	///
	/// Only `401` responses are retried, at most [`MAX_AUTH_RETRIES`] times per original request.
	/// When the failed attempt carried a bearer token, that token is invalidated and a different
	/// one obtained, which joins any refresh already running for concurrent failures. Without a
	/// bearer token, the cached or refreshed token is used. A failed refresh is returned as `Err`
	/// and no retry is made.
	pub async fn authenticate<R>(
		&self,
		attempt: Attempt<R>,
		status: u16,
	) -> Result<Option<Attempt<R>>>
	where
		R: RequestSigner + Send,
	{
		const KIND: OpKind = OpKind::Retry;

		if status != UNAUTHORIZED || attempt.retries >= MAX_AUTH_RETRIES {
			return Ok(None);
		}

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let Attempt { mut request, retries } = attempt;
		let used = request.bearer_token().map(ToOwned::to_owned);
		let span = OpSpan::new(KIND, "authenticate", None);
		let renewed = span
			.instrument(async {
				match used.as_deref() {
					Some(invalid) => self.source.renew_access_token(invalid).await,
					None => self.source.access_token().await,
				}
			})
			.await;
		let token = match renewed {
			Ok(token) => token,
			Err(e) => {
				obs::record_op_outcome(KIND, OpOutcome::Failure);

				return Err(e);
			},
		};

		request.set_bearer_token(&token)?;
		obs::record_op_outcome(KIND, OpOutcome::Success);

		Ok(Some(Attempt { request, retries: retries + 1 }))
	}
}

//! reqwest client wired with the interceptor and the retry authenticator.

// crates.io
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
// self
use crate::{
	_prelude::*,
	ext::TokenSource,
	middleware::{Attempt, RequestAuthInterceptor, RequestRetryAuthenticator},
};

/// reqwest client that authenticates every request for one identity.
///
/// Requests are stamped with the cached token, sent, and replayed at most once with a renewed
/// token when the server answers `401 Unauthorized`. When renewing fails, or the body cannot be
/// replayed because it is a stream, the original `401` response is returned.
#[derive(Clone, Debug)]
pub struct AuthenticatedClient<S> {
	client: ReqwestClient,
	interceptor: RequestAuthInterceptor<S>,
	authenticator: RequestRetryAuthenticator<S>,
}
impl<S> AuthenticatedClient<S>
where
	S: Clone + TokenSource,
{
	/// Wraps `client`, pulling tokens from `source`.
	pub fn new(client: ReqwestClient, source: S) -> Self {
		Self {
			client,
			interceptor: RequestAuthInterceptor::new(source.clone()),
			authenticator: RequestRetryAuthenticator::new(source),
		}
	}

	/// Starts a request builder on the inner client; finish it with [`AuthenticatedClient::send`].
	pub fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
		self.client.request(method, url)
	}

	/// Builds and executes `builder`.
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		self.execute(builder.build().map_err(Error::unexpected)?).await
	}

	/// Executes `request` with bearer stamping and the single 401 retry.
	pub async fn execute(&self, mut request: Request) -> Result<Response> {
		if let Err(e) = self.interceptor.intercept(&mut request).await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %e, "failed to read cached token; sending unauthenticated");
			#[cfg(not(feature = "tracing"))]
			let _ = e;
		}

		let mut retries = 0;

		loop {
			let replay = request.try_clone();
			let response = self.client.execute(request).await.map_err(Error::network)?;

			if response.status() != StatusCode::UNAUTHORIZED {
				return Ok(response);
			}

			let Some(replay) = replay else {
				return Ok(response);
			};
			let status = response.status().as_u16();

			match self.authenticator.authenticate(Attempt { request: replay, retries }, status).await
			{
				Ok(Some(next)) => {
					retries = next.retries;
					request = next.request;
				},
				Ok(None) => return Ok(response),
				Err(e) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(error = %e, "token renewal failed; returning the 401 response");
					#[cfg(not(feature = "tracing"))]
					let _ = e;

					return Ok(response);
				},
			}
		}
	}
}

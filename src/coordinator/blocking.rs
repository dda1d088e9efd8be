//! Blocking facade for callers running on plain threads.

// crates.io
use tokio::runtime::Handle;
// self
use crate::{
	_prelude::*,
	auth::{Credential, Identity, TokenSecret},
	coordinator::Coordinator,
};

/// Thread-parking view of a [`Coordinator`].
///
/// Each call drives the async operation to completion on the supplied runtime, so a blocking
/// caller joins exactly the same waiter queue as async callers and callbacks.
///
/// # Panics
///
/// Every method panics when invoked from within an asynchronous execution context (see
/// [`Handle::block_on`]). Call it from `std::thread` workers or `spawn_blocking` closures.
#[derive(Clone, Debug)]
pub struct BlockingCoordinator {
	inner: Coordinator,
	runtime: Handle,
}
impl BlockingCoordinator {
	/// Wraps `coordinator`, driving its futures on `runtime`.
	pub fn new(coordinator: Coordinator, runtime: Handle) -> Self {
		Self { inner: coordinator, runtime }
	}

	/// Async coordinator shared with this facade.
	pub fn coordinator(&self) -> &Coordinator {
		&self.inner
	}

	/// Blocking [`Coordinator::get_token`].
	pub fn get_token(&self, identity: &Identity) -> Result<Credential> {
		self.runtime.block_on(self.inner.get_token(identity))
	}

	/// Blocking [`Coordinator::cached_access_token`].
	pub fn cached_access_token(&self, identity: &Identity) -> Result<Option<TokenSecret>> {
		self.runtime.block_on(self.inner.cached_access_token(identity))
	}

	/// Blocking [`Coordinator::request_refresh`].
	pub fn request_refresh(&self, identity: &Identity, stale: Option<&str>) -> Result<Credential> {
		self.runtime.block_on(self.inner.request_refresh(identity, stale))
	}

	/// Blocking [`Coordinator::invalidate`].
	pub fn invalidate(&self, identity: &Identity, token: &str) -> Result<bool> {
		self.runtime.block_on(self.inner.invalidate(identity, token))
	}
}

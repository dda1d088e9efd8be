//! Single-flight refresh coordinator.
//!
//! Every call site that needs a token for an [`Identity`] goes through [`Coordinator`]. Concurrent
//! callers that find the cached access token missing or rejected converge on one invocation of the
//! [`RefreshOperation`]; everyone queued behind it receives the same result. Each identity owns an
//! independent slot, so a slow refresh for one account never delays another.
//!
//! Internal locks guard state transitions only. They are never held across the refresh operation,
//! store I/O, or waiter resolution, so a callback may re-enter the coordinator freely.
//!
//! The refresh itself runs as a detached task. Cancelling the caller that started it (a timeout,
//! an aborted request) only cancels that caller's wait; the exchange still completes, the rotated
//! credential is persisted, and every other waiter receives its result.

mod blocking;
mod login;
mod metrics;
mod state;

pub use blocking::BlockingCoordinator;
pub use login::{LoginReason, LoginRequest};
pub use metrics::RefreshMetrics;
pub use state::RefreshCallback;

// crates.io
use tokio::{
	runtime::Handle,
	sync::{broadcast, oneshot},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, Identity, TokenSecret},
	ext::{TokenFuture, TokenSource},
	obs::{self, OpKind, OpOutcome, OpSpan},
	refresh::RefreshOperation,
	store::CredentialStore,
};
use state::{IdentitySlot, Leadership, Waiter};

/// Why a refresh cycle was started. The leader uses it to decide whether a token that appeared
/// while it was waiting for leadership already satisfies the request.
#[derive(Clone, Debug, PartialEq, Eq)]
enum RefreshReason {
	/// No usable token was cached.
	Missing,
	/// The caller saw this token rejected.
	Stale(TokenSecret),
	/// The caller demands a new token regardless of the cache.
	Forced,
}
impl RefreshReason {
	fn from_stale(stale: Option<&str>) -> Self {
		match stale.filter(|token| !token.is_empty()) {
			Some(token) => Self::Stale(TokenSecret::new(token)),
			None => Self::Forced,
		}
	}

	fn accepts(&self, cached: &TokenSecret) -> bool {
		match self {
			Self::Missing => true,
			Self::Stale(stale) => stale != cached,
			Self::Forced => false,
		}
	}
}

/// Shared handle deduplicating refreshes per identity and fanning results out to every waiter.
///
/// Cloning is cheap; all clones share the same slots, store, operation, and metrics.
#[derive(Clone)]
pub struct Coordinator {
	store: Arc<dyn CredentialStore>,
	operation: Arc<dyn RefreshOperation>,
	metrics: Arc<RefreshMetrics>,
	login: broadcast::Sender<LoginRequest>,
	slots: Arc<Mutex<HashMap<Identity, Arc<IdentitySlot>>>>,
}
impl Coordinator {
	/// Creates a coordinator over the provided store and refresh operation.
	pub fn new(store: Arc<dyn CredentialStore>, operation: Arc<dyn RefreshOperation>) -> Self {
		let (login, _) = broadcast::channel(login::LOGIN_CHANNEL_CAPACITY);

		Self {
			store,
			operation,
			metrics: Default::default(),
			login,
			slots: Default::default(),
		}
	}

	/// Credential store backing this coordinator.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Counters shared by every clone of this coordinator.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Binds the coordinator to one identity, yielding a [`TokenSource`] for the HTTP layer.
	pub fn for_identity(&self, identity: Identity) -> IdentityTokens {
		IdentityTokens { coordinator: self.clone(), identity }
	}

	/// Subscribes to login requests emitted when a refresh needs the user.
	///
	/// Requests emitted while nobody is subscribed are dropped.
	pub fn subscribe_login_requests(&self) -> broadcast::Receiver<LoginRequest> {
		self.login.subscribe()
	}

	/// Returns the cached access token, or refreshes when none is usable.
	///
	/// Joins an in-flight refresh for the same identity instead of starting another one.
	pub async fn get_token(&self, identity: &Identity) -> Result<Credential> {
		const KIND: OpKind = OpKind::GetToken;

		let span = OpSpan::new(KIND, "get_token", Some(identity));

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Some(credential) = self.cached_credential(identity).await? {
					return Ok(credential);
				}

				self.join_refresh(identity, RefreshReason::Missing).await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Read-only cache lookup used by the request interceptor; never refreshes or blocks on one.
	///
	/// Tokens marked stale through [`Coordinator::invalidate`] are hidden even if the store still
	/// holds them.
	pub async fn cached_access_token(&self, identity: &Identity) -> Result<Option<TokenSecret>> {
		let cached = self.store.access_token(identity).await?.filter(|token| !token.is_empty());

		Ok(cached.filter(|token| !self.existing_slot(identity).is_some_and(|s| s.is_stale(token))))
	}

	/// Requests a new token for `identity`.
	///
	/// With `stale` set, a token cached by a concurrent refresh that differs from `stale` is
	/// returned without calling the refresh operation again. With `None`, the operation always
	/// runs (unless another caller's refresh is already in flight, which is joined instead).
	pub async fn request_refresh(
		&self,
		identity: &Identity,
		stale: Option<&str>,
	) -> Result<Credential> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "request_refresh", Some(identity));
		let result =
			span.instrument(self.join_refresh(identity, RefreshReason::from_stale(stale))).await;

		record_result(KIND, &result);

		result
	}

	/// Continuation-style [`Coordinator::request_refresh`].
	///
	/// `callback` is queued in the same waiter list as async and blocking callers and runs exactly
	/// once, on whichever thread completes the refresh. When no refresh is in flight, the leader is
	/// spawned on `runtime`.
	pub fn request_refresh_with<F>(
		&self,
		runtime: &Handle,
		identity: &Identity,
		stale: Option<&str>,
		callback: F,
	) where
		F: 'static + Send + FnOnce(Result<Credential>),
	{
		let slot = self.slot(identity);

		match slot.enlist(Waiter::Callback(Box::new(callback))) {
			Some(leadership) => self.spawn_leader(
				runtime,
				identity,
				slot,
				leadership,
				RefreshReason::from_stale(stale),
			),
			None => self.record_joined(),
		}
	}

	/// Marks `token` as stale for `identity` and clears it from the store if still current.
	///
	/// Returns `true` when the store held that token.
	pub async fn invalidate(&self, identity: &Identity, token: &str) -> Result<bool> {
		if token.is_empty() {
			return Ok(false);
		}

		self.slot(identity).mark_stale(TokenSecret::new(token));
		self.metrics.record_invalidation();

		OpSpan::new(OpKind::Refresh, "invalidate", Some(identity))
			.instrument(async move {
				let cleared = self.store.invalidate_access_token(identity, token).await?;

				#[cfg(feature = "tracing")]
				tracing::debug!(cleared, "access token invalidated");

				Ok::<_, Error>(cleared)
			})
			.await
	}

	/// Returns `true` while a refresh for `identity` is in flight.
	pub fn is_refreshing(&self, identity: &Identity) -> bool {
		self.existing_slot(identity).is_some_and(|slot| slot.is_fetching())
	}

	/// Number of callers (the leader included) waiting on the in-flight refresh for `identity`.
	pub fn pending_waiters(&self, identity: &Identity) -> usize {
		self.existing_slot(identity).map_or(0, |slot| slot.pending())
	}

	fn slot(&self, identity: &Identity) -> Arc<IdentitySlot> {
		self.slots.lock().entry(identity.clone()).or_default().clone()
	}

	fn existing_slot(&self, identity: &Identity) -> Option<Arc<IdentitySlot>> {
		self.slots.lock().get(identity).cloned()
	}

	async fn cached_credential(&self, identity: &Identity) -> Result<Option<Credential>> {
		let Some(access_token) = self.cached_access_token(identity).await? else {
			return Ok(None);
		};
		let refresh_token = self.store.refresh_token(identity).await?;

		Ok(Some(Credential::new(access_token, refresh_token)))
	}

	async fn join_refresh(&self, identity: &Identity, reason: RefreshReason) -> Result<Credential> {
		let result = self.await_cycle(identity, reason.clone()).await;

		// A joiner may be handed the very token it reported stale when the leader read the cache
		// before that report; one more cycle replaces it.
		match (&reason, &result) {
			(RefreshReason::Stale(stale), Ok(credential)) if &credential.access_token == stale =>
				self.await_cycle(identity, reason).await,
			_ => result,
		}
	}

	async fn await_cycle(&self, identity: &Identity, reason: RefreshReason) -> Result<Credential> {
		let slot = self.slot(identity);
		let (tx, rx) = oneshot::channel();

		match slot.enlist(Waiter::Channel(tx)) {
			Some(leadership) => match Handle::try_current() {
				Ok(runtime) => self.spawn_leader(&runtime, identity, slot, leadership, reason),
				// Outside a tokio runtime there is nothing to detach onto.
				Err(_) => self.lead(identity, slot, leadership, reason).await,
			},
			None => {
				drop(slot);
				self.record_joined();
			},
		}

		rx.await.unwrap_or_else(|_| Err(state::abandoned()))
	}

	fn spawn_leader(
		&self,
		runtime: &Handle,
		identity: &Identity,
		slot: Arc<IdentitySlot>,
		leadership: Leadership,
		reason: RefreshReason,
	) {
		let coordinator = self.clone();
		let identity = identity.clone();
		let span = OpSpan::new(OpKind::Refresh, "lead", Some(&identity));

		runtime.spawn(span.instrument(async move {
			coordinator.lead(&identity, slot, leadership, reason).await;
		}));
	}

	async fn lead(
		&self,
		identity: &Identity,
		slot: Arc<IdentitySlot>,
		leadership: Leadership,
		reason: RefreshReason,
	) {
		let result = self.perform_refresh(identity, &slot, &reason).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		let _waiters = leadership.complete(result);

		#[cfg(feature = "tracing")]
		tracing::debug!(waiters = _waiters, "refresh cycle fanned out");

		drop(slot);
		self.prune_slot(identity);
	}

	/// Forgets the slot of an idle identity that nobody else references and that carries no
	/// stale marker, so the map only tracks identities with something to remember.
	fn prune_slot(&self, identity: &Identity) {
		let mut slots = self.slots.lock();

		if slots.get(identity).is_some_and(|slot| Arc::strong_count(slot) == 1 && slot.is_vacant())
		{
			slots.remove(identity);
		}
	}

	async fn perform_refresh(
		&self,
		identity: &Identity,
		slot: &IdentitySlot,
		reason: &RefreshReason,
	) -> Result<Credential> {
		if reason != &RefreshReason::Forced {
			let cached = self.cached_credential(identity).await?;

			if let Some(credential) = cached.filter(|c| reason.accepts(&c.access_token)) {
				self.metrics.record_reused();

				return Ok(credential);
			}
		}

		let Some(refresh_token) =
			self.store.refresh_token(identity).await?.filter(|token| !token.is_empty())
		else {
			self.request_login(identity, LoginReason::NotLoggedIn);

			return Err(Error::NotLoggedIn { identity: Some(identity.clone()) });
		};

		self.metrics.record_refresh();

		let pair = match self.operation.refresh(identity, &refresh_token).await {
			Ok(pair) => pair,
			Err(e) => {
				match &e {
					Error::NotLoggedIn { .. } =>
						self.request_login(identity, LoginReason::NotLoggedIn),
					Error::Rejected { .. } => self.request_login(identity, LoginReason::Rejected),
					_ => {},
				}

				return Err(e);
			},
		};

		if pair.access_token.is_empty() {
			return Err(Error::unexpected_message(
				"refresh operation returned an empty access token",
			));
		}

		let credential = Credential::rotated(pair, refresh_token);

		// The upstream exchange may already have consumed the old refresh token, so waiters get the
		// fresh credential even when it cannot be saved. A stale marker is kept in that case.
		match self.store.set_credential(identity, credential.clone()).await {
			Ok(()) => slot.clear_stale(),
			Err(e) => {
				self.metrics.record_persist_failure();

				#[cfg(feature = "tracing")]
				tracing::error!(error = %e, "refreshed credential could not be persisted");
				#[cfg(not(feature = "tracing"))]
				let _ = e;
			},
		}

		Ok(credential)
	}

	fn record_joined(&self) {
		self.metrics.record_joined();
		obs::record_op_outcome(OpKind::Refresh, OpOutcome::Joined);

		#[cfg(feature = "tracing")]
		tracing::trace!("joined in-flight refresh");
	}

	fn request_login(&self, identity: &Identity, reason: LoginReason) {
		#[cfg(feature = "tracing")]
		tracing::info!(?reason, "login required");

		// No subscribers is fine; the error itself still reaches every waiter.
		let _ = self.login.send(LoginRequest { identity: identity.clone(), reason });
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("identities", &self.slots.lock().len())
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

/// [`Coordinator`] bound to a single identity.
#[derive(Clone, Debug)]
pub struct IdentityTokens {
	coordinator: Coordinator,
	identity: Identity,
}
impl IdentityTokens {
	/// Identity all token calls are made for.
	pub fn identity(&self) -> &Identity {
		&self.identity
	}

	/// Underlying coordinator.
	pub fn coordinator(&self) -> &Coordinator {
		&self.coordinator
	}
}
impl TokenSource for IdentityTokens {
	fn cached_access_token(&self) -> TokenFuture<'_, Option<TokenSecret>> {
		Box::pin(self.coordinator.cached_access_token(&self.identity))
	}

	fn access_token(&self) -> TokenFuture<'_, TokenSecret> {
		Box::pin(async move {
			Ok(self.coordinator.get_token(&self.identity).await?.access_token)
		})
	}

	fn renew_access_token<'a>(&'a self, invalid: &'a str) -> TokenFuture<'a, TokenSecret> {
		Box::pin(async move {
			self.coordinator.invalidate(&self.identity, invalid).await?;

			Ok(self.coordinator.request_refresh(&self.identity, Some(invalid)).await?.access_token)
		})
	}
}

fn record_result<T>(kind: OpKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_op_outcome(kind, OpOutcome::Success),
		Err(_) => obs::record_op_outcome(kind, OpOutcome::Failure),
	}
}

//! Per-identity refresh state and the waiter queue it guards.

// std
use std::mem;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
};

/// Continuation invoked exactly once with the outcome of the refresh it joined.
pub type RefreshCallback = Box<dyn FnOnce(Result<Credential>) + Send>;

pub(crate) enum Waiter {
	/// Awaited by async callers; blocking callers park on it through the runtime handle.
	Channel(oneshot::Sender<Result<Credential>>),
	Callback(RefreshCallback),
}
impl Waiter {
	fn resolve(self, result: Result<Credential>) {
		match self {
			// The receiver may have been dropped by a cancelled caller.
			Waiter::Channel(tx) => {
				let _ = tx.send(result);
			},
			Waiter::Callback(callback) => callback(result),
		}
	}
}

#[derive(Default)]
enum RefreshState {
	#[default]
	Idle,
	Fetching {
		waiters: Vec<Waiter>,
	},
}

#[derive(Default)]
struct SlotState {
	refresh: RefreshState,
	stale: Option<TokenSecret>,
}

/// Refresh state for one identity. Only state transitions happen under the lock.
#[derive(Default)]
pub(crate) struct IdentitySlot(Mutex<SlotState>);
impl IdentitySlot {
	/// Queues `waiter`; returns the leadership token when this call moved the slot out of `Idle`.
	pub(crate) fn enlist(self: &Arc<Self>, waiter: Waiter) -> Option<Leadership> {
		let mut state = self.0.lock();

		if let RefreshState::Fetching { waiters } = &mut state.refresh {
			waiters.push(waiter);

			return None;
		}

		state.refresh = RefreshState::Fetching { waiters: vec![waiter] };

		Some(Leadership { slot: Arc::clone(self), completed: false })
	}

	pub(crate) fn is_fetching(&self) -> bool {
		matches!(self.0.lock().refresh, RefreshState::Fetching { .. })
	}

	pub(crate) fn pending(&self) -> usize {
		match &self.0.lock().refresh {
			RefreshState::Idle => 0,
			RefreshState::Fetching { waiters } => waiters.len(),
		}
	}

	pub(crate) fn is_stale(&self, token: &TokenSecret) -> bool {
		self.0.lock().stale.as_ref() == Some(token)
	}

	pub(crate) fn mark_stale(&self, token: TokenSecret) {
		self.0.lock().stale = Some(token);
	}

	pub(crate) fn clear_stale(&self) {
		self.0.lock().stale = None;
	}

	/// `true` when the slot is idle and remembers no stale token, so it can be forgotten.
	pub(crate) fn is_vacant(&self) -> bool {
		let state = self.0.lock();

		matches!(state.refresh, RefreshState::Idle) && state.stale.is_none()
	}

	/// Takes every queued waiter and resets the slot to `Idle` in one critical section.
	fn drain(&self) -> Vec<Waiter> {
		match mem::take(&mut self.0.lock().refresh) {
			RefreshState::Idle => Vec::new(),
			RefreshState::Fetching { waiters } => waiters,
		}
	}
}

/// Proof that the holder owns the in-flight refresh for one identity.
///
/// The leader runs detached from its callers, so this is only dropped uncompleted when the refresh
/// task panics or its runtime shuts down. Every waiter then gets an "abandoned" error instead of
/// staying suspended.
pub(crate) struct Leadership {
	slot: Arc<IdentitySlot>,
	completed: bool,
}
impl Leadership {
	/// Fans `result` out to every queued waiter and returns how many were resolved.
	pub(crate) fn complete(mut self, result: Result<Credential>) -> usize {
		self.completed = true;

		fan_out(self.slot.drain(), result)
	}
}
impl Drop for Leadership {
	fn drop(&mut self) {
		if !self.completed {
			fan_out(self.slot.drain(), Err(abandoned()));
		}
	}
}

pub(crate) fn abandoned() -> Error {
	Error::unexpected_message("refresh abandoned before completion")
}

fn fan_out(waiters: Vec<Waiter>, result: Result<Credential>) -> usize {
	let count = waiters.len();

	for waiter in waiters {
		waiter.resolve(result.clone());
	}

	count
}

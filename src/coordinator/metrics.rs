// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing coordinator activity across all identities.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	refreshes: AtomicU64,
	joined: AtomicU64,
	reused: AtomicU64,
	failures: AtomicU64,
	invalidations: AtomicU64,
	persist_failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns how many times the refresh operation was actually invoked.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns how many callers queued behind an in-flight refresh instead of starting one.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns how many refresh cycles were answered from a token cached in the meantime.
	pub fn reused(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	/// Returns how many refresh cycles ended in an error (including `NotLoggedIn`).
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns how many access tokens were invalidated.
	pub fn invalidations(&self) -> u64 {
		self.invalidations.load(Ordering::Relaxed)
	}

	/// Returns how many refreshed credentials were handed to waiters but could not be saved.
	pub fn persist_failures(&self) -> u64 {
		self.persist_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reused(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_invalidation(&self) {
		self.invalidations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_persist_failure(&self) {
		self.persist_failures.fetch_add(1, Ordering::Relaxed);
	}
}

//! Single-flight OAuth 2.0 credential refresh for one logical identity: cached bearer tokens,
//! deduplicated upstream refreshes, and a one-shot 401 retry layer for outbound HTTP.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod account;
pub mod auth;
pub mod coordinator;
pub mod error;
pub mod ext;
pub mod http;
pub mod middleware;
pub mod obs;
pub mod refresh;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	#[cfg(feature = "reqwest")]
	use crate::{
		http::ReqwestHttpClient,
		refresh::{TokenEndpoint, TokenEndpointConfig},
	};
	use crate::{
		auth::{Identity, TokenPair, TokenSecret},
		coordinator::Coordinator,
		refresh::{RefreshFuture, RefreshOperation},
		store::MemoryStore,
	};

	/// Scripted [`RefreshOperation`] that counts invocations and can hold every call at a gate
	/// until the test releases it.
	#[derive(Debug)]
	pub struct ScriptedRefresh {
		calls: AtomicUsize,
		outcome: Mutex<Result<TokenPair>>,
		gate: Option<Arc<tokio::sync::Semaphore>>,
	}
	impl ScriptedRefresh {
		/// Answers every call with the provided token pair.
		pub fn succeeding(pair: TokenPair) -> Self {
			Self { calls: AtomicUsize::new(0), outcome: Mutex::new(Ok(pair)), gate: None }
		}

		/// Answers every call with the provided error.
		pub fn failing(err: Error) -> Self {
			Self { calls: AtomicUsize::new(0), outcome: Mutex::new(Err(err)), gate: None }
		}

		/// Holds each call until [`ScriptedRefresh::release`] adds a permit.
		pub fn gated(mut self) -> Self {
			self.gate = Some(Arc::new(tokio::sync::Semaphore::new(0)));

			self
		}

		/// Lets `count` held calls proceed.
		pub fn release(&self, count: usize) {
			if let Some(gate) = &self.gate {
				gate.add_permits(count);
			}
		}

		/// Replaces the scripted outcome for subsequent calls.
		pub fn set_outcome(&self, outcome: Result<TokenPair>) {
			*self.outcome.lock() = outcome;
		}

		/// Returns the number of times the operation was invoked.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl RefreshOperation for ScriptedRefresh {
		fn refresh<'a>(
			&'a self,
			_identity: &'a Identity,
			_refresh_token: &'a TokenSecret,
		) -> RefreshFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				if let Some(gate) = &self.gate {
					gate.acquire()
						.await
						.expect("Scripted refresh gate should stay open during tests.")
						.forget();
				}

				self.outcome.lock().clone()
			})
		}
	}

	/// Builds an identity fixture from raw strings.
	pub fn identity(name: &str, account_type: &str) -> Identity {
		Identity::parse(name, account_type).expect("Identity fixture should be valid.")
	}

	/// Constructs a [`Coordinator`] backed by an in-memory store and the scripted operation.
	pub fn build_test_coordinator(
		operation: ScriptedRefresh,
	) -> (Coordinator, Arc<MemoryStore>, Arc<ScriptedRefresh>) {
		let store = Arc::new(MemoryStore::default());
		let operation = Arc::new(operation);
		let coordinator = Coordinator::new(store.clone(), operation.clone());

		(coordinator, store, operation)
	}

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Constructs a [`Coordinator`] whose refresh operation calls the configured token endpoint
	/// through [`test_reqwest_client`].
	#[cfg(feature = "reqwest")]
	pub fn build_endpoint_coordinator(
		config: TokenEndpointConfig,
	) -> (Coordinator, Arc<MemoryStore>) {
		let http_client = ReqwestHttpClient::with_client(test_reqwest_client());
		let endpoint = TokenEndpoint::<ReqwestHttpClient>::with_http_client(config, http_client)
			.expect("Token endpoint fixture should build.");
		let store = Arc::new(MemoryStore::default());
		let coordinator = Coordinator::new(store.clone(), Arc::new(endpoint));

		(coordinator, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};

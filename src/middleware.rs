//! Outbound HTTP hooks: stamp the cached bearer token before sending, and retry once with a fresh
//! token after a 401.
//!
//! [`RequestAuthInterceptor`] and [`RequestRetryAuthenticator`] are transport-agnostic; any
//! request type implementing [`RequestSigner`](crate::ext::RequestSigner) works. With the
//! `reqwest` feature, [`AuthenticatedClient`] wires both around a reqwest client.

#[cfg(feature = "reqwest")] pub mod client;
pub mod interceptor;
pub mod retry;

#[cfg(feature = "reqwest")] pub use client::*;
pub use interceptor::*;
pub use retry::*;

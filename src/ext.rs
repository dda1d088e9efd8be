//! Transport-agnostic seams between the coordinator and outbound HTTP.
//!
//! [`RequestSigner`] reads and writes the bearer credential on any request type, and
//! [`TokenSource`] is the token provider the middleware consumes. Both are implemented for the
//! crate's own types and can be implemented for custom HTTP stacks or account models.

pub mod request_signer;
pub mod token_source;

pub use request_signer::*;
pub use token_source::*;

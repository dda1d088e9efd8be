//! Token secrets and the credential pairs built from them.

pub mod credential;
pub mod secret;

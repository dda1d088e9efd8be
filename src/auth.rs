//! Auth-domain identifiers, token secrets, credentials, and account metadata.

pub mod data;
pub mod id;
pub mod token;

pub use data::*;
pub use id::*;
pub use token::{credential::*, secret::*};

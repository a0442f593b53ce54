//! Credential and token types.
//!
//! Every type here holds a secret and redacts it from `Debug` output.

mod credentials;
mod tokens;

pub use credentials::Credentials;
pub use tokens::{AccessToken, RefreshToken};

//! Registration Protocol Module
//!
//! Register, re-register and unregister semantics, plus secret issuance.

pub mod registration;
pub mod secret;

pub use registration::*;
pub use secret::{generate_secret, secrets_match};

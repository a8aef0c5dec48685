//! API Module
//!
//! Provides the broker's REST API and the server that runs it.

pub mod form;
pub mod rest;
pub mod server;

pub use form::FormFields;
pub use rest::*;
pub use server::*;

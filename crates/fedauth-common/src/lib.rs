//! Common building blocks for the fedauth federated login crates.
//!
//! Nothing in here knows about OAuth: this crate only carries the HTTP client
//! abstraction used for every outbound provider call and the generic session
//! persistence traits the HTTP bindings use to keep login state between
//! redirects.

#![warn(missing_docs)]

/// HTTP client abstraction used by fedauth crates.
pub mod http_client;
/// Generic session storage traits and utilities.
pub mod session;

pub use http_client::{ClientOptions, HttpClient};
pub use session::{MemorySessionStore, SessionStore, SessionStoreError};

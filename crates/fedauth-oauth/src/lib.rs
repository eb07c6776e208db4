//! Federated login flows for web applications.
//!
//! Every provider adapter implements [`router::FederatedRouter`]: build the
//! authorization URL, describe its routes, fetch a token from the inbound
//! callback, and hand that token to the application's completion. Three flow
//! families sit behind that contract:
//!
//! - [`flows::AuthorizationCodeFlow`]: OAuth2 `code` exchange (GitHub, Google, ...)
//! - [`flows::RequestTokenFlow`]: OAuth1-style request token with PLAINTEXT
//!   signing (4shared)
//! - [`flows::PollFlow`]: self-hosted login polling (Nextcloud login flow v2)
//!
//! HTTP framework bindings live in `fedauth-axum`.

pub mod config;
pub mod credentials;
pub mod error;
pub mod flows;
pub mod providers;
pub mod registry;
pub mod request;
pub mod router;
pub mod session;
pub mod signature;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod mock;

pub use config::FlowConfig;
pub use credentials::{CredentialsProvider, Environment, ProviderCredentials};
pub use error::{ConfigError, OAuthError, Result};
pub use registry::{ProviderId, ServiceRegistry};
pub use flows::{AuthorizationCodeFlow, PollFlow, RequestTokenFlow};
pub use providers::{CodeProvider, PollProvider, RequestTokenProvider, TokenRequestStyle};
pub use router::{
    CallbackCompletion, FederatedRouter, PollStatus, RequestContext, RouteKind, RouteSpec,
    RouteTable,
};
pub use session::{Session, SessionData};

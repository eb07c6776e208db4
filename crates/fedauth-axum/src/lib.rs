//! Axum bindings for fedauth login flows.
//!
//! Register each flow with [`routes::FederatedRoutes`], then layer the
//! resulting router with [`session::session_middleware`] so the flows can keep
//! their state between the redirect and the callback.
//!
//! ```no_run
//! use axum::{Json, middleware};
//! use fedauth_common::ClientOptions;
//! use fedauth_axum::{FederatedRoutes, Registration, SessionLayerState, session_middleware};
//! use fedauth_oauth::{
//!     AuthorizationCodeFlow, CodeProvider, Environment, FlowConfig, Session,
//! };
//! use miette::IntoDiagnostic;
//! use smol_str::SmolStr;
//!
//! # fn main() -> miette::Result<()> {
//! let flow = AuthorizationCodeFlow::from_source(
//!     ClientOptions::default().build_reqwest().into_diagnostic()?,
//!     CodeProvider::github(),
//!     &Environment,
//!     FlowConfig::with_callback("/auth/github/callback"),
//! )?;
//! let completion = |session: Session, _token: SmolStr| async move {
//!     Json(session.active_provider().await)
//! };
//! let app: axum::Router = FederatedRoutes::new()
//!     .register(Registration::new(flow, "/auth/github", completion))?
//!     .into_router()
//!     .layer(middleware::from_fn_with_state(
//!         SessionLayerState::memory(),
//!         session_middleware,
//!     ));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod routes;
pub mod session;

pub use error::{ErrorResponse, SessionError};
pub use routes::{FederatedRoutes, PreRedirectHook, Registration};
pub use session::{ExtractSession, SessionLayerState, session_middleware};

use http::StatusCode;
use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error;

use crate::request::RequestError;

/// Problems that keep a provider from being registered at all.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A credential entry is absent from the configuration source
    #[error("missing configuration entry `{0}`")]
    #[diagnostic(
        code(fedauth_oauth::config::missing_variable),
        help("set the provider's client id and client secret before registering its routes")
    )]
    MissingVariable(SmolStr),

    /// Two routes were registered under the same path
    #[error("route `{0}` is already registered")]
    #[diagnostic(
        code(fedauth_oauth::config::duplicate_route),
        help("every provider needs its own authenticate and callback paths")
    )]
    DuplicateRoute(SmolStr),

    /// A route path that the HTTP router cannot bind
    #[error("route path `{0}` must start with `/`")]
    #[diagnostic(code(fedauth_oauth::config::invalid_route))]
    InvalidRoutePath(SmolStr),

    /// A configured endpoint is not a valid URL
    #[error("invalid endpoint URL `{url}`")]
    #[diagnostic(code(fedauth_oauth::config::invalid_url))]
    InvalidUrl {
        url: SmolStr,
        #[source]
        source: url::ParseError,
    },
}

/// Errors surfaced by the login flows.
///
/// Everything except [`OAuthError::Config`] is request-local: it fails the
/// current HTTP request and nothing else.
#[derive(Debug, Error, Diagnostic)]
pub enum OAuthError {
    /// Provider configuration is unusable
    #[error(transparent)]
    #[diagnostic(code(fedauth_oauth::configuration))]
    Config(#[from] ConfigError),

    /// No login state for the requested value
    #[error("{0}")]
    #[diagnostic(code(fedauth_oauth::unauthenticated))]
    Unauthenticated(SmolStr),

    /// The active provider never issues the requested kind of value
    #[error("OAuth provider '{provider}' uses no {what}")]
    #[diagnostic(code(fedauth_oauth::unsupported_operation))]
    UnsupportedOperation { provider: SmolStr, what: SmolStr },

    /// The provider redirected back with an `error` parameter
    #[error("{0}")]
    #[diagnostic(code(fedauth_oauth::provider_rejected))]
    ProviderRejected(SmolStr),

    /// An expected callback parameter or the pending exchange state is absent
    #[error("{0}")]
    #[diagnostic(
        code(fedauth_oauth::malformed_callback),
        help("the login link may have been tampered with or already used; start the login again")
    )]
    MalformedCallback(SmolStr),

    /// A provider call failed or answered with something unusable
    #[error(transparent)]
    #[diagnostic(code(fedauth_oauth::upstream))]
    Upstream(#[from] RequestError),

    /// A structured session value could not be encoded or decoded
    #[error("session value `{key}` is unreadable")]
    #[diagnostic(code(fedauth_oauth::internal_state))]
    InternalState {
        key: SmolStr,
        #[source]
        source: serde_json::Error,
    },
}

impl OAuthError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated(SmolStr::new_static("User currently not authenticated"))
    }

    pub fn malformed(message: impl Into<SmolStr>) -> Self {
        Self::MalformedCallback(message.into())
    }

    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::UnsupportedOperation { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::ProviderRejected(_) | Self::MalformedCallback(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Upstream(_) | Self::InternalState { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable name for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigurationError",
            Self::Unauthenticated(_) => "Unauthenticated",
            Self::UnsupportedOperation { .. } => "UnsupportedOperation",
            Self::ProviderRejected(_) => "ProviderRejected",
            Self::MalformedCallback(_) => "MalformedCallback",
            Self::Upstream(_) => "UpstreamFailure",
            Self::InternalState { .. } => "InternalState",
        }
    }
}

pub type Result<T> = core::result::Result<T, OAuthError>;

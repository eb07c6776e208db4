use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use fedauth_oauth::{ConfigError, OAuthError};
use serde_json::json;
use thiserror::Error;

/// A login flow failure rendered as `{"error": code, "message": text}`.
#[derive(Debug)]
pub struct ErrorResponse(pub OAuthError);

impl From<OAuthError> for ErrorResponse {
    fn from(err: OAuthError) -> Self {
        Self(err)
    }
}

impl From<ConfigError> for ErrorResponse {
    fn from(err: ConfigError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = self.0.to_string();
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "federated login failed");
        } else {
            tracing::warn!("federated login rejected: {}", message);
        }
        json_error(status, self.0.code(), message)
    }
}

/// Failures of the session plumbing itself.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum SessionError {
    /// A handler asked for the session but no session middleware ran
    #[error("session middleware not configured")]
    #[diagnostic(
        code(fedauth_axum::session::missing_middleware),
        help("layer the router with `session_middleware`")
    )]
    MissingMiddleware,

    /// The session store refused to save
    #[error("failed to persist session")]
    #[diagnostic(code(fedauth_axum::session::store))]
    Store(#[from] fedauth_common::SessionStoreError),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self, "session unavailable");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalState",
            self.to_string(),
        )
    }
}

fn json_error(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        Json(json!({
            "error": code,
            "message": message,
        })),
    )
        .into_response()
}

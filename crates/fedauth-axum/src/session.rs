//! Cookie-keyed sessions for the login routes.
//!
//! [`session_middleware`] loads the [`Session`] named by the session cookie
//! (or starts a fresh one), makes it available to handlers through
//! [`ExtractSession`], and saves it back once the handler is done.
//!
//! ```no_run
//! use axum::{Router, middleware, routing::get};
//! use fedauth_axum::session::{ExtractSession, SessionLayerState, session_middleware};
//!
//! async fn whoami(ExtractSession(session): ExtractSession) -> String {
//!     format!("{:?}", session.active_provider().await)
//! }
//!
//! let app: Router = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(middleware::from_fn_with_state(
//!         SessionLayerState::memory(),
//!         session_middleware,
//!     ));
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use fedauth_common::{MemorySessionStore, SessionStore};
use fedauth_oauth::{Session, SessionData, utils::generate_session_id};
use smol_str::{SmolStr, format_smolstr};

use crate::error::SessionError;

pub const DEFAULT_COOKIE_NAME: &str = "fedauth_session";

/// Idle time after which an in-memory session is forgotten.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Store and cookie settings shared by every request.
#[derive(Clone)]
pub struct SessionLayerState {
    store: Arc<dyn SessionStore<SmolStr, SessionData>>,
    cookie_name: SmolStr,
    secure: bool,
}

impl SessionLayerState {
    pub fn new(store: impl SessionStore<SmolStr, SessionData> + 'static) -> Self {
        Self {
            store: Arc::new(store),
            cookie_name: SmolStr::new_static(DEFAULT_COOKIE_NAME),
            secure: false,
        }
    }

    /// Sessions kept in process memory for [`DEFAULT_SESSION_LIFETIME`].
    pub fn memory() -> Self {
        Self::new(MemorySessionStore::<SmolStr, SessionData>::with_lifetime(
            DEFAULT_SESSION_LIFETIME,
        ))
    }

    /// Mark the cookie `Secure`. Browsers then only send it over HTTPS.
    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn set_cookie(&self, id: &str) -> Option<HeaderValue> {
        let secure = if self.secure { "; Secure" } else { "" };
        let cookie = format_smolstr!(
            "{}={id}; HttpOnly; SameSite=Lax; Path=/{secure}",
            self.cookie_name
        );
        HeaderValue::from_str(&cookie).ok()
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<SmolStr> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| SmolStr::new(value))
}

/// Loads the cookie's session, runs the handler, then stores the session.
///
/// A session whose access token changed during the request is moved to a
/// fresh id, so an id handed out before login never names a logged-in
/// session. A session emptied by the handler is deleted.
pub async fn session_middleware(
    State(state): State<SessionLayerState>,
    mut req: Request,
    next: Next,
) -> Response {
    let known = match cookie_value(req.headers(), &state.cookie_name) {
        Some(id) => state.store.get(&id).await.map(|data| (id, data)),
        None => None,
    };
    let (previous, data) = match known {
        Some((id, data)) => (Some(id), data),
        None => (None, SessionData::default()),
    };
    let token_before = data.access_token().ok().map(SmolStr::new);

    let session = Session::new(data);
    req.extensions_mut().insert(session.clone());
    let mut response = next.run(req).await;

    let data = session.snapshot().await;
    let logged_in = data.access_token().ok().is_some_and(|token| {
        token_before.as_deref() != Some(token)
    });
    let id = match previous.clone() {
        Some(id) if data.is_empty() => {
            if let Err(e) = state.store.del(&id).await {
                return SessionError::from(e).into_response();
            }
            return response;
        }
        None if data.is_empty() => return response,
        Some(id) if !logged_in => id,
        Some(id) => {
            if let Err(e) = state.store.del(&id).await {
                return SessionError::from(e).into_response();
            }
            tracing::debug!("rotated session id after login");
            generate_session_id()
        }
        None => generate_session_id(),
    };
    let issue_cookie = previous.as_ref() != Some(&id);
    if let Err(e) = state.store.set(id.clone(), data).await {
        return SessionError::from(e).into_response();
    }
    if issue_cookie {
        if let Some(cookie) = state.set_cookie(&id) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// The current request's session. Requires [`session_middleware`].
#[derive(Debug, Clone)]
pub struct ExtractSession(pub Session);

impl<S> FromRequestParts<S> for ExtractSession
where
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(ExtractSession)
            .ok_or(SessionError::MissingMiddleware)
    }
}

//! The contract every provider adapter implements, and the route bookkeeping
//! around it.

use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use smol_str::{SmolStr, format_smolstr};

use crate::config::FlowConfig;
use crate::error::{ConfigError, OAuthError, Result};
use crate::registry::ProviderId;
use crate::session::Session;

/// What a flow may read from the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    query: Vec<(SmolStr, SmolStr)>,
    referer: Option<SmolStr>,
}

impl RequestContext {
    pub fn new(query: Vec<(SmolStr, SmolStr)>) -> Self {
        Self {
            query,
            referer: None,
        }
    }

    /// Parse a raw query string. Undecodable input yields an empty context.
    pub fn from_query(raw: &str) -> Self {
        Self::new(serde_html_form::from_str(raw).unwrap_or_default())
    }

    pub fn with_referer(mut self, referer: impl Into<SmolStr>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// First value for `key`, if any. Empty values count as absent.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// The callback URL to hand to the provider for this request, made
    /// absolute from the referer when the configured one is relative.
    pub fn redirect_uri(&self, config: &FlowConfig) -> SmolStr {
        match self.referer() {
            Some(referer) => {
                let mut config = config.clone();
                config.upgrade_relative_callback(referer);
                config.callback_url().into()
            }
            None => config.callback_url().into(),
        }
    }
}

/// Read the parameter a provider returns on success.
///
/// When it is absent the provider's own `error` text wins, then a message
/// naming the parameter.
pub fn callback_param(ctx: &RequestContext, key: &str) -> Result<SmolStr> {
    if let Some(value) = ctx.query(key) {
        return Ok(value.into());
    }
    match ctx.query("error") {
        Some(error) => Err(OAuthError::ProviderRejected(error.into())),
        None => Err(OAuthError::malformed(format_smolstr!("missing {key} parameter"))),
    }
}

/// Application code run with the final access token once the session has been
/// updated. Its output becomes the HTTP response.
pub trait CallbackCompletion<R>: Send + Sync {
    fn complete(&self, session: Session, access_token: SmolStr) -> impl Future<Output = R> + Send;
}

impl<R, F, Fut> CallbackCompletion<R> for F
where
    F: Fn(Session, SmolStr) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send,
{
    fn complete(&self, session: Session, access_token: SmolStr) -> impl Future<Output = R> + Send {
        self(session, access_token)
    }
}

/// Result of one visit to a poll route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The external login finished; the session now holds the token.
    Complete,
    /// The user has not finished yet; try again later.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Authenticate,
    Callback,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub path: SmolStr,
    pub kind: RouteKind,
}

impl RouteSpec {
    pub fn new(path: impl Into<SmolStr>, kind: RouteKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A federated login adapter for one provider.
#[async_trait]
pub trait FederatedRouter: Send + Sync {
    fn provider(&self) -> &ProviderId;

    /// Human-readable provider name used in error messages.
    fn display_name(&self) -> &str {
        self.provider().as_str()
    }

    fn config(&self) -> &FlowConfig;

    /// Routes this flow needs. Every flow has an authenticate and a callback
    /// route; the callback path comes from the configured callback URL.
    fn routes(&self, authenticate_path: &str) -> Vec<RouteSpec> {
        vec![
            RouteSpec::new(authenticate_path, RouteKind::Authenticate),
            RouteSpec::new(self.config().callback_path(), RouteKind::Callback),
        ]
    }

    /// Where to send the browser from the authenticate route.
    async fn authorization_url(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr>;

    /// Turn the inbound callback into an access token.
    async fn fetch_token(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr>;

    /// Fetch the token, record it with this provider as the active one, then
    /// run the application's completion.
    async fn callback<R, C>(
        &self,
        ctx: &RequestContext,
        session: &Session,
        completion: &C,
    ) -> Result<R>
    where
        R: Send,
        C: CallbackCompletion<R>,
    {
        let token = self.fetch_token(ctx, session).await?;
        session
            .write()
            .await
            .complete_login(token.as_str(), self.provider());
        Ok(completion.complete(session.clone(), token).await)
    }

    /// Check on an asynchronous login. Only poll flows support this.
    async fn poll(&self, _ctx: &RequestContext, _session: &Session) -> Result<PollStatus> {
        Err(OAuthError::UnsupportedOperation {
            provider: self.provider().as_str().into(),
            what: SmolStr::new_static("login polling"),
        })
    }
}

/// Paths already bound, across every registered provider.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    paths: BTreeSet<SmolStr>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every path in `routes`, or none of them.
    pub fn claim(&mut self, routes: &[RouteSpec]) -> core::result::Result<(), ConfigError> {
        let mut pending = BTreeSet::new();
        for route in routes {
            if !route.path.starts_with('/') {
                return Err(ConfigError::InvalidRoutePath(route.path.clone()));
            }
            if self.paths.contains(&route.path) || !pending.insert(route.path.clone()) {
                return Err(ConfigError::DuplicateRoute(route.path.clone()));
            }
        }
        self.paths.extend(pending);
        Ok(())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

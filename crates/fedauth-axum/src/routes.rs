//! Binding flows to axum routes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    Router,
    extract::RawQuery,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use fedauth_oauth::{
    CallbackCompletion, ConfigError, FederatedRouter, OAuthError, PollStatus, RequestContext,
    RouteKind, RouteTable, ServiceRegistry, Session,
};
use smol_str::SmolStr;

use crate::error::ErrorResponse;
use crate::session::ExtractSession;

pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), OAuthError>> + Send>>;

/// Runs on the authenticate route before the authorization URL is computed.
/// An error aborts the redirect.
pub type PreRedirectHook = Arc<dyn Fn(Session) -> HookFuture + Send + Sync>;

/// One flow, the path users start from, and the application's completion.
pub struct Registration<F, C> {
    flow: F,
    authenticate_path: SmolStr,
    completion: C,
    hook: Option<PreRedirectHook>,
}

impl<F, C> Registration<F, C> {
    pub fn new(flow: F, authenticate_path: impl Into<SmolStr>, completion: C) -> Self {
        Self {
            flow,
            authenticate_path: authenticate_path.into(),
            completion,
            hook: None,
        }
    }

    pub fn pre_redirect<H, Fut>(mut self, hook: H) -> Self
    where
        H: Fn(Session) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), OAuthError>> + Send + 'static,
    {
        let hook: PreRedirectHook =
            Arc::new(move |session: Session| -> HookFuture { Box::pin(hook(session)) });
        self.hook = Some(hook);
        self
    }
}

/// Routes for every registered provider, plus the bookkeeping that keeps
/// their paths apart.
pub struct FederatedRoutes<S = ()> {
    router: Router<S>,
    table: RouteTable,
    registry: ServiceRegistry,
}

impl<S> Default for FederatedRoutes<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            router: Router::new(),
            table: RouteTable::new(),
            registry: ServiceRegistry::new(),
        }
    }
}

impl<S> FederatedRoutes<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the flow's routes. Fails without touching the router when any
    /// of its paths is already taken.
    pub fn register<F, C, R>(mut self, registration: Registration<F, C>) -> Result<Self, ConfigError>
    where
        F: FederatedRouter + 'static,
        C: CallbackCompletion<R> + 'static,
        R: IntoResponse + Send + 'static,
    {
        let Registration {
            flow,
            authenticate_path,
            completion,
            hook,
        } = registration;
        let specs = flow.routes(&authenticate_path);
        self.table.claim(&specs)?;
        self.registry
            .register(flow.provider().clone(), flow.display_name());
        tracing::info!(
            provider = %flow.provider(),
            paths = ?specs.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(),
            "registered federated login routes"
        );

        let flow = Arc::new(flow);
        let completion = Arc::new(completion);
        for spec in specs {
            let route: MethodRouter<S> = match spec.kind {
                RouteKind::Authenticate => {
                    let flow = flow.clone();
                    let hook = hook.clone();
                    get(
                        move |ExtractSession(session): ExtractSession,
                              headers: HeaderMap,
                              RawQuery(query): RawQuery| async move {
                            authenticate(&*flow, hook.as_ref(), session, context(&headers, query))
                                .await
                        },
                    )
                }
                RouteKind::Callback => {
                    let flow = flow.clone();
                    let completion = completion.clone();
                    get(
                        move |ExtractSession(session): ExtractSession,
                              headers: HeaderMap,
                              RawQuery(query): RawQuery| async move {
                            let ctx = context(&headers, query);
                            callback::<F, C, R>(&*flow, &*completion, session, ctx).await
                        },
                    )
                }
                RouteKind::Poll => {
                    let flow = flow.clone();
                    get(
                        move |ExtractSession(session): ExtractSession,
                              headers: HeaderMap,
                              RawQuery(query): RawQuery| async move {
                            poll(&*flow, session, context(&headers, query)).await
                        },
                    )
                }
            };
            self.router = self.router.route(&spec.path, route);
        }
        Ok(self)
    }

    /// Providers registered so far.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }
}

fn context(headers: &HeaderMap, query: Option<String>) -> RequestContext {
    let ctx = RequestContext::from_query(query.as_deref().unwrap_or_default());
    match headers.get(header::REFERER).and_then(|v| v.to_str().ok()) {
        Some(referer) => ctx.with_referer(referer),
        None => ctx,
    }
}

async fn authenticate<F: FederatedRouter>(
    flow: &F,
    hook: Option<&PreRedirectHook>,
    session: Session,
    ctx: RequestContext,
) -> Result<Response, ErrorResponse> {
    if let Some(hook) = hook {
        (**hook)(session.clone()).await?;
    }
    let url = flow.authorization_url(&ctx, &session).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url.as_str())]).into_response())
}

async fn callback<F, C, R>(
    flow: &F,
    completion: &C,
    session: Session,
    ctx: RequestContext,
) -> Result<Response, ErrorResponse>
where
    F: FederatedRouter,
    C: CallbackCompletion<R>,
    R: IntoResponse + Send,
{
    let output = flow.callback(&ctx, &session, completion).await?;
    Ok(output.into_response())
}

async fn poll<F: FederatedRouter>(
    flow: &F,
    session: Session,
    ctx: RequestContext,
) -> Result<Response, ErrorResponse> {
    Ok(match flow.poll(&ctx, &session).await? {
        PollStatus::Complete => (StatusCode::OK, "OK").into_response(),
        PollStatus::Pending => (StatusCode::ACCEPTED, "pending").into_response(),
    })
}

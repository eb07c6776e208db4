use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, middleware, routing::get};
use axum_test::TestServer;
use fedauth_axum::{
    ErrorResponse, ExtractSession, FederatedRoutes, Registration, SessionLayerState,
    session_middleware,
};
use fedauth_common::HttpClient;
use fedauth_oauth::{
    AuthorizationCodeFlow, CodeProvider, ConfigError, FlowConfig, OAuthError, PollFlow,
    PollProvider, ProviderCredentials, RequestTokenFlow, RequestTokenProvider, ServiceRegistry,
    Session,
};
use http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use smol_str::SmolStr;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("no canned response left")]
struct Exhausted;

/// Answers provider calls from a queue and counts them.
#[derive(Clone, Default)]
struct MockProvider {
    responses: Arc<Mutex<VecDeque<Response<Vec<u8>>>>>,
    seen: Arc<Mutex<Vec<(http::Method, String, String)>>>,
}

impl MockProvider {
    async fn push_json(&self, status: StatusCode, body: Value) {
        let res = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body).unwrap())
            .unwrap();
        self.responses.lock().await.push_back(res);
    }

    async fn push_form(&self, status: StatusCode, body: &str) {
        let res = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.as_bytes().to_vec())
            .unwrap();
        self.responses.lock().await.push_back(res);
    }

    async fn push_status(&self, status: StatusCode) {
        let res = Response::builder().status(status).body(Vec::new()).unwrap();
        self.responses.lock().await.push_back(res);
    }

    async fn calls(&self) -> Vec<(http::Method, String, String)> {
        self.seen.lock().await.clone()
    }
}

impl HttpClient for MockProvider {
    type Error = Exhausted;

    fn send_http(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl Future<Output = Result<Response<Vec<u8>>, Self::Error>> + Send {
        let responses = self.responses.clone();
        let seen = self.seen.clone();
        async move {
            let (parts, body) = request.into_parts();
            seen.lock().await.push((
                parts.method,
                parts.uri.to_string(),
                String::from_utf8(body).unwrap(),
            ));
            responses.lock().await.pop_front().ok_or(Exhausted)
        }
    }
}

fn credentials() -> ProviderCredentials {
    ProviderCredentials::new("client-id", "client-secret")
}

async fn echo_token(_: Session, token: SmolStr) -> String {
    format!("welcome {token}")
}

/// Layer a login router with sessions and a couple of inspection routes.
fn serve(routes: FederatedRoutes) -> TestServer {
    let registry: ServiceRegistry = routes.registry().clone();
    let app = routes
        .into_router()
        .route(
            "/whoami",
            get(|ExtractSession(session): ExtractSession| async move {
                let data = session.snapshot().await;
                Json(json!({
                    "access_token": data.access_token().ok(),
                    "provider": data.active_provider(),
                    "login_name": data.poll_login_name(),
                    "cloud_domain": data.cloud_domain(),
                    "hooked": data.get(&fedauth_oauth::session::TextField::new("hooked")),
                }))
            }),
        )
        .route(
            "/refresh",
            get(move |ExtractSession(session): ExtractSession| {
                let registry = registry.clone();
                async move {
                    session
                        .refresh_token(&registry)
                        .await
                        .map_err(ErrorResponse::from)
                }
            }),
        )
        .layer(middleware::from_fn_with_state(
            SessionLayerState::memory(),
            session_middleware,
        ));
    TestServer::builder().save_cookies().build(app).unwrap()
}

fn github(client: MockProvider) -> FederatedRoutes {
    let flow = AuthorizationCodeFlow::new(
        client,
        CodeProvider::github(),
        credentials(),
        FlowConfig::builder()
            .callback_url("https://app.example/auth/github/callback")
            .scope(vec!["read:user".into()])
            .build(),
    )
    .unwrap();
    FederatedRoutes::new()
        .register(Registration::new(flow, "/auth/github", echo_token))
        .unwrap()
}

#[tokio::test]
async fn code_flow_redirects_then_completes() {
    let provider = MockProvider::default();
    let server = serve(github(provider.clone()));

    let res = server.get("/auth/github").await;
    res.assert_status(StatusCode::FOUND);
    let location = res.header(header::LOCATION);
    let location = location.to_str().unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize?client_id=client-id&"));
    assert!(location.ends_with("&response_type=code"));

    provider
        .push_json(
            StatusCode::OK,
            json!({"access_token": "T", "refresh_token": "R", "token_type": "bearer"}),
        )
        .await;
    let res = server
        .get("/auth/github/callback")
        .add_query_param("code", "ABC")
        .await;
    res.assert_status_ok();
    res.assert_text("welcome T");

    let who: Value = server.get("/whoami").await.json();
    assert_eq!(who["access_token"], "T");
    assert_eq!(who["provider"], "github");
    server.get("/refresh").await.assert_text("R");

    let calls = provider.calls().await;
    assert_eq!(calls.len(), 1);
    let form: BTreeMap<String, String> = serde_html_form::from_str(&calls[0].2).unwrap();
    assert_eq!(form["code"], "ABC");
    assert_eq!(form["redirect_uri"], "https://app.example/auth/github/callback");
}

#[tokio::test]
async fn provider_error_is_a_bad_request() {
    let provider = MockProvider::default();
    let server = serve(github(provider.clone()));

    let res = server
        .get("/auth/github/callback")
        .add_query_param("error", "denied")
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
    res.assert_json(&json!({"error": "ProviderRejected", "message": "denied"}));

    let res = server.get("/auth/github/callback").await;
    res.assert_status(StatusCode::BAD_REQUEST);
    res.assert_json(&json!({"error": "MalformedCallback", "message": "missing code parameter"}));
    assert!(provider.calls().await.is_empty());
}

#[tokio::test]
async fn refresh_without_login_is_unauthenticated() {
    let server = serve(github(MockProvider::default()));
    let res = server.get("/refresh").await;
    res.assert_status(StatusCode::UNAUTHORIZED);
    res.assert_json(&json!({
        "error": "Unauthenticated",
        "message": "User currently not authenticated"
    }));
}

#[tokio::test]
async fn request_token_flow_round_trip() {
    let provider = MockProvider::default();
    let flow = RequestTokenFlow::new(
        provider.clone(),
        RequestTokenProvider::four_shared(),
        credentials(),
        FlowConfig::with_callback("/auth/4shared/callback"),
    )
    .unwrap();
    let routes = FederatedRoutes::new()
        .register(Registration::new(flow, "/auth/4shared", echo_token))
        .unwrap();
    let server = serve(routes);

    provider
        .push_form(StatusCode::OK, "oauth_token=req&oauth_token_secret=req-secret")
        .await;
    let res = server
        .get("/auth/4shared")
        .add_header(header::REFERER, "https://app.example/start")
        .await;
    res.assert_status(StatusCode::FOUND);
    let location = res.header(header::LOCATION);
    let location = url::Url::parse(location.to_str().unwrap()).unwrap();
    let query: BTreeMap<String, String> = location.query_pairs().into_owned().collect();
    assert_eq!(query["oauth_token"], "req");
    assert_eq!(query["oauth_callback"], "https://app.example/auth/4shared/callback");

    provider
        .push_form(StatusCode::OK, "oauth_token=acc&oauth_token_secret=acc-secret")
        .await;
    let res = server
        .get("/auth/4shared/callback")
        .add_query_param("oauth_token", "req")
        .await;
    res.assert_text("welcome acc");

    // the request token was single use
    let res = server
        .get("/auth/4shared/callback")
        .add_query_param("oauth_token", "req")
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let res = server.get("/refresh").await;
    res.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    res.assert_json(&json!({
        "error": "UnsupportedOperation",
        "message": "OAuth provider '4shared' uses no refresh tokens"
    }));
    assert_eq!(provider.calls().await.len(), 2);
}

#[tokio::test]
async fn poll_flow_round_trip() {
    let provider = MockProvider::default();
    let flow = PollFlow::new(
        provider.clone(),
        PollProvider::nextcloud(),
        FlowConfig::with_callback("/auth/nextcloud/callback"),
    );
    let routes = FederatedRoutes::new()
        .register(Registration::new(flow, "/auth/nextcloud", echo_token))
        .unwrap();
    let server = serve(routes);

    // nothing to poll yet
    server
        .get("/auth/nextcloud/callback/poll")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    provider
        .push_json(
            StatusCode::OK,
            json!({
                "poll": {"token": "pt", "endpoint": "https://cloud.example/login/v2/poll"},
                "login": "https://cloud.example/login/v2/flow/xyz"
            }),
        )
        .await;
    let res = server
        .get("/auth/nextcloud")
        .add_query_param("cloud", "cloud.example")
        .await;
    res.assert_status(StatusCode::FOUND);
    assert_eq!(
        res.header(header::LOCATION),
        "https://cloud.example/login/v2/flow/xyz"
    );

    server
        .get("/auth/nextcloud/callback")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    provider.push_status(StatusCode::NOT_FOUND).await;
    server
        .get("/auth/nextcloud/callback/poll")
        .await
        .assert_status(StatusCode::ACCEPTED);

    provider
        .push_json(
            StatusCode::OK,
            json!({"server": "https://cloud.example", "loginName": "alice", "appPassword": "pw"}),
        )
        .await;
    let res = server.get("/auth/nextcloud/callback/poll").await;
    res.assert_status_ok();
    res.assert_text("OK");
    assert_eq!(provider.calls().await.len(), 3);

    server
        .get("/auth/nextcloud/callback")
        .await
        .assert_text("welcome pw");
    assert_eq!(provider.calls().await.len(), 3);

    let who: Value = server.get("/whoami").await.json();
    assert_eq!(who["login_name"], "alice");
    assert_eq!(who["cloud_domain"], "https://cloud.example");
    assert_eq!(who["provider"], "nextcloud");
}

#[tokio::test]
async fn hook_runs_before_redirect() {
    let provider = MockProvider::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let flow = AuthorizationCodeFlow::new(
        provider,
        CodeProvider::gitlab(),
        credentials(),
        FlowConfig::with_callback("/auth/gitlab/callback"),
    )
    .unwrap();
    let registration = Registration::new(flow, "/auth/gitlab", echo_token).pre_redirect({
        let calls = calls.clone();
        move |session: Session| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                session
                    .write()
                    .await
                    .set(&fedauth_oauth::session::TextField::new("hooked"), "yes");
                Ok(())
            }
        }
    });
    let server = serve(FederatedRoutes::new().register(registration).unwrap());

    server
        .get("/auth/gitlab")
        .await
        .assert_status(StatusCode::FOUND);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let who: Value = server.get("/whoami").await.json();
    assert_eq!(who["hooked"], "yes");
}

#[tokio::test]
async fn failing_hook_blocks_redirect() {
    let flow = AuthorizationCodeFlow::new(
        MockProvider::default(),
        CodeProvider::box_com(),
        credentials(),
        FlowConfig::with_callback("/auth/box/callback"),
    )
    .unwrap();
    let registration = Registration::new(flow, "/auth/box", echo_token)
        .pre_redirect(|_: Session| async { Err(OAuthError::unauthenticated()) });
    let server = serve(FederatedRoutes::new().register(registration).unwrap());

    let res = server.get("/auth/box").await;
    res.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_paths_are_rejected() {
    let routes = github(MockProvider::default());
    let again = AuthorizationCodeFlow::new(
        MockProvider::default(),
        CodeProvider::google(),
        credentials(),
        FlowConfig::with_callback("/auth/github/callback"),
    )
    .unwrap();
    let err = routes
        .register(Registration::new(again, "/auth/google", echo_token))
        .err()
        .unwrap();
    assert!(matches!(err, ConfigError::DuplicateRoute(ref p) if p == "/auth/github/callback"));
}

#[tokio::test]
async fn session_requires_middleware() {
    let app = Router::new().route(
        "/whoami",
        get(|ExtractSession(_): ExtractSession| async { "unreachable" }),
    );
    let server = TestServer::new(app).unwrap();
    let res = server.get("/whoami").await;
    res.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    res.assert_json(&json!({
        "error": "InternalState",
        "message": "session middleware not configured"
    }));
}

#[tokio::test]
async fn sessions_are_not_shared_between_browsers() {
    let provider = MockProvider::default();
    let routes = github(provider.clone());
    let registry = routes.registry().clone();
    assert!(registry.is_registered(&fedauth_oauth::ProviderId::GITHUB));

    let server = serve(routes);
    provider
        .push_json(StatusCode::OK, json!({"access_token": "T"}))
        .await;
    server
        .get("/auth/github/callback")
        .add_query_param("code", "c")
        .await
        .assert_status_ok();

    let res = server.get("/whoami").clear_cookies().await;
    let who: Value = res.json();
    assert_eq!(who["access_token"], Value::Null);
}

#[tokio::test]
async fn new_sessions_get_a_cookie() {
    use tower::ServiceExt;

    let app = github(MockProvider::default())
        .into_router()
        .layer(middleware::from_fn_with_state(
            SessionLayerState::memory(),
            session_middleware,
        ));
    let req = Request::builder()
        .uri("/auth/github")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FOUND);
    let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("fedauth_session="));
    assert!(cookie.ends_with("; HttpOnly; SameSite=Lax; Path=/"));
}

#[tokio::test]
async fn idle_sessions_are_evicted() {
    use fedauth_common::MemorySessionStore;
    use fedauth_oauth::SessionData;
    use std::time::Duration;
    use tower::ServiceExt;

    let store = MemorySessionStore::<SmolStr, SessionData>::with_lifetime(Duration::ZERO);
    let app = github(MockProvider::default())
        .into_router()
        .layer(middleware::from_fn_with_state(
            SessionLayerState::new(store.clone()),
            session_middleware,
        ));
    for _ in 0..200 {
        let req = Request::builder()
            .uri("/auth/github")
            .body(axum::body::Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
    }
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn login_moves_the_session_to_a_fresh_id() {
    let provider = MockProvider::default();
    let server = serve(github(provider.clone()));

    let res = server.get("/auth/github").await;
    res.assert_status(StatusCode::FOUND);
    let before = res.cookie("fedauth_session").value().to_owned();

    provider
        .push_json(StatusCode::OK, json!({"access_token": "T"}))
        .await;
    let res = server
        .get("/auth/github/callback")
        .add_query_param("code", "c")
        .await;
    res.assert_status_ok();
    let after = res.cookie("fedauth_session").value().to_owned();
    assert_ne!(before, after);

    let who: Value = server.get("/whoami").await.json();
    assert_eq!(who["access_token"], "T");

    let stale = http::HeaderValue::from_str(&format!("fedauth_session={before}")).unwrap();
    let who: Value = server
        .get("/whoami")
        .clear_cookies()
        .add_header(header::COOKIE, stale)
        .await
        .json();
    assert_eq!(who["access_token"], Value::Null);
}

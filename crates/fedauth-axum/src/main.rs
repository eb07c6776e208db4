use axum::{Json, Router, middleware, routing::get};
use clap::Parser;
use fedauth_axum::{ExtractSession, FederatedRoutes, Registration, SessionLayerState, session_middleware};
use fedauth_common::ClientOptions;
use fedauth_oauth::{
    AuthorizationCodeFlow, CodeProvider, Environment, FederatedRouter, FlowConfig, PollFlow,
    PollProvider, ProviderId, RequestTokenFlow, RequestTokenProvider, Session,
};
use miette::{IntoDiagnostic, Result, miette};
use serde_json::json;
use smol_str::SmolStr;
use tracing_subscriber::EnvFilter;

/// Demo server for one federated login provider.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Provider to log in with (github, google, ..., 4shared, nextcloud)
    #[arg(long, default_value = "github")]
    provider: String,

    /// Callback URL registered with the provider, absolute or a path
    #[arg(long)]
    callback: Option<String>,

    /// Path that starts the login
    #[arg(long)]
    authenticate: Option<String>,

    /// Scope to request, repeatable
    #[arg(long = "scope")]
    scopes: Vec<String>,

    /// Mark the session cookie `Secure` (serve behind HTTPS)
    #[arg(long)]
    secure_cookie: bool,
}

async fn complete(session: Session, _token: SmolStr) -> Json<serde_json::Value> {
    Json(json!({
        "status": "authenticated",
        "provider": session.active_provider().await,
    }))
}

async fn whoami(ExtractSession(session): ExtractSession) -> Json<serde_json::Value> {
    let data = session.snapshot().await;
    Json(json!({
        "provider": data.active_provider(),
        "authenticated": data.access_token().is_ok(),
        "cloud_domain": data.cloud_domain(),
        "login_name": data.poll_login_name(),
    }))
}

fn register<F>(flow: F, authenticate: &str) -> Result<Router>
where
    F: FederatedRouter + 'static,
{
    let routes = FederatedRoutes::new().register(Registration::new(flow, authenticate, complete))?;
    Ok(routes.into_router())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(EnvFilter::from_env("FEDAUTH_LOG"))
        .init();
    let args = Args::parse();

    let provider = ProviderId::new(args.provider.as_str());
    let callback = args
        .callback
        .unwrap_or_else(|| format!("/auth/{provider}/callback"));
    let authenticate = args
        .authenticate
        .unwrap_or_else(|| format!("/auth/{provider}"));
    let config = FlowConfig::builder()
        .callback_url(callback)
        .scope(args.scopes.into_iter().map(SmolStr::from).collect())
        .build();
    let client = ClientOptions::default().build_reqwest().into_diagnostic()?;

    let login = if provider == ProviderId::AUTH4SHARED {
        let flow = RequestTokenFlow::from_source(
            client,
            RequestTokenProvider::four_shared(),
            &Environment,
            config,
        )?;
        register(flow, &authenticate)?
    } else if provider == ProviderId::NEXTCLOUD {
        let flow = PollFlow::from_source(client, PollProvider::nextcloud(), &Environment, config);
        register(flow, &authenticate)?
    } else {
        let descriptor = CodeProvider::find(&provider)
            .ok_or_else(|| miette!("unknown provider `{provider}`"))?;
        let flow = AuthorizationCodeFlow::from_source(client, descriptor, &Environment, config)?;
        register(flow, &authenticate)?
    };

    let app = login
        .route("/", get(|| async { "fedauth demo" }))
        .route("/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(
            SessionLayerState::memory().with_secure_cookie(args.secure_cookie),
            session_middleware,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tracing::info!(bind = %args.bind, %provider, "listening");
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

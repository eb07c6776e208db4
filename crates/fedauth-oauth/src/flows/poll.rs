use std::time::Duration;

use async_trait::async_trait;
use fedauth_common::http_client::HttpClient;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr, format_smolstr};
use url::Url;

use crate::config::FlowConfig;
use crate::credentials::{CredentialsProvider, ProviderCredentials};
use crate::error::{OAuthError, Result};
use crate::providers::PollProvider;
use crate::registry::ProviderId;
use crate::request::{self, RequestError};
use crate::router::{FederatedRouter, PollStatus, RequestContext, RouteKind, RouteSpec};
use crate::session::{JsonField, Session, SessionData, TextField};
use crate::types::{LoginFlowCredentials, LoginFlowInit, PollRequest};
use crate::utils::unix_timestamp;

/// How long a poll ticket stays usable after the login was started.
pub const TICKET_LIFETIME: Duration = Duration::from_secs(20 * 60);

/// Where and with what to poll for the result of an external login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTicket {
    pub endpoint: SmolStr,
    pub token: SmolStr,
    /// Unix seconds.
    pub issued_at: i64,
}

impl PollTicket {
    pub fn is_expired(&self, now: i64) -> bool {
        now.saturating_sub(self.issued_at) >= TICKET_LIFETIME.as_secs() as i64
    }
}

impl std::fmt::Debug for PollTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollTicket")
            .field("endpoint", &self.endpoint)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

pub const POLL_TICKET: JsonField<PollTicket> = JsonField::new("nextcloud_poll");
pub const CLOUD_DOMAIN: TextField = TextField::new("cloud_domain");
pub const POLL_LOGIN_NAME: TextField = TextField::new("nextcloud_user_id");

impl SessionData {
    /// Server the last poll login was started against.
    pub fn cloud_domain(&self) -> Option<&str> {
        self.get(&CLOUD_DOMAIN)
    }

    /// Account name reported by the server once the poll login completed.
    pub fn poll_login_name(&self) -> Option<&str> {
        self.get(&POLL_LOGIN_NAME)
    }
}

impl Session {
    pub async fn cloud_domain(&self) -> Option<String> {
        self.read().await.cloud_domain().map(str::to_owned)
    }

    pub async fn poll_login_name(&self) -> Option<String> {
        self.read().await.poll_login_name().map(str::to_owned)
    }
}

/// Strip a trailing slash and default to `https://`.
pub(crate) fn normalize_cloud(raw: &str) -> SmolStr {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_smolstr()
    } else {
        format_smolstr!("https://{trimmed}")
    }
}

/// Login against a self-hosted server chosen by the user.
///
/// The authenticate route takes a `cloud` query parameter, starts a login on
/// that server and redirects there. A separate poll route collects the app
/// password once the user is done; the callback route only hands the stored
/// token to the application.
pub struct PollFlow<C> {
    client: C,
    provider: PollProvider,
    config: FlowConfig,
    user_agent: SmolStr,
    credentials: Option<ProviderCredentials>,
}

impl<C> PollFlow<C> {
    pub fn new(client: C, provider: PollProvider, config: FlowConfig) -> Self {
        let user_agent = provider.default_user_agent.clone();
        Self {
            client,
            provider,
            config,
            user_agent,
            credentials: None,
        }
    }

    /// Reads the user agent entry and, if present, client credentials.
    /// Neither is required.
    pub fn from_source(
        client: C,
        provider: PollProvider,
        source: &impl CredentialsProvider,
        config: FlowConfig,
    ) -> Self {
        let mut flow = Self::new(client, provider, config);
        if let Some(agent) = source.credential(&flow.provider.user_agent_key) {
            flow.user_agent = agent.into();
        }
        let prefix = flow.provider.id.as_str().to_ascii_uppercase();
        flow.credentials = ProviderCredentials::load_prefixed(source, &prefix).ok();
        flow
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn credentials(&self) -> Option<&ProviderCredentials> {
        self.credentials.as_ref()
    }

    /// Path of the poll route for this flow.
    pub fn poll_path(&self) -> SmolStr {
        let callback = self.config.callback_path();
        format_smolstr!("{}/poll", callback.trim_end_matches('/'))
    }
}

#[async_trait]
impl<C> FederatedRouter for PollFlow<C>
where
    C: HttpClient + Send + Sync,
{
    fn provider(&self) -> &ProviderId {
        &self.provider.id
    }

    fn display_name(&self) -> &str {
        &self.provider.display_name
    }

    fn config(&self) -> &FlowConfig {
        &self.config
    }

    fn routes(&self, authenticate_path: &str) -> Vec<RouteSpec> {
        vec![
            RouteSpec::new(authenticate_path, RouteKind::Authenticate),
            RouteSpec::new(self.config.callback_path(), RouteKind::Callback),
            RouteSpec::new(self.poll_path(), RouteKind::Poll),
        ]
    }

    /// Starts a login on the server named by the `cloud` parameter and
    /// returns that server's login page.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(provider = %self.provider.id)))]
    async fn authorization_url(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let cloud = ctx
            .query("cloud")
            .map(normalize_cloud)
            .ok_or_else(|| OAuthError::malformed("missing cloud parameter"))?;
        let endpoint = format_smolstr!("{cloud}{}", self.provider.login_path);
        if Url::parse(&endpoint).is_err() {
            return Err(OAuthError::malformed(format_smolstr!(
                "invalid cloud domain `{cloud}`"
            )));
        }

        let req = request::form_post(&endpoint, String::new(), Some(&self.user_agent))?;
        let init: LoginFlowInit = request::provider_call(&self.client, req, StatusCode::OK).await?;

        let ticket = PollTicket {
            endpoint: init.poll.endpoint,
            token: init.poll.token,
            issued_at: unix_timestamp(),
        };
        let mut data = session.write().await;
        data.set_json(&POLL_TICKET, &ticket)?;
        data.set(&CLOUD_DOMAIN, cloud.as_str());
        Ok(init.login)
    }

    /// The poll route has already stored the token; no network call here.
    async fn fetch_token(&self, _ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let data = session.read().await;
        if data.active_provider().as_ref() != Some(&self.provider.id) {
            return Err(OAuthError::unauthenticated());
        }
        Ok(data.access_token()?.into())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(provider = %self.provider.id)))]
    async fn poll(&self, _ctx: &RequestContext, session: &Session) -> Result<PollStatus> {
        let ticket = {
            let mut data = session.write().await;
            let ticket = match data.get_json(&POLL_TICKET) {
                Ok(Some(ticket)) => ticket,
                Ok(None) => return Err(OAuthError::malformed("no login poll pending for this session")),
                Err(_) => {
                    data.remove(&POLL_TICKET);
                    return Err(OAuthError::malformed("stored poll ticket is unreadable"));
                }
            };
            if ticket.is_expired(unix_timestamp()) {
                data.remove(&POLL_TICKET);
                return Err(OAuthError::malformed("login poll expired, start the login again"));
            }
            ticket
        };

        let body = serde_html_form::to_string(PollRequest {
            token: &ticket.token,
        })
        .map_err(RequestError::from)?;
        let req = request::form_post(&ticket.endpoint, body, Some(&self.user_agent))?;
        let res = request::send(&self.client, req).await?;
        match res.status() {
            StatusCode::OK => {
                let creds: LoginFlowCredentials = request::decode_body(&res)
                    .map_err(|e| e.with_url(ticket.endpoint.clone()))?;
                #[cfg(feature = "tracing")]
                tracing::debug!(login_name = %creds.login_name, "login poll completed");
                let mut data = session.write().await;
                data.remove(&POLL_TICKET);
                data.set(&POLL_LOGIN_NAME, creds.login_name.as_str());
                data.replace_secondary(None, None);
                data.complete_login(creds.app_password.as_str(), &self.provider.id);
                Ok(PollStatus::Complete)
            }
            StatusCode::NOT_FOUND => Ok(PollStatus::Pending),
            _ => Err(request::status_error(&res)
                .with_url(ticket.endpoint.clone())
                .into()),
        }
    }
}

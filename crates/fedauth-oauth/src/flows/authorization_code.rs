use async_trait::async_trait;
use fedauth_common::http_client::HttpClient;
use http::StatusCode;
use smol_str::SmolStr;
use url::Url;

use super::parse_endpoint;
use crate::config::FlowConfig;
use crate::credentials::{CredentialsProvider, ProviderCredentials};
use crate::error::{ConfigError, Result};
use crate::providers::{CodeProvider, TokenRequestStyle};
use crate::registry::ProviderId;
use crate::request::{self, RequestError};
use crate::router::{FederatedRouter, RequestContext, callback_param};
use crate::session::{Session, TextField};
use crate::types::{
    AuthorizationCodeRequest, OAuthTokenResponse, TokenEndpointResponse, TokenGrantType,
};

/// Redirect URI sent with the authorization request. The token request has to
/// repeat it exactly.
pub(crate) const REDIRECT_URI: TextField = TextField::new("code_redirect_uri");

/// OAuth2 authorization code flow.
pub struct AuthorizationCodeFlow<C> {
    client: C,
    provider: CodeProvider,
    credentials: ProviderCredentials,
    config: FlowConfig,
    authorize_endpoint: Url,
    token_endpoint: SmolStr,
}

impl<C> AuthorizationCodeFlow<C> {
    pub fn new(
        client: C,
        provider: CodeProvider,
        credentials: ProviderCredentials,
        config: FlowConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let authorize_endpoint = parse_endpoint(&provider.authorize_endpoint)?;
        let token_endpoint = config
            .access_token_url()
            .map(SmolStr::new)
            .unwrap_or_else(|| provider.token_endpoint.clone());
        parse_endpoint(&token_endpoint)?;
        Ok(Self {
            client,
            provider,
            credentials,
            config,
            authorize_endpoint,
            token_endpoint,
        })
    }

    /// Load `{PREFIX}_CLIENT_ID` and `{PREFIX}_CLIENT_SECRET` from `source`
    /// for the provider.
    pub fn from_source(
        client: C,
        provider: CodeProvider,
        source: &impl CredentialsProvider,
        config: FlowConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let credentials = ProviderCredentials::load_prefixed(source, &provider.env_prefix)?;
        Self::new(client, provider, credentials, config)
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    fn build_authorization_url(&self, redirect_uri: &str) -> Url {
        let mut url = self.authorize_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", self.credentials.client_id())
                .append_pair("redirect_uri", redirect_uri);
            if !self.config.scope().is_empty() {
                query.append_pair("scope", &self.config.scope().join(" "));
            }
            query.append_pair("response_type", "code");
        }
        url
    }
}

#[async_trait]
impl<C> FederatedRouter for AuthorizationCodeFlow<C>
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

    async fn authorization_url(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let redirect_uri = ctx.redirect_uri(&self.config);
        let url = self.build_authorization_url(&redirect_uri);
        session.write().await.set(&REDIRECT_URI, redirect_uri.as_str());
        Ok(SmolStr::new(url.as_str()))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(provider = %self.provider.id)))]
    async fn fetch_token(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let code = callback_param(ctx, "code")?;
        let redirect_uri = session
            .write()
            .await
            .take(&REDIRECT_URI)
            .unwrap_or_else(|| self.config.callback_url().to_owned());

        let params = AuthorizationCodeRequest {
            grant_type: TokenGrantType::AuthorizationCode,
            code: &code,
            client_id: self.credentials.client_id(),
            client_secret: self.credentials.client_secret(),
            redirect_uri: &redirect_uri,
        };
        let body = serde_html_form::to_string(&params).map_err(RequestError::from)?;
        let req = match self.provider.token_request {
            TokenRequestStyle::PostForm => request::form_post(&self.token_endpoint, body, None)?,
            TokenRequestStyle::GetQuery => request::query_get(&self.token_endpoint, &body)?,
        };

        let res: TokenEndpointResponse =
            request::provider_call(&self.client, req, StatusCode::OK).await?;
        let token = OAuthTokenResponse::try_from(res)
            .map_err(|e| e.with_url(self.token_endpoint.clone()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            refresh_token = token.refresh_token.is_some(),
            "authorization code redeemed"
        );
        session
            .write()
            .await
            .replace_secondary(token.refresh_token.map(String::from), None);
        Ok(token.access_token)
    }
}

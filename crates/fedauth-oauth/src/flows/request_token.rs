use async_trait::async_trait;
use fedauth_common::http_client::HttpClient;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

use super::parse_endpoint;
use crate::config::FlowConfig;
use crate::credentials::{CredentialsProvider, ProviderCredentials};
use crate::error::{ConfigError, OAuthError, Result};
use crate::providers::RequestTokenProvider;
use crate::registry::ProviderId;
use crate::request::{self, RequestError};
use crate::router::{FederatedRouter, RequestContext, callback_param};
use crate::session::{JsonField, Session};
use crate::signature::SignatureParams;
use crate::types::TokenPair;

/// Request token issued by the initiate call, waiting for the provider to
/// send the user back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequestToken {
    pub oauth_token: SmolStr,
    pub oauth_token_secret: SmolStr,
}

impl std::fmt::Debug for PendingRequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequestToken")
            .field("oauth_token", &self.oauth_token)
            .finish_non_exhaustive()
    }
}

impl From<TokenPair> for PendingRequestToken {
    fn from(pair: TokenPair) -> Self {
        Self {
            oauth_token: pair.oauth_token,
            oauth_token_secret: pair.oauth_token_secret,
        }
    }
}

pub const REQUEST_TOKEN: JsonField<PendingRequestToken> = JsonField::new("request_token");

/// OAuth1-style flow: request token, user authorization, then a signed
/// exchange for the access token. Every signed call uses PLAINTEXT.
pub struct RequestTokenFlow<C> {
    client: C,
    provider: RequestTokenProvider,
    credentials: ProviderCredentials,
    config: FlowConfig,
    authorize_endpoint: Url,
}

impl<C> RequestTokenFlow<C> {
    pub fn new(
        client: C,
        provider: RequestTokenProvider,
        credentials: ProviderCredentials,
        config: FlowConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let authorize_endpoint = parse_endpoint(&provider.authorize_endpoint)?;
        parse_endpoint(&provider.initiate_endpoint)?;
        parse_endpoint(&provider.token_endpoint)?;
        Ok(Self {
            client,
            provider,
            credentials,
            config,
            authorize_endpoint,
        })
    }

    pub fn from_source(
        client: C,
        provider: RequestTokenProvider,
        source: &impl CredentialsProvider,
        config: FlowConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let credentials = ProviderCredentials::load_prefixed(source, &provider.env_prefix)?;
        Self::new(client, provider, credentials, config)
    }

    /// Signature for a call the application makes with the token pair this
    /// flow stored.
    pub fn access_signature(&self, access_token: &str, token_secret: &str) -> SignatureParams {
        SignatureParams::for_token(&self.credentials, access_token, token_secret)
    }
}

impl<C> RequestTokenFlow<C>
where
    C: HttpClient + Send + Sync,
{
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(provider = %self.provider.id)))]
    async fn request_token(&self) -> Result<TokenPair> {
        let body = SignatureParams::consumer(&self.credentials)
            .sign()
            .to_form()
            .map_err(RequestError::from)?;
        let req = request::form_post(&self.provider.initiate_endpoint, body, None)?;
        Ok(request::provider_call(&self.client, req, StatusCode::OK).await?)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(provider = %self.provider.id)))]
    async fn access_token(&self, pending: &PendingRequestToken) -> Result<TokenPair> {
        let query = SignatureParams::for_token(
            &self.credentials,
            pending.oauth_token.clone(),
            &pending.oauth_token_secret,
        )
        .sign()
        .to_form()
        .map_err(RequestError::from)?;
        let req = request::query_get(&self.provider.token_endpoint, &query)?;
        Ok(request::provider_call(&self.client, req, StatusCode::OK).await?)
    }
}

#[async_trait]
impl<C> FederatedRouter for RequestTokenFlow<C>
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

    /// Needs the initiate round trip first; the redirect waits for it.
    async fn authorization_url(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let pending = PendingRequestToken::from(self.request_token().await?);
        let mut url = self.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("oauth_callback", &ctx.redirect_uri(&self.config))
            .append_pair("oauth_token", &pending.oauth_token);
        session.write().await.set_json(&REQUEST_TOKEN, &pending)?;
        Ok(SmolStr::new(url.as_str()))
    }

    async fn fetch_token(&self, ctx: &RequestContext, session: &Session) -> Result<SmolStr> {
        let echoed = callback_param(ctx, "oauth_token")?;
        // single use: cleared before the exchange, whatever its outcome
        let pending = session
            .write()
            .await
            .take_json(&REQUEST_TOKEN)
            .map_err(|_| OAuthError::malformed("stored request token is unreadable"))?
            .ok_or_else(|| OAuthError::malformed("no request token pending for this session"))?;
        if pending.oauth_token != echoed {
            return Err(OAuthError::malformed(
                "oauth_token does not match the pending request token",
            ));
        }

        let access = self.access_token(&pending).await?;
        session
            .write()
            .await
            .replace_secondary(None, Some(access.oauth_token_secret.to_string()));
        Ok(access.oauth_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClient, form_response, json_response};
    use crate::registry::ServiceRegistry;
    use crate::session::SessionData;
    use http::Method;
    use std::collections::BTreeMap;

    fn flow(client: MockClient) -> RequestTokenFlow<MockClient> {
        RequestTokenFlow::new(
            client,
            RequestTokenProvider::four_shared(),
            ProviderCredentials::new("consumer", "csecret"),
            FlowConfig::with_callback("https://app.example/auth/4shared/callback"),
        )
        .unwrap()
    }

    fn registry() -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.register(ProviderId::AUTH4SHARED, "4shared");
        registry
    }

    async fn start(client: &MockClient, flow: &RequestTokenFlow<MockClient>) -> (Session, SmolStr) {
        client
            .push(form_response(
                StatusCode::OK,
                "oauth_token=req-tok&oauth_token_secret=req-secret",
            ))
            .await;
        let session = Session::default();
        let url = flow
            .authorization_url(&RequestContext::default(), &session)
            .await
            .unwrap();
        (session, url)
    }

    #[tokio::test]
    async fn full_exchange_yields_access_token() {
        let client = MockClient::default();
        let flow = flow(client.clone());
        let (session, url) = start(&client, &flow).await;

        let url = Url::parse(&url).unwrap();
        assert_eq!(url.path(), "/v1_2/oauth/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                (
                    "oauth_callback".to_string(),
                    "https://app.example/auth/4shared/callback".to_string()
                ),
                ("oauth_token".to_string(), "req-tok".to_string()),
            ]
        );

        client
            .push(json_response(
                StatusCode::OK,
                serde_json::json!({"oauth_token": "acc-tok", "oauth_token_secret": "acc-secret"}),
            ))
            .await;
        let completion = |_: Session, token: SmolStr| async move { token };
        let token = flow
            .callback(
                &RequestContext::from_query("oauth_token=req-tok"),
                &session,
                &completion,
            )
            .await
            .unwrap();
        assert_eq!(token, "acc-tok");

        let data = session.snapshot().await;
        assert!(!data.contains(&REQUEST_TOKEN));
        assert_eq!(data.access_token().unwrap(), "acc-tok");
        assert_eq!(data.token_secret(&registry()).unwrap(), "acc-secret");
        let err = data.refresh_token(&registry()).unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);

        let requests = client.requests().await;
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].method, Method::POST);
        let initiate: BTreeMap<String, String> =
            serde_html_form::from_str(requests[0].body_str()).unwrap();
        assert_eq!(initiate["oauth_consumer_key"], "consumer");
        assert_eq!(initiate["oauth_signature"], "csecret&");
        assert_eq!(initiate["oauth_signature_method"], "PLAINTEXT");

        assert_eq!(requests[1].method, Method::GET);
        let exchange: BTreeMap<String, String> =
            serde_html_form::from_str(requests[1].uri.query().unwrap()).unwrap();
        assert_eq!(exchange["oauth_token"], "req-tok");
        assert_eq!(exchange["oauth_signature"], "csecret&req-secret");
        assert_ne!(exchange["oauth_nonce"], initiate["oauth_nonce"]);
    }

    #[tokio::test]
    async fn request_token_is_single_use() {
        let client = MockClient::default();
        let flow = flow(client.clone());
        let (session, _) = start(&client, &flow).await;
        client
            .push(json_response(
                StatusCode::OK,
                serde_json::json!({"oauth_token": "acc", "oauth_token_secret": "s"}),
            ))
            .await;
        let ctx = RequestContext::from_query("oauth_token=req-tok");
        flow.fetch_token(&ctx, &session).await.unwrap();

        let err = flow.fetch_token(&ctx, &session).await.unwrap_err();
        assert!(matches!(err, OAuthError::MalformedCallback(_)));
        assert_eq!(client.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_exchange_still_consumes_request_token() {
        let client = MockClient::default();
        let flow = flow(client.clone());
        let (session, _) = start(&client, &flow).await;
        client
            .push(form_response(StatusCode::UNAUTHORIZED, "oauth_problem=token_rejected"))
            .await;

        let ctx = RequestContext::from_query("oauth_token=req-tok");
        let err = flow.fetch_token(&ctx, &session).await.unwrap_err();
        assert_eq!(err.code(), "UpstreamFailure");
        assert!(!session.snapshot().await.contains(&REQUEST_TOKEN));
    }

    #[tokio::test]
    async fn mismatched_token_is_rejected_without_network() {
        let client = MockClient::default();
        let flow = flow(client.clone());
        let (session, _) = start(&client, &flow).await;
        let err = flow
            .fetch_token(&RequestContext::from_query("oauth_token=forged"), &session)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::MalformedCallback(_)));
        assert_eq!(client.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn callback_without_pending_state_is_malformed() {
        let flow = flow(MockClient::default());
        let err = flow
            .fetch_token(
                &RequestContext::from_query("oauth_token=t"),
                &Session::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = flow
            .fetch_token(&RequestContext::from_query("error=denied"), &Session::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::ProviderRejected(ref m) if m == "denied"));
    }

    #[tokio::test]
    async fn initiate_failure_stores_nothing() {
        let client = MockClient::default();
        client
            .push(form_response(StatusCode::BAD_REQUEST, "oauth_problem=consumer_key_unknown"))
            .await;
        let flow = flow(client);
        let session = Session::new(SessionData::new());
        let err = flow
            .authorization_url(&RequestContext::default(), &session)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "UpstreamFailure");
        assert!(session.snapshot().await.is_empty());
    }

    #[test]
    fn access_signature_joins_both_secrets() {
        let flow = flow(MockClient::default());
        let params = flow.access_signature("acc", "acc-secret");
        assert_eq!(params.oauth_signature, "csecret&acc-secret");
    }
}

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::request::RequestError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenGrantType {
    AuthorizationCode,
}

// https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.3
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCodeRequest<'a> {
    pub grant_type: TokenGrantType,
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

// https://datatracker.ietf.org/doc/html/rfc6749#section-5.1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokenResponse {
    pub access_token: SmolStr,
    pub token_type: Option<SmolStr>,
    pub refresh_token: Option<SmolStr>,
    pub scope: Option<SmolStr>,
}

// https://datatracker.ietf.org/doc/html/rfc6749#section-5.2
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthErrorResponse {
    pub error: SmolStr,
    pub error_description: Option<SmolStr>,
}

/// Token endpoint body as some providers send it: a token or an error object,
/// both with 200. Decoded loosely since form-encoded bodies carry no types.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenEndpointResponse {
    #[serde(default)]
    pub access_token: Option<SmolStr>,
    #[serde(default)]
    pub token_type: Option<SmolStr>,
    #[serde(default)]
    pub refresh_token: Option<SmolStr>,
    #[serde(default)]
    pub scope: Option<SmolStr>,
    #[serde(default)]
    pub error: Option<SmolStr>,
    #[serde(default)]
    pub error_description: Option<SmolStr>,
}

impl TryFrom<TokenEndpointResponse> for OAuthTokenResponse {
    type Error = RequestError;

    fn try_from(value: TokenEndpointResponse) -> Result<Self, Self::Error> {
        match (value.access_token, value.error) {
            (Some(access_token), None) => Ok(OAuthTokenResponse {
                access_token,
                token_type: value.token_type,
                refresh_token: value.refresh_token.filter(|t| !t.is_empty()),
                scope: value.scope,
            }),
            (_, Some(error)) => Err(RequestError::provider_error(error, value.error_description)),
            (None, None) => Err(RequestError::provider_error(
                "invalid_response",
                Some(SmolStr::new_static("token endpoint returned no access_token")),
            )),
        }
    }
}

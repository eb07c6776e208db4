//! PLAINTEXT signing for OAuth1-style providers.
//!
//! The PLAINTEXT method sends the shared secret itself as the signature, so it
//! is only ever used against TLS endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, ToSmolStr, format_smolstr};

use crate::credentials::ProviderCredentials;
use crate::utils::{generate_nonce, unix_timestamp};

pub const PLAINTEXT: &str = "PLAINTEXT";

/// Signature method, timestamp and nonce stamped onto every signed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub oauth_signature_method: SmolStr,
    pub oauth_timestamp: SmolStr,
    pub oauth_nonce: SmolStr,
}

impl Stamp {
    /// A stamp for right now with a fresh nonce.
    pub fn now() -> Self {
        Self {
            oauth_signature_method: SmolStr::new_static(PLAINTEXT),
            oauth_timestamp: unix_timestamp().to_smolstr(),
            oauth_nonce: generate_nonce(),
        }
    }

    pub fn is_plaintext(&self) -> bool {
        self.oauth_signature_method == PLAINTEXT
    }
}

/// Consumer key, optional token and the PLAINTEXT signature
/// `{consumer_secret}&{token_secret}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParams {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub oauth_token: Option<SmolStr>,
    pub oauth_consumer_key: SmolStr,
    pub oauth_signature: SmolStr,
}

impl SignatureParams {
    /// Signature for a request made before any token exists.
    pub fn consumer(credentials: &ProviderCredentials) -> Self {
        Self {
            oauth_token: None,
            oauth_consumer_key: credentials.client_id().into(),
            oauth_signature: format_smolstr!("{}&", credentials.client_secret()),
        }
    }

    /// Signature for a request made on behalf of `token`.
    pub fn for_token(
        credentials: &ProviderCredentials,
        token: impl Into<SmolStr>,
        token_secret: &str,
    ) -> Self {
        Self {
            oauth_token: Some(token.into()),
            oauth_consumer_key: credentials.client_id().into(),
            oauth_signature: format_smolstr!("{}&{}", credentials.client_secret(), token_secret),
        }
    }

    /// Attach a fresh stamp.
    pub fn sign(self) -> Signed<Self> {
        Signed::new(self)
    }
}

impl fmt::Debug for SignatureParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureParams")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_consumer_key", &self.oauth_consumer_key)
            .field("oauth_signature", &"<redacted>")
            .finish()
    }
}

/// Parameters plus the stamp they were signed with, flattened into one
/// form or query string.
#[derive(Debug, Clone, Serialize)]
pub struct Signed<T> {
    #[serde(flatten)]
    pub params: T,
    #[serde(flatten)]
    pub stamp: Stamp,
}

impl<T: Serialize> Signed<T> {
    pub fn new(params: T) -> Self {
        Self {
            params,
            stamp: Stamp::now(),
        }
    }

    pub fn to_form(&self) -> Result<String, serde_html_form::ser::Error> {
        serde_html_form::to_string(self)
    }
}

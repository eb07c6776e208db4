use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Token pair returned by both OAuth1 round trips.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub oauth_token: SmolStr,
    pub oauth_token_secret: SmolStr,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("oauth_token", &self.oauth_token)
            .field("oauth_token_secret", &"<redacted>")
            .finish()
    }
}

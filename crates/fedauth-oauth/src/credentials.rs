//! Client id and secret resolution.

use std::collections::HashMap;
use std::fmt;

use smol_str::SmolStr;

use crate::error::ConfigError;

/// Source of named configuration entries.
pub trait CredentialsProvider {
    /// Look up one entry, `None` when absent or empty.
    fn credential(&self, key: &str) -> Option<String>;
}

/// Reads entries from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl CredentialsProvider for Environment {
    fn credential(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl CredentialsProvider for HashMap<String, String> {
    fn credential(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl<T: CredentialsProvider + ?Sized> CredentialsProvider for &T {
    fn credential(&self, key: &str) -> Option<String> {
        (**self).credential(key)
    }
}

/// A provider's client identifier and secret. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    client_id: SmolStr,
    client_secret: SmolStr,
}

impl ProviderCredentials {
    pub fn new(client_id: impl Into<SmolStr>, client_secret: impl Into<SmolStr>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Load both entries, failing on the first one that is missing.
    pub fn load(
        source: &impl CredentialsProvider,
        id_key: &str,
        secret_key: &str,
    ) -> Result<Self, ConfigError> {
        let client_id = source
            .credential(id_key)
            .ok_or_else(|| ConfigError::MissingVariable(id_key.into()))?;
        let client_secret = source
            .credential(secret_key)
            .ok_or_else(|| ConfigError::MissingVariable(secret_key.into()))?;
        Ok(Self::new(client_id, client_secret))
    }

    /// Load `{prefix}_CLIENT_ID` and `{prefix}_CLIENT_SECRET`.
    pub fn load_prefixed(
        source: &impl CredentialsProvider,
        prefix: &str,
    ) -> Result<Self, ConfigError> {
        Self::load(
            source,
            &format!("{prefix}_CLIENT_ID"),
            &format!("{prefix}_CLIENT_SECRET"),
        )
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

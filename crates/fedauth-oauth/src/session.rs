//! Typed view over the per-user login session.
//!
//! The session is a flat string map owned by the transport layer. Flows never
//! touch raw keys: each one declares the [`TextField`]s and [`JsonField`]s it
//! reads and writes, so "absent" and "present but unreadable" are always
//! distinct outcomes.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use smol_str::SmolStr;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{OAuthError, Result};
use crate::registry::{ProviderId, ServiceRegistry};

/// A named session entry.
pub trait Field {
    fn key(&self) -> &'static str;
}

/// A plain string entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextField {
    key: &'static str,
}

impl TextField {
    pub const fn new(key: &'static str) -> Self {
        Self { key }
    }
}

impl Field for TextField {
    fn key(&self) -> &'static str {
        self.key
    }
}

/// A structured entry stored as JSON.
pub struct JsonField<T> {
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonField<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }
}

impl<T> Field for JsonField<T> {
    fn key(&self) -> &'static str {
        self.key
    }
}

pub const ACCESS_TOKEN: TextField = TextField::new("access_token");
pub const REFRESH_TOKEN: TextField = TextField::new("refresh_token");
pub const TOKEN_SECRET: TextField = TextField::new("token_secret");
pub const ACCESS_TOKEN_SERVICE: TextField = TextField::new("access_token_service");

/// Everything stored for one browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    values: BTreeMap<SmolStr, String>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &TextField) -> Option<&str> {
        self.values.get(field.key).map(String::as_str)
    }

    pub fn set(&mut self, field: &TextField, value: impl Into<String>) {
        self.values.insert(SmolStr::new_static(field.key), value.into());
    }

    /// Read and clear in one step.
    pub fn take(&mut self, field: &TextField) -> Option<String> {
        self.values.remove(field.key)
    }

    pub fn remove(&mut self, field: &impl Field) {
        self.values.remove(field.key());
    }

    pub fn contains(&self, field: &impl Field) -> bool {
        self.values.contains_key(field.key())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_json<T: DeserializeOwned>(&self, field: &JsonField<T>) -> Result<Option<T>> {
        self.values
            .get(field.key)
            .map(|raw| decode(field, raw))
            .transpose()
    }

    pub fn set_json<T: Serialize>(&mut self, field: &JsonField<T>, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|source| OAuthError::InternalState {
            key: SmolStr::new_static(field.key),
            source,
        })?;
        self.values.insert(SmolStr::new_static(field.key), raw);
        Ok(())
    }

    /// Read and clear in one step. The entry is gone even when it fails to
    /// decode.
    pub fn take_json<T: DeserializeOwned>(&mut self, field: &JsonField<T>) -> Result<Option<T>> {
        self.values
            .remove(field.key)
            .map(|raw| decode(field, &raw))
            .transpose()
    }

    /// The token the active provider issued, or `Unauthenticated`.
    pub fn access_token(&self) -> Result<&str> {
        self.get(&ACCESS_TOKEN)
            .ok_or_else(OAuthError::unauthenticated)
    }

    /// Identifier of the provider that produced the current access token.
    pub fn active_provider(&self) -> Option<ProviderId> {
        self.get(&ACCESS_TOKEN_SERVICE).map(ProviderId::from)
    }

    pub fn refresh_token(&self, registry: &ServiceRegistry) -> Result<&str> {
        self.secondary(&REFRESH_TOKEN, registry, "refresh tokens")
    }

    pub fn token_secret(&self, registry: &ServiceRegistry) -> Result<&str> {
        self.secondary(&TOKEN_SECRET, registry, "token secrets")
    }

    fn secondary(
        &self,
        field: &TextField,
        registry: &ServiceRegistry,
        what: &'static str,
    ) -> Result<&str> {
        self.access_token()?;
        if let Some(value) = self.get(field) {
            return Ok(value);
        }
        let provider = self
            .active_provider()
            .unwrap_or_else(|| ProviderId::new_static("unknown"));
        Err(OAuthError::UnsupportedOperation {
            provider: registry.display_name(&provider).into(),
            what: SmolStr::new_static(what),
        })
    }

    /// Replace the values that only some providers issue. `None` clears,
    /// so nothing from an earlier login leaks into this one.
    pub fn replace_secondary(&mut self, refresh_token: Option<String>, token_secret: Option<String>) {
        for (field, value) in [(&REFRESH_TOKEN, refresh_token), (&TOKEN_SECRET, token_secret)] {
            match value {
                Some(value) => self.set(field, value),
                None => self.remove(field),
            }
        }
    }

    /// Record the final token and the provider that issued it.
    pub fn complete_login(&mut self, access_token: impl Into<String>, provider: &ProviderId) {
        self.set(&ACCESS_TOKEN, access_token);
        self.set(&ACCESS_TOKEN_SERVICE, provider.as_str());
    }
}

fn decode<T: DeserializeOwned>(field: &JsonField<T>, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|source| OAuthError::InternalState {
        key: SmolStr::new_static(field.key),
        source,
    })
}

/// Shared handle to the session of the request being served.
///
/// Cloning shares the underlying data; the transport layer persists it
/// once the handler is done.
#[derive(Debug, Clone, Default)]
pub struct Session(Arc<RwLock<SessionData>>);

impl Session {
    pub fn new(data: SessionData) -> Self {
        Self(Arc::new(RwLock::new(data)))
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.0.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.0.write().await
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> SessionData {
        self.0.read().await.clone()
    }

    pub async fn access_token(&self) -> Result<String> {
        self.read().await.access_token().map(str::to_owned)
    }

    pub async fn refresh_token(&self, registry: &ServiceRegistry) -> Result<String> {
        self.read().await.refresh_token(registry).map(str::to_owned)
    }

    pub async fn token_secret(&self, registry: &ServiceRegistry) -> Result<String> {
        self.read().await.token_secret(registry).map(str::to_owned)
    }

    pub async fn active_provider(&self) -> Option<ProviderId> {
        self.read().await.active_provider()
    }
}

//! Generic session storage traits and utilities.

use async_trait::async_trait;
use miette::Diagnostic;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Errors emitted by session stores.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum SessionStoreError {
    /// Any error from a backend implementation
    #[error(transparent)]
    #[diagnostic(code(fedauth::session_store::other))]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Pluggable storage for arbitrary session records.
///
/// Records only need to outlive one login sequence; nothing here implies
/// durable storage.
#[async_trait]
pub trait SessionStore<K, T>: Send + Sync
where
    K: Eq + Hash,
    T: Clone,
{
    /// Get the current session if present.
    async fn get(&self, key: &K) -> Option<T>;
    /// Persist the given session.
    async fn set(&self, key: K, session: T) -> Result<(), SessionStoreError>;
    /// Delete the given session.
    async fn del(&self, key: &K) -> Result<(), SessionStoreError>;
}

/// In-memory session store suitable for short-lived sessions and tests.
///
/// With a lifetime set, a record expires once it has gone that long without
/// being written. Expired records are never returned and are dropped on the
/// next write.
#[derive(Clone)]
pub struct MemorySessionStore<K, T> {
    entries: Arc<RwLock<HashMap<K, (T, Instant)>>>,
    lifetime: Option<Duration>,
}

impl<K, T> Default for MemorySessionStore<K, T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            lifetime: None,
        }
    }
}

impl<K, T> MemorySessionStore<K, T> {
    /// Store whose records expire `lifetime` after their last write.
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            lifetime: Some(lifetime),
            ..Self::default()
        }
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    fn is_expired(&self, written: Instant) -> bool {
        self.lifetime
            .is_some_and(|lifetime| written.elapsed() >= lifetime)
    }

    /// Number of records currently held, expired ones included until the
    /// next write drops them.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<K, T> SessionStore<K, T> for MemorySessionStore<K, T>
where
    K: Eq + Hash + Send + Sync,
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Option<T> {
        let entries = self.entries.read().await;
        let (session, written) = entries.get(key)?;
        (!self.is_expired(*written)).then(|| session.clone())
    }
    async fn set(&self, key: K, session: T) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.write().await;
        if self.lifetime.is_some() {
            entries.retain(|_, (_, written)| !self.is_expired(*written));
        }
        entries.insert(key, (session, Instant::now()));
        Ok(())
    }
    async fn del(&self, key: &K) -> Result<(), SessionStoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl<K, T, S> SessionStore<K, T> for Arc<S>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    S: SessionStore<K, T> + ?Sized,
{
    async fn get(&self, key: &K) -> Option<T> {
        self.as_ref().get(key).await
    }
    async fn set(&self, key: K, session: T) -> Result<(), SessionStoreError> {
        self.as_ref().set(key, session).await
    }
    async fn del(&self, key: &K) -> Result<(), SessionStoreError> {
        self.as_ref().del(key).await
    }
}

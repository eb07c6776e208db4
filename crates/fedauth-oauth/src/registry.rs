//! Provider identities and the record of which ones are active.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Stable identifier of a provider, stored in the session next to the token
/// it produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(SmolStr);

impl ProviderId {
    pub const AUTH4SHARED: Self = Self::new_static("4shared");
    pub const BOX: Self = Self::new_static("box");
    pub const DEVIANTART: Self = Self::new_static("deviantart");
    pub const DROPBOX: Self = Self::new_static("dropbox");
    pub const FACEBOOK: Self = Self::new_static("facebook");
    pub const GITHUB: Self = Self::new_static("github");
    pub const GITLAB: Self = Self::new_static("gitlab");
    pub const GOOGLE: Self = Self::new_static("google");
    pub const IMGUR: Self = Self::new_static("imgur");
    pub const MIXCLOUD: Self = Self::new_static("mixcloud");
    pub const NEXTCLOUD: Self = Self::new_static("nextcloud");

    pub const fn new_static(id: &'static str) -> Self {
        Self(SmolStr::new_static(id))
    }

    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which providers this process has registered, and what to call them.
///
/// Passed explicitly to the session accessors that need to name the active
/// provider in an error.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<ProviderId, SmolStr>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ProviderId, display_name: impl Into<SmolStr>) {
        self.services.insert(id, display_name.into());
    }

    pub fn is_registered(&self, id: &ProviderId) -> bool {
        self.services.contains_key(id)
    }

    /// Display name for `id`, falling back to the raw identifier.
    pub fn display_name<'a>(&'a self, id: &'a ProviderId) -> &'a str {
        self.services
            .get(id)
            .map(SmolStr::as_str)
            .unwrap_or_else(|| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProviderId, &str)> {
        self.services.iter().map(|(id, name)| (id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

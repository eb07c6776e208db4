//! Per-flow configuration and callback path handling.

use smol_str::{SmolStr, ToSmolStr};
use url::Url;

/// Callback and scope settings shared by every flow variant.
///
/// Owned by the flow; once the flow is handed to route registration it can no
/// longer be changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    callback_url: SmolStr,
    scope: Vec<SmolStr>,
    access_token_url: Option<SmolStr>,
}

#[bon::bon]
impl FlowConfig {
    #[builder]
    pub fn new(
        #[builder(into)] callback_url: SmolStr,
        #[builder(default)] scope: Vec<SmolStr>,
        #[builder(into)] access_token_url: Option<SmolStr>,
    ) -> Self {
        let mut config = Self {
            callback_url,
            scope: Vec::with_capacity(scope.len()),
            access_token_url,
        };
        config.extend_scope(scope);
        config
    }
}

impl FlowConfig {
    /// Shorthand for a config with only a callback.
    pub fn with_callback(callback_url: impl Into<SmolStr>) -> Self {
        Self::builder().callback_url(callback_url).build()
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Requested scopes, in insertion order, without duplicates.
    pub fn scope(&self) -> &[SmolStr] {
        &self.scope
    }

    /// Token endpoint override, if any.
    pub fn access_token_url(&self) -> Option<&str> {
        self.access_token_url.as_deref()
    }

    pub fn extend_scope<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        for scope in scopes {
            let scope = scope.into();
            if !self.scope.contains(&scope) {
                self.scope.push(scope);
            }
        }
    }

    /// The path the callback route is bound to.
    pub fn callback_path(&self) -> SmolStr {
        callback_path(&self.callback_url)
    }

    /// Make a relative callback absolute using the scheme and authority of
    /// `referer`. Absolute callbacks are left alone.
    pub fn upgrade_relative_callback(&mut self, referer: &str) {
        if self.callback_url.contains("://") {
            return;
        }
        let Ok(referer) = Url::parse(referer) else {
            return;
        };
        let origin = referer.origin().ascii_serialization();
        let path = self.callback_url.trim_start_matches('/');
        self.callback_url = smol_str::format_smolstr!("{origin}/{path}");
    }
}

/// Route path for a configured callback value.
///
/// Absolute `http(s)` URLs contribute only their path; when that path is empty
/// the original value is kept. Relative values pass through unchanged, which
/// makes this idempotent.
pub fn callback_path(callback: &str) -> SmolStr {
    let is_absolute = callback.starts_with("http://") || callback.starts_with("https://");
    if !is_absolute {
        return callback.to_smolstr();
    }
    match Url::parse(callback) {
        Ok(url) if !url.path().is_empty() && url.path() != "/" => url.path().to_smolstr(),
        _ => callback.to_smolstr(),
    }
}

//! Built-in provider descriptors.
//!
//! A descriptor only carries data: endpoints, credential entry names and
//! request quirks. Which flow it drives is fixed by its type.

use smol_str::SmolStr;

use crate::registry::ProviderId;

/// How the authorization code is sent to the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenRequestStyle {
    /// Form-encoded POST body.
    #[default]
    PostForm,
    /// Parameters in the query string of a GET.
    GetQuery,
}

/// An OAuth2 provider redeeming a `code` at a token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeProvider {
    pub id: ProviderId,
    pub display_name: SmolStr,
    pub authorize_endpoint: SmolStr,
    pub token_endpoint: SmolStr,
    pub env_prefix: SmolStr,
    pub token_request: TokenRequestStyle,
}

impl CodeProvider {
    const fn builtin(
        id: ProviderId,
        display_name: &'static str,
        authorize_endpoint: &'static str,
        token_endpoint: &'static str,
        env_prefix: &'static str,
    ) -> Self {
        Self {
            id,
            display_name: SmolStr::new_static(display_name),
            authorize_endpoint: SmolStr::new_static(authorize_endpoint),
            token_endpoint: SmolStr::new_static(token_endpoint),
            env_prefix: SmolStr::new_static(env_prefix),
            token_request: TokenRequestStyle::PostForm,
        }
    }

    /// Describe a provider that is not built in.
    pub fn custom(
        id: impl Into<SmolStr>,
        display_name: impl Into<SmolStr>,
        authorize_endpoint: impl Into<SmolStr>,
        token_endpoint: impl Into<SmolStr>,
        env_prefix: impl Into<SmolStr>,
    ) -> Self {
        Self {
            id: ProviderId::new(id),
            display_name: display_name.into(),
            authorize_endpoint: authorize_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            env_prefix: env_prefix.into(),
            token_request: TokenRequestStyle::PostForm,
        }
    }

    pub fn with_token_request(mut self, style: TokenRequestStyle) -> Self {
        self.token_request = style;
        self
    }

    pub const fn github() -> Self {
        Self::builtin(
            ProviderId::GITHUB,
            "GitHub",
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
            "GITHUB",
        )
    }

    pub const fn google() -> Self {
        Self::builtin(
            ProviderId::GOOGLE,
            "Google",
            "https://accounts.google.com/o/oauth2/auth",
            "https://www.googleapis.com/oauth2/v4/token",
            "GOOGLE",
        )
    }

    pub const fn dropbox() -> Self {
        Self::builtin(
            ProviderId::DROPBOX,
            "Dropbox",
            "https://www.dropbox.com/oauth2/authorize",
            "https://api.dropboxapi.com/oauth2/token",
            "DROPBOX",
        )
    }

    pub const fn deviantart() -> Self {
        Self::builtin(
            ProviderId::DEVIANTART,
            "DeviantArt",
            "https://www.deviantart.com/oauth2/authorize",
            "https://www.deviantart.com/oauth2/token",
            "DEVIANTART",
        )
    }

    pub const fn imgur() -> Self {
        Self::builtin(
            ProviderId::IMGUR,
            "Imgur",
            "https://api.imgur.com/oauth2/authorize",
            "https://api.imgur.com/oauth2/token",
            "IMGUR",
        )
    }

    pub const fn mixcloud() -> Self {
        let mut provider = Self::builtin(
            ProviderId::MIXCLOUD,
            "Mixcloud",
            "https://www.mixcloud.com/oauth/authorize",
            "https://www.mixcloud.com/oauth/access_token",
            "MIXCLOUD",
        );
        provider.token_request = TokenRequestStyle::GetQuery;
        provider
    }

    pub const fn box_com() -> Self {
        Self::builtin(
            ProviderId::BOX,
            "Box",
            "https://account.box.com/api/oauth2/authorize",
            "https://api.box.com/oauth2/token",
            "BOX",
        )
    }

    pub const fn gitlab() -> Self {
        Self::builtin(
            ProviderId::GITLAB,
            "GitLab",
            "https://gitlab.com/oauth/authorize",
            "https://gitlab.com/oauth/token",
            "GITLAB",
        )
    }

    pub const fn facebook() -> Self {
        Self::builtin(
            ProviderId::FACEBOOK,
            "Facebook",
            "https://www.facebook.com/v3.2/dialog/oauth",
            "https://graph.facebook.com/v3.2/oauth/access_token",
            "FACEBOOK",
        )
    }

    /// Every built-in code-flow provider.
    pub fn all() -> [Self; 9] {
        [
            Self::github(),
            Self::google(),
            Self::dropbox(),
            Self::deviantart(),
            Self::imgur(),
            Self::mixcloud(),
            Self::box_com(),
            Self::gitlab(),
            Self::facebook(),
        ]
    }

    pub fn find(id: &ProviderId) -> Option<Self> {
        Self::all().into_iter().find(|p| &p.id == id)
    }
}

/// An OAuth1-style provider with a request-token round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTokenProvider {
    pub id: ProviderId,
    pub display_name: SmolStr,
    pub initiate_endpoint: SmolStr,
    pub authorize_endpoint: SmolStr,
    pub token_endpoint: SmolStr,
    pub env_prefix: SmolStr,
}

impl RequestTokenProvider {
    pub const fn four_shared() -> Self {
        Self {
            id: ProviderId::AUTH4SHARED,
            display_name: SmolStr::new_static("4shared"),
            initiate_endpoint: SmolStr::new_static("https://api.4shared.com/v1_2/oauth/initiate"),
            authorize_endpoint: SmolStr::new_static(
                "https://api.4shared.com/v1_2/oauth/authorize",
            ),
            token_endpoint: SmolStr::new_static("https://api.4shared.com/v1_2/oauth/token"),
            env_prefix: SmolStr::new_static("AUTH4SHARED"),
        }
    }
}

/// A self-hosted provider reached through login polling. The server is
/// chosen per login, so only the path below it is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollProvider {
    pub id: ProviderId,
    pub display_name: SmolStr,
    pub login_path: SmolStr,
    pub user_agent_key: SmolStr,
    pub default_user_agent: SmolStr,
}

impl PollProvider {
    pub const fn nextcloud() -> Self {
        Self {
            id: ProviderId::NEXTCLOUD,
            display_name: SmolStr::new_static("Nextcloud"),
            login_path: SmolStr::new_static("/index.php/login/v2"),
            user_agent_key: SmolStr::new_static("NEXTCLOUD_USER_AGENT"),
            default_user_agent: SmolStr::new_static("fedauth"),
        }
    }
}

//! The three login flow families.

mod authorization_code;
mod poll;
mod request_token;

pub use self::authorization_code::AuthorizationCodeFlow;
pub use self::poll::{CLOUD_DOMAIN, POLL_LOGIN_NAME, POLL_TICKET, PollFlow, PollTicket, TICKET_LIFETIME};
pub use self::request_token::{PendingRequestToken, REQUEST_TOKEN, RequestTokenFlow};

use smol_str::SmolStr;
use url::Url;

use crate::error::ConfigError;

fn parse_endpoint(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|source| ConfigError::InvalidUrl {
        url: SmolStr::new(url),
        source,
    })
}

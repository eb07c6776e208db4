mod login_flow;
mod request_token;
mod token;

pub use self::login_flow::*;
pub use self::request_token::*;
pub use self::token::*;

//! Minimal HTTP client abstraction shared across crates.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single outbound provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client trait for sending raw HTTP requests.
///
/// Provider calls made through this trait are one-shot: request tokens and
/// poll tokens must never be resubmitted, so implementations must not retry
/// on their own.
#[trait_variant::make(Send)]
pub trait HttpClient {
    /// Error type returned by the HTTP client
    type Error: std::error::Error + Display + Send + Sync + 'static;

    /// Send an HTTP request and return the response.
    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>>;
}

/// Options applied to the default outbound client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound for one request, connect through body.
    pub timeout: Duration,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("fedauth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientOptions {
    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build a reqwest client honoring these options. Redirects are not
    /// followed, provider endpoints answer directly.
    #[cfg(feature = "reqwest-client")]
    pub fn build_reqwest(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
    }
}

/// Errors from the reqwest-backed client.
#[cfg(feature = "reqwest-client")]
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ReqwestTransportError {
    /// The request failed in transit or timed out
    #[error("transport error: {0}")]
    #[diagnostic(
        code(fedauth_common::http_client::transport),
        help("the provider endpoint could not be reached within the configured timeout")
    )]
    Transport(#[from] reqwest::Error),
    /// The response could not be converted back into an `http::Response`
    #[error("invalid response: {0}")]
    #[diagnostic(code(fedauth_common::http_client::response))]
    Response(#[from] http::Error),
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for reqwest::Client {
    type Error = ReqwestTransportError;

    async fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
        let (parts, body) = request.into_parts();

        let mut req = self.request(parts.method, parts.uri.to_string()).body(body);

        for (name, value) in parts.headers.iter() {
            req = req.header(name.as_str(), value.as_bytes());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(uri = %parts.uri, "sending provider request");

        let resp = req.send().await?;

        let mut builder = http::Response::builder().status(resp.status());

        for (name, value) in resp.headers().iter() {
            builder = builder.header(name.as_str(), value.as_bytes());
        }

        let body = resp.bytes().await?.to_vec();

        Ok(builder.body(body)?)
    }
}

impl<T: HttpClient + Sync> HttpClient for Arc<T> {
    type Error = T::Error;

    fn send_http(
        &self,
        request: http::Request<Vec<u8>>,
    ) -> impl Future<Output = core::result::Result<http::Response<Vec<u8>>, Self::Error>> + Send
    {
        self.as_ref().send_http(request)
    }
}

use fedauth_common::http_client::HttpClient;
use http::{Method, Request, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use smol_str::SmolStr;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Failure of an outbound provider call.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{kind}")]
pub struct RequestError {
    #[diagnostic_source]
    kind: RequestErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<SmolStr>,
    context: Option<SmolStr>,
    url: Option<SmolStr>,
}

/// Error categories for provider calls
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RequestErrorKind {
    /// Transport failure, including timeouts
    #[error("transport error")]
    #[diagnostic(
        code(fedauth_oauth::request::transport),
        help("provider calls are never retried; the user has to restart the login")
    )]
    Transport,

    /// HTTP build error
    #[error("http build error")]
    #[diagnostic(code(fedauth_oauth::request::http_build))]
    HttpBuild,

    /// Unexpected HTTP status
    #[error("http status: {0}")]
    #[diagnostic(
        code(fedauth_oauth::request::http_status),
        help("see server response for details")
    )]
    HttpStatus(StatusCode),

    /// Unexpected HTTP status with a body worth keeping
    #[error("http status: {status}, body: {body}")]
    #[diagnostic(code(fedauth_oauth::request::http_status_body))]
    HttpStatusWithBody { status: StatusCode, body: SmolStr },

    /// The token endpoint answered with an OAuth error object
    #[error("provider error `{error}`")]
    #[diagnostic(
        code(fedauth_oauth::request::provider_error),
        help("the authorization code may be expired or already redeemed")
    )]
    ProviderError {
        error: SmolStr,
        description: Option<SmolStr>,
    },

    /// Form serialization error
    #[error("form serialization error")]
    #[diagnostic(code(fedauth_oauth::request::serde_form))]
    SerdeHtmlForm,

    /// JSON error
    #[error("json error")]
    #[diagnostic(code(fedauth_oauth::request::serde_json))]
    SerdeJson,
}

impl RequestError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: RequestErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
            url: None,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> &RequestErrorKind {
        &self.kind
    }

    /// Get the context string if present
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Get the URL if present
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Add help text to this error
    pub fn with_help(mut self, help: impl Into<SmolStr>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context to this error
    pub fn with_context(mut self, context: impl Into<SmolStr>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add URL to this error
    pub fn with_url(mut self, url: impl Into<SmolStr>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(RequestErrorKind::Transport, Some(Box::new(source)))
    }

    pub fn http_status(status: StatusCode) -> Self {
        Self::new(RequestErrorKind::HttpStatus(status), None)
    }

    pub fn http_status_with_body(status: StatusCode, body: impl Into<SmolStr>) -> Self {
        Self::new(
            RequestErrorKind::HttpStatusWithBody {
                status,
                body: body.into(),
            },
            None,
        )
    }

    pub fn provider_error(error: impl Into<SmolStr>, description: Option<SmolStr>) -> Self {
        Self::new(
            RequestErrorKind::ProviderError {
                error: error.into(),
                description,
            },
            None,
        )
    }
}

impl From<http::Error> for RequestError {
    fn from(e: http::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::HttpBuild, Some(Box::new(e)))
            .with_context(msg)
            .with_help("verify provider endpoint URLs and headers are valid")
    }
}

impl From<serde_html_form::ser::Error> for RequestError {
    fn from(e: serde_html_form::ser::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::SerdeHtmlForm, Some(Box::new(e)))
            .with_context(msg)
            .with_help("check request parameters are serializable")
    }
}

impl From<serde_html_form::de::Error> for RequestError {
    fn from(e: serde_html_form::de::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::SerdeHtmlForm, Some(Box::new(e)))
            .with_context(msg)
            .with_help("verify the provider response body is URL-encoded as advertised")
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        let msg = smol_str::format_smolstr!("{:?}", e);
        Self::new(RequestErrorKind::SerdeJson, Some(Box::new(e)))
            .with_context(msg)
            .with_help("verify the provider response body is valid JSON")
    }
}

pub type Result<T> = core::result::Result<T, RequestError>;

/// Build a form-encoded POST.
pub fn form_post(
    url: &str,
    body: String,
    user_agent: Option<&str>,
) -> Result<Request<Vec<u8>>> {
    let mut builder = Request::builder()
        .uri(url)
        .method(Method::POST)
        .header(header::CONTENT_TYPE, FORM_CONTENT_TYPE)
        .header(header::ACCEPT, "application/json");
    if let Some(agent) = user_agent {
        builder = builder.header(header::USER_AGENT, agent);
    }
    Ok(builder.body(body.into_bytes())?)
}

/// Build a GET carrying `query` as its query string.
pub fn query_get(url: &str, query: &str) -> Result<Request<Vec<u8>>> {
    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(Request::builder()
        .uri(format!("{url}{separator}{query}"))
        .method(Method::GET)
        .header(header::ACCEPT, "application/json")
        .body(Vec::new())?)
}

/// Send a request, mapping transport failures. No retries.
pub async fn send<C>(client: &C, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>
where
    C: HttpClient + Sync,
{
    let url = SmolStr::new(request.uri().to_string());
    client
        .send_http(request)
        .await
        .map_err(|e| RequestError::transport(e).with_url(url))
}

/// Send a request and decode the body when the status is `expected`.
pub async fn provider_call<O, C>(
    client: &C,
    request: Request<Vec<u8>>,
    expected: StatusCode,
) -> Result<O>
where
    O: DeserializeOwned,
    C: HttpClient + Sync,
{
    let url = SmolStr::new(request.uri().to_string());
    let res = send(client, request).await?;
    if res.status() == expected {
        decode_body(&res).map_err(|e| e.with_url(url))
    } else {
        Err(status_error(&res).with_url(url))
    }
}

/// Turn an unexpected response into an error, keeping client-error bodies.
pub fn status_error(res: &Response<Vec<u8>>) -> RequestError {
    if res.status().is_client_error() && !res.body().is_empty() {
        RequestError::http_status_with_body(
            res.status(),
            String::from_utf8_lossy(res.body()).as_ref(),
        )
    } else {
        RequestError::http_status(res.status())
    }
}

/// Decode a response body as JSON or URL-encoded form, by content type.
pub fn decode_body<O: DeserializeOwned>(res: &Response<Vec<u8>>) -> Result<O> {
    let is_form = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE) || ct.starts_with("text/plain"));
    if is_form {
        Ok(serde_html_form::from_bytes(res.body())?)
    } else {
        Ok(serde_json::from_slice(res.body())?)
    }
}

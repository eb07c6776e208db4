//! Canned-response HTTP client shared by the flow tests.

use std::collections::VecDeque;
use std::sync::Arc;

use fedauth_common::http_client::HttpClient;
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri, header};
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("mock transport has no queued response")]
pub struct MockTransportError;

/// What the mock saw; `http::Request` itself is not `Clone`.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

#[derive(Clone, Default)]
pub struct MockClient {
    responses: Arc<Mutex<VecDeque<Response<Vec<u8>>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockClient {
    pub async fn push(&self, response: Response<Vec<u8>>) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

impl HttpClient for MockClient {
    type Error = MockTransportError;

    fn send_http(
        &self,
        request: Request<Vec<u8>>,
    ) -> impl core::future::Future<Output = core::result::Result<Response<Vec<u8>>, Self::Error>>
    + Send {
        let responses = self.responses.clone();
        let requests = self.requests.clone();
        async move {
            let (parts, body) = request.into_parts();
            requests.lock().await.push(RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            responses.lock().await.pop_front().ok_or(MockTransportError)
        }
    }
}

pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(&body).unwrap())
        .unwrap()
}

pub fn form_response(status: StatusCode, body: &str) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.as_bytes().to_vec())
        .unwrap()
}

pub fn empty_response(status: StatusCode) -> Response<Vec<u8>> {
    Response::builder().status(status).body(Vec::new()).unwrap()
}

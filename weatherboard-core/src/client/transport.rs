use async_trait::async_trait;
use reqwest::{Client, Url};
use std::{error::Error as _, fmt::Debug, time::Duration};

/// Raw response whose body was read completely.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Failure below the HTTP status line.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    /// The request never produced a response (DNS, TCP, TLS, timeout).
    Connect(String),
    /// Headers arrived but the body could not be read.
    Body { status: u16, message: String },
}

/// One GET request, one response. Implementations must not retry.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get(&self, url: Url) -> Result<HttpResponse, TransportFailure>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse, TransportFailure> {
        let mut request = self.http.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let res = request
            .send()
            .await
            .map_err(|e| TransportFailure::Connect(describe(e)))?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| {
            let timed_out = e.is_timeout();
            body_failure(status, timed_out, describe(e))
        })?;

        Ok(HttpResponse { status, body })
    }
}

// The URL carries the API key, so it is stripped before the message leaves here.
fn describe(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// A timeout is a connection-level failure even when it hits mid-body.
fn body_failure(status: u16, timed_out: bool, message: String) -> TransportFailure {
    if timed_out {
        TransportFailure::Connect(message)
    } else {
        TransportFailure::Body { status, message }
    }
}

//! Remote fetch capability.
//!
//! The download pipeline only needs "give me a status, an optional length
//! hint and a byte stream for this URL". Retries, TLS and redirects belong to
//! the transport behind [`Fetcher`]; the production one is [`HttpFetcher`].

use crate::core::{OtaError, OtaResult};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::fmt;
use std::io;
use std::time::Duration;

/// Response body as a stream of network frames of arbitrary size.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// What a [`Fetcher`] hands back for one request.
pub struct FetchResponse {
    pub status: u16,
    /// Declared `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
    /// `None` when the response carried no body at all.
    pub body: Option<ByteStream>,
}

impl FetchResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Opens a streaming GET for a URL.
pub trait Fetcher: Send + Sync {
    /// Starts the request. Connection-level failures are
    /// [`OtaError::TransportFailed`]; status codes are not interpreted here.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, OtaResult<FetchResponse>>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a client whose requests (body included) time out after `timeout`.
    pub fn new(timeout: Duration) -> OtaResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            OtaError::ConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            }
        })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, OtaResult<FetchResponse>> {
        Box::pin(async move {
            let response =
                self.client.get(url).send().await.map_err(|e| OtaError::TransportFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

            let status = response.status().as_u16();
            let content_length = response.content_length();
            let body = response.bytes_stream().map_err(io::Error::other).boxed();

            Ok(FetchResponse {
                status,
                content_length,
                body: Some(body),
            })
        })
    }
}

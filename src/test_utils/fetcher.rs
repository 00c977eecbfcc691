//! In-memory [`Fetcher`] for pipeline and engine tests.

use crate::core::OtaResult;
use crate::download::{FetchResponse, Fetcher};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use std::io;
use std::sync::Mutex;

/// Serves one canned response for every URL and records the URLs asked for.
#[derive(Debug)]
pub struct MockFetcher {
    status: u16,
    content_length: Option<u64>,
    frames: Vec<Vec<u8>>,
    has_body: bool,
    fail_after: Option<usize>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    /// 200 with `payload` in 1 KiB frames and a matching `Content-Length`.
    pub fn ok(payload: Vec<u8>) -> Self {
        let mut fetcher = Self {
            status: 200,
            content_length: None,
            frames: Vec::new(),
            has_body: true,
            fail_after: None,
            requests: Mutex::new(Vec::new()),
        };
        fetcher.set_frames(payload.chunks(1024).map(<[u8]>::to_vec).collect());
        fetcher
    }

    /// An empty response with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::ok(Vec::new())
        }
    }

    /// Re-splits the payload into frames of `size` bytes.
    #[must_use]
    pub fn with_frame_size(mut self, size: usize) -> Self {
        let payload = self.frames.concat();
        self.set_frames(payload.chunks(size.max(1)).map(<[u8]>::to_vec).collect());
        self
    }

    /// Uses `frames` verbatim as the body.
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.set_frames(frames);
        self
    }

    #[must_use]
    pub const fn with_content_length(mut self, content_length: Option<u64>) -> Self {
        self.content_length = content_length;
        self
    }

    #[must_use]
    pub const fn without_body(mut self) -> Self {
        self.has_body = false;
        self
    }

    /// Yields a stream error after `frames` frames.
    #[must_use]
    pub const fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// URLs fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn set_frames(&mut self, frames: Vec<Vec<u8>>) {
        self.content_length = Some(frames.iter().map(|f| f.len() as u64).sum());
        self.frames = frames;
    }
}

impl Fetcher for MockFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, OtaResult<FetchResponse>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        let mut items: Vec<io::Result<Bytes>> =
            self.frames.iter().map(|f| Ok(Bytes::copy_from_slice(f))).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")));
        }

        let response = FetchResponse {
            status: self.status,
            content_length: self.content_length,
            body: self.has_body.then(|| stream::iter(items).boxed()),
        };
        Box::pin(async move { Ok(response) })
    }
}

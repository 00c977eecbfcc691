//! Download pipeline.
//!
//! Streams a remote artifact into a staging file on a background task and
//! reports back over a channel:
//!
//! ```text
//! Progress(f) ... Progress(f)  then exactly one of  Completed { is_archive } | Failed(err)
//! ```
//!
//! Network frames arrive in whatever sizes the transport produces. They are
//! re-cut into fixed `chunk_size` chunks so that each write, each progress
//! event and the one-time type sniff see the same chunk boundaries
//! regardless of the transport.
//!
//! The pipeline never creates the destination's parent directory and never
//! removes a partially written file. Both are the caller's business.
//!
//! # Example
//!
//! ```rust,no_run
//! use ota_updater::download::{DownloadEvent, HttpFetcher, download};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(60))?);
//! let mut task = download(fetcher, "https://cdn.example.com/b.zip", "/tmp/b.zip", 4096);
//! while let Some(event) = task.next_event().await {
//!     match event {
//!         DownloadEvent::Progress(fraction) => println!("{:.0}%", fraction * 100.0),
//!         DownloadEvent::Completed { is_archive } => println!("done, archive: {is_archive}"),
//!         DownloadEvent::Failed(err) => eprintln!("failed: {err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod fetch;

pub use fetch::{ByteStream, FetchResponse, Fetcher, HttpFetcher};

use crate::constants::{DOWNLOAD_EVENT_CAPACITY, ZIP_MAGIC};
use crate::core::{OtaError, OtaResult};
use bytes::BytesMut;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// One notification from a running download.
#[derive(Debug)]
pub enum DownloadEvent {
    /// Fraction of the declared length written so far, in `0.0..=1.0`.
    Progress(f64),
    /// The whole stream was written and the file closed.
    Completed { is_archive: bool },
    /// The download stopped. Nothing follows this event.
    Failed(OtaError),
}

/// Handle to a download running on a background task.
#[derive(Debug)]
pub struct DownloadTask {
    events: mpsc::Receiver<DownloadEvent>,
    handle: JoinHandle<()>,
}

impl DownloadTask {
    /// Next event, or `None` once the terminal event has been consumed.
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Drains the events, forwarding progress to `on_progress`.
    ///
    /// Returns the archive classification on `Completed`, or the error from
    /// `Failed`.
    pub async fn finish(mut self, mut on_progress: impl FnMut(f64)) -> OtaResult<bool> {
        while let Some(event) = self.events.recv().await {
            match event {
                DownloadEvent::Progress(fraction) => on_progress(fraction),
                DownloadEvent::Completed { is_archive } => return Ok(is_archive),
                DownloadEvent::Failed(err) => return Err(err),
            }
        }

        // The task ended without a terminal event, which only happens if it panicked.
        let reason = match self.handle.await {
            Err(join_error) => join_error.to_string(),
            Ok(()) => "download task ended without a result".to_string(),
        };
        Err(OtaError::TransportFailed {
            url: String::new(),
            reason,
        })
    }
}

/// Starts downloading `url` into `dest` on a background task.
///
/// `chunk_size` is clamped to at least the ZIP magic length so the first
/// chunk can always be sniffed.
pub fn download(
    fetcher: Arc<dyn Fetcher>,
    url: impl Into<String>,
    dest: impl Into<PathBuf>,
    chunk_size: usize,
) -> DownloadTask {
    let url = url.into();
    let dest = dest.into();
    let chunk_size = chunk_size.max(ZIP_MAGIC.len());
    let (tx, events) = mpsc::channel(DOWNLOAD_EVENT_CAPACITY);

    let handle = tokio::spawn(async move {
        let terminal = match stream_to_file(fetcher.as_ref(), &url, &dest, chunk_size, &tx).await
        {
            Ok(is_archive) => {
                debug!("Downloaded {} to {} (archive: {})", url, dest.display(), is_archive);
                DownloadEvent::Completed { is_archive }
            }
            Err(err) => {
                debug!("Download of {} failed: {}", url, err);
                DownloadEvent::Failed(err)
            }
        };
        // A dropped receiver means nobody is listening any more.
        let _ = tx.send(terminal).await;
    });

    DownloadTask { events, handle }
}

async fn stream_to_file(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    chunk_size: usize,
    tx: &mpsc::Sender<DownloadEvent>,
) -> OtaResult<bool> {
    let response = fetcher.fetch(url).await?;
    if !response.is_success() {
        return Err(OtaError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }
    let Some(mut body) = response.body else {
        return Err(OtaError::EmptyBody {
            url: url.to_string(),
        });
    };

    let file = File::create(dest)
        .await
        .map_err(|e| OtaError::fs("create download file", dest, e))?;
    let mut sink = ChunkSink {
        file,
        dest,
        tx,
        total: response.content_length.filter(|&len| len > 0),
        received: 0,
        is_archive: None,
    };

    let mut pending = BytesMut::with_capacity(chunk_size);
    while let Some(frame) = body.next().await {
        let frame = frame.map_err(|e| OtaError::TransportFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        pending.extend_from_slice(&frame);

        while pending.len() >= chunk_size {
            let chunk = pending.split_to(chunk_size);
            sink.write_chunk(&chunk).await?;
        }
    }
    if !pending.is_empty() {
        sink.write_chunk(&pending).await?;
    }

    sink.close().await
}

/// Writes fixed-size chunks, sniffs the first one and reports progress.
struct ChunkSink<'a> {
    file: File,
    dest: &'a Path,
    tx: &'a mpsc::Sender<DownloadEvent>,
    total: Option<u64>,
    received: u64,
    /// Set once, from the first chunk.
    is_archive: Option<bool>,
}

impl ChunkSink<'_> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> OtaResult<()> {
        self.is_archive.get_or_insert_with(|| chunk.starts_with(&ZIP_MAGIC));

        // tokio's File hands writes to a blocking thread; flush waits for it.
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| OtaError::fs("write download file", self.dest, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| OtaError::fs("write download file", self.dest, e))?;
        self.received += chunk.len() as u64;

        if let Some(total) = self.total {
            #[allow(clippy::cast_precision_loss)]
            let fraction = (self.received as f64 / total as f64).min(1.0);
            let _ = self.tx.send(DownloadEvent::Progress(fraction)).await;
        }
        Ok(())
    }

    /// Syncs and closes the file; an empty stream is not an archive.
    async fn close(self) -> OtaResult<bool> {
        self.file
            .sync_all()
            .await
            .map_err(|e| OtaError::fs("sync download file", self.dest, e))?;
        drop(self.file);
        Ok(self.is_archive.unwrap_or(false))
    }
}

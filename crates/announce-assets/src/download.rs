//! Streaming downloads with throttled progress events.
//!
//! The body is written chunk by chunk to a hidden temp file next to the
//! destination and renamed into place only after the whole payload arrived.
//! A failed download removes both the temp file and the destination, so the
//! next run sees the asset as missing rather than corrupted.
//!
//! Progress is published as [`DownloadEvent`]s on an optional channel. This
//! module never prints; rendering belongs to whoever holds the receiver.

use crate::error::DownloadError;
use announce_types::AssetEntry;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Default minimum spacing between two progress events for one file.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Progress is also reported on crossing each of these percentage steps.
const PERCENT_STEP: u64 = 25;

/// Without a step crossing, an update is sent after this many intervals.
const HEARTBEAT_INTERVALS: u32 = 4;

pub type EventSender = mpsc::UnboundedSender<DownloadEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<DownloadEvent>;

/// Creates a channel for download events.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// One transfer snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub filename: String,
    pub bytes_downloaded: u64,
    /// `None` when the server did not send a `Content-Length`.
    pub total_bytes: Option<u64>,
    pub timestamp: Instant,
}

impl ProgressEvent {
    pub fn percent(&self) -> Option<u64> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| self.bytes_downloaded.saturating_mul(100) / total)
    }
}

/// Everything the provisioning subsystem reports while it works.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A batch was planned.
    Planned {
        files: usize,
        estimated_bytes: u64,
        force: bool,
    },
    /// A file transfer began; `index` is 1-based within the batch.
    Started {
        index: usize,
        total_files: usize,
        filename: String,
        size_label: String,
    },
    Progress(ProgressEvent),
    Finished {
        filename: String,
        bytes: u64,
        elapsed: Duration,
    },
    Failed {
        filename: String,
        error: String,
    },
    /// A failed file is about to be attempted again.
    Retrying {
        filename: String,
        attempt: u32,
        delay: Duration,
    },
    /// Batch-level progress after each file, successful or not.
    BatchProgress { completed: usize, total: usize },
}

/// A single file to fetch. Consumed by exactly one [`Downloader::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Name used in events and logs.
    pub filename: String,
    pub url: String,
    pub destination: PathBuf,
    /// Size as declared by the catalog, for display only.
    pub size_label: String,
}

impl DownloadTask {
    pub fn for_entry(entry: &AssetEntry, voices_dir: &Path) -> Self {
        Self {
            filename: entry.filename.clone(),
            url: entry.url.clone(),
            destination: entry.path_in(voices_dir),
            size_label: entry.size_label.clone(),
        }
    }
}

/// Decides which chunks are worth a progress event.
///
/// Never emits twice within `interval`. Past that spacing, an event is sent
/// when the transfer crosses a new 25% step, or when `HEARTBEAT_INTERVALS`
/// intervals passed without one (the only trigger when the size is unknown).
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    total: Option<u64>,
    last_emit: Instant,
    last_step: u64,
}

impl ProgressThrottle {
    pub fn new(interval: Duration, total: Option<u64>, started: Instant) -> Self {
        Self {
            interval,
            total: total.filter(|t| *t > 0),
            last_emit: started,
            last_step: 0,
        }
    }

    pub fn should_emit(&mut self, received: u64, now: Instant) -> bool {
        let since = now.saturating_duration_since(self.last_emit);
        if since < self.interval {
            return false;
        }

        let step = self
            .total
            .map(|total| (received.saturating_mul(100) / total).min(100) / PERCENT_STEP)
            .unwrap_or(0);
        let crossed_step = step > self.last_step;
        let heartbeat = since >= self.interval * HEARTBEAT_INTERVALS;

        if crossed_step || heartbeat {
            self.last_emit = now;
            self.last_step = self.last_step.max(step);
            true
        } else {
            false
        }
    }
}

/// Fetches remote files to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    progress_interval: Duration,
    events: Option<EventSender>,
}

impl Downloader {
    pub fn new(client: reqwest::Client, progress_interval: Duration) -> Self {
        Self {
            client,
            progress_interval,
            events: None,
        }
    }

    /// Publishes events on `sender` from now on.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub(crate) fn emit(&self, event: DownloadEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is rendering.
            let _ = tx.send(event);
        }
    }

    /// Downloads `task.url` to `task.destination`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Any failure leaves neither the temp file nor the destination behind.
    pub async fn fetch(&self, task: &DownloadTask) -> Result<u64, DownloadError> {
        let started = Instant::now();
        let temp = temp_path(&task.destination);

        let result = match self.stream_to(task, &temp, started).await {
            Ok(bytes) => tokio::fs::rename(&temp, &task.destination)
                .await
                .map(|()| bytes)
                .map_err(|source| DownloadError::Io {
                    path: task.destination.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                tracing::debug!(
                    file = %task.filename,
                    bytes,
                    path = %task.destination.display(),
                    "download complete"
                );
                self.emit(DownloadEvent::Finished {
                    filename: task.filename.clone(),
                    bytes,
                    elapsed: started.elapsed(),
                });
                Ok(bytes)
            }
            Err(e) => {
                discard(&temp).await;
                discard(&task.destination).await;
                tracing::warn!(file = %task.filename, error = %e, "download failed");
                self.emit(DownloadEvent::Failed {
                    filename: task.filename.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        task: &DownloadTask,
        temp: &Path,
        started: Instant,
    ) -> Result<u64, DownloadError> {
        let url = task.url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        let io_err = |source| DownloadError::Io {
            path: temp.to_path_buf(),
            source,
        };

        if let Some(parent) = temp.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::File::create(temp).await.map_err(io_err)?;

        let mut throttle = ProgressThrottle::new(self.progress_interval, total, started);
        let mut received: u64 = 0;
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|source| DownloadError::Body {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(io_err)?;
            received += chunk.len() as u64;

            let now = Instant::now();
            if throttle.should_emit(received, now) {
                self.emit(DownloadEvent::Progress(ProgressEvent {
                    filename: task.filename.clone(),
                    bytes_downloaded: received,
                    total_bytes: total,
                    timestamp: now,
                }));
            }
        }

        file.flush().await.map_err(io_err)?;
        file.sync_all().await.map_err(io_err)?;
        drop(file);

        if let Some(expected) = total {
            if received < expected {
                return Err(DownloadError::Truncated {
                    url: url.to_string(),
                    expected,
                    received,
                });
            }
        }

        Ok(received)
    }
}

/// Hidden sibling of `destination` that receives the body while it streams.
fn temp_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    destination.with_file_name(format!(".{name}.{}.part", uuid::Uuid::new_v4().simple()))
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove partial download"),
    }
}

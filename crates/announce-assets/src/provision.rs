//! Provisioning orchestrator: brings a voice directory up to the catalog.

use crate::download::{DownloadEvent, DownloadTask, Downloader};
use crate::error::DownloadError;
use crate::resolver::{self, ResolutionReport};
use announce_types::{AssetEntry, Catalog, VoiceKey};
use std::path::Path;
use std::time::Duration;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded retry for a single file.
///
/// The default of one attempt means "no retry": a failed file is reported
/// and the next run picks it up as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// A file that could not be fetched in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub entry: AssetEntry,
    pub attempts: u32,
    pub error: String,
}

/// Outcome of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProvisioningSummary {
    /// Files queued for download.
    pub queued: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of the queued files' declared sizes.
    pub estimated_bytes: u64,
    pub failures: Vec<FailedDownload>,
    /// Voices with both files present once the run finished.
    pub ready: Vec<VoiceKey>,
}

impl ProvisioningSummary {
    pub fn is_noop(&self) -> bool {
        self.queued == 0
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Runs provisioning for one catalog.
#[derive(Debug, Clone)]
pub struct Provisioner {
    catalog: Catalog,
    downloader: Downloader,
    retry: RetryPolicy,
}

impl Provisioner {
    pub fn new(catalog: Catalog, downloader: Downloader, retry: RetryPolicy) -> Self {
        Self {
            catalog,
            downloader,
            retry,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Fresh availability report for `voices_dir`.
    pub fn status(&self, voices_dir: &Path) -> ResolutionReport {
        resolver::resolve(&self.catalog, voices_dir)
    }

    /// Files a run would download: every catalog file when `force` is set,
    /// otherwise exactly the missing ones. Catalog order either way.
    pub fn plan(&self, voices_dir: &Path, force: bool) -> Vec<AssetEntry> {
        if force {
            self.catalog.entries()
        } else {
            self.status(voices_dir).missing_entries()
        }
    }

    /// Downloads what [`plan`](Self::plan) selects, one file at a time.
    ///
    /// Never fails as a whole: each file's error is caught, counted and
    /// reported in the summary so the caller can carry on.
    pub async fn provision(&self, voices_dir: &Path, force: bool) -> ProvisioningSummary {
        let queue = self.plan(voices_dir, force);
        let estimated_bytes = queue.iter().filter_map(AssetEntry::approx_bytes).sum();
        let mut summary = ProvisioningSummary {
            queued: queue.len(),
            estimated_bytes,
            ..ProvisioningSummary::default()
        };

        if queue.is_empty() {
            tracing::info!(path = %voices_dir.display(), "all voice files already present");
            summary.ready = self.ready_voices(voices_dir);
            return summary;
        }

        tracing::info!(
            files = queue.len(),
            estimated_mb = estimated_bytes / (1024 * 1024),
            force,
            path = %voices_dir.display(),
            "starting voice downloads"
        );
        self.downloader.emit(DownloadEvent::Planned {
            files: queue.len(),
            estimated_bytes,
            force,
        });

        let total = queue.len();
        for (i, entry) in queue.iter().enumerate() {
            self.downloader.emit(DownloadEvent::Started {
                index: i + 1,
                total_files: total,
                filename: entry.filename.clone(),
                size_label: entry.size_label.clone(),
            });

            let task = DownloadTask::for_entry(entry, voices_dir);
            match self.fetch_with_retry(&task).await {
                Ok(_) => summary.succeeded += 1,
                Err((attempts, e)) => {
                    summary.failed += 1;
                    summary.failures.push(FailedDownload {
                        entry: entry.clone(),
                        attempts,
                        error: e.to_string(),
                    });
                }
            }

            self.downloader.emit(DownloadEvent::BatchProgress {
                completed: i + 1,
                total,
            });
        }

        summary.ready = self.ready_voices(voices_dir);
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            ready = summary.ready.len(),
            "voice downloads finished"
        );
        summary
    }

    async fn fetch_with_retry(&self, task: &DownloadTask) -> Result<u64, (u32, DownloadError)> {
        let mut attempt = 1;
        loop {
            match self.downloader.fetch(task).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.retry.max_attempts && e.is_retryable() => {
                    let delay = self.retry.delay_after(attempt);
                    attempt += 1;
                    self.downloader.emit(DownloadEvent::Retrying {
                        filename: task.filename.clone(),
                        attempt,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((attempt, e)),
            }
        }
    }

    fn ready_voices(&self, voices_dir: &Path) -> Vec<VoiceKey> {
        self.status(voices_dir)
            .present
            .into_iter()
            .map(|v| v.key)
            .collect()
    }
}

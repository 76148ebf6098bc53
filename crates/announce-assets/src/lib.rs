//! Asset provisioning for the announcement toolchain.
//!
//! Makes sure the Piper voice models, their configs and the engine binary
//! exist locally before synthesis needs them:
//!
//! - [`directory`] resolves the single voice directory a run works in.
//! - [`resolver`] classifies catalog voices as present or missing.
//! - [`download`] streams one file to disk with progress events and
//!   leaves nothing behind on failure.
//! - [`provision`] drives the downloader over the catalog, isolating
//!   per-file failures and skipping files already on disk.
//! - [`binaries`] locates or installs the engine executable.

pub mod binaries;
pub mod directory;
pub mod download;
mod error;
pub mod provision;
pub mod resolver;

pub use binaries::{current_platform, locate_engine, BinaryProvisioner, BinarySummary};
pub use directory::{resolve_voices_dir, DirectoryHints};
pub use download::{
    event_channel, DownloadEvent, DownloadTask, Downloader, EventReceiver, EventSender,
    ProgressEvent, DEFAULT_PROGRESS_INTERVAL,
};
pub use error::{AssetError, DownloadError};
pub use provision::{FailedDownload, Provisioner, ProvisioningSummary, RetryPolicy};
pub use resolver::{is_asset_present, resolve, MissingVoice, ResolutionReport};

use std::time::Duration;

/// Builds the HTTP client used for all downloads.
///
/// `connect_timeout` bounds connection setup and `read_timeout` bounds each
/// idle gap in the body. The transfer as a whole is not time-limited so large
/// models on slow links can still complete.
pub fn http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<reqwest::Client, AssetError> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .user_agent(concat!("piper-announce/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(AssetError::Client)
}

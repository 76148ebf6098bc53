//! Error types for asset provisioning.

use std::path::PathBuf;

/// Failure fetching a single remote file.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request could not be sent or no response headers arrived.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The connection broke while the body was streaming.
    #[error("download of {url} interrupted: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body ended before the advertised `Content-Length`.
    #[error("download of {url} truncated: got {received} of {expected} bytes")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    /// Writing the payload to disk failed.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than timeouts and rate limiting are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                !(400..500).contains(status) || *status == 408 || *status == 429
            }
            Self::Request { .. } | Self::Body { .. } | Self::Truncated { .. } => true,
            Self::Io { .. } => false,
        }
    }
}

/// Errors raised by provisioning operations other than a single download.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// No prebuilt engine exists for this OS/architecture.
    #[error("unsupported platform: {os}-{arch}; install piper manually and set PIPER_BIN")]
    UnsupportedPlatform { os: String, arch: String },

    /// The voices or binaries directory could not be prepared.
    #[error("failed to prepare directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unpacking an engine archive failed.
    #[error("failed to extract {}: {message}", .archive.display())]
    Extract { archive: PathBuf, message: String },

    /// The archive unpacked but the expected executable is not in it.
    #[error("engine executable not found at {} after extraction", .path.display())]
    MissingExecutable { path: PathBuf },

    #[error("failed to set permissions on {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

//! Voice directory resolution.
//!
//! A provisioning run or a synthesis request resolves the directory exactly
//! once and uses it for every lookup and write that follows.

use crate::error::AssetError;
use std::path::{Path, PathBuf};

/// Subdirectory name used by every conventional location.
const VOICES_SUBDIR: &str = "voices";

/// Locations consulted when resolving the voice directory, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryHints {
    /// Explicit override (config file or `VOICES_DIR`). Always wins.
    pub override_dir: Option<PathBuf>,
    /// Current working directory; `<cwd>/voices` is tried first.
    pub working_dir: Option<PathBuf>,
    /// Directory of the installed executable; `<install>/voices` is next.
    pub install_dir: Option<PathBuf>,
    /// User home; `<home>/.piper/voices` is the last convention.
    pub home_dir: Option<PathBuf>,
}

impl DirectoryHints {
    /// Hints for the running process with an optional explicit override.
    pub fn detect(override_dir: Option<PathBuf>) -> Self {
        Self {
            override_dir,
            working_dir: std::env::current_dir().ok(),
            install_dir: std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf)),
            home_dir: dirs::home_dir(),
        }
    }

    /// Conventional locations, excluding the override.
    pub fn conventional(&self) -> Vec<PathBuf> {
        let mut out = Vec::with_capacity(3);
        if let Some(cwd) = &self.working_dir {
            out.push(cwd.join(VOICES_SUBDIR));
        }
        if let Some(install) = &self.install_dir {
            out.push(install.join(VOICES_SUBDIR));
        }
        if let Some(home) = &self.home_dir {
            out.push(home.join(".piper").join(VOICES_SUBDIR));
        }
        out
    }

    /// Where a fresh directory is created when nothing exists yet.
    fn default_dir(&self) -> PathBuf {
        self.working_dir
            .as_ref()
            .or(self.home_dir.as_ref())
            .map(|base| base.join(VOICES_SUBDIR))
            .unwrap_or_else(|| PathBuf::from(VOICES_SUBDIR))
    }
}

/// Resolves the voice directory.
///
/// Order: explicit override (created if absent), then the first existing
/// conventional location, then a newly created `<cwd>/voices`.
///
/// # Errors
///
/// Returns `AssetError::Directory` if the chosen directory cannot be created.
pub fn resolve_voices_dir(hints: &DirectoryHints) -> Result<PathBuf, AssetError> {
    if let Some(dir) = &hints.override_dir {
        ensure_dir(dir)?;
        return Ok(dir.clone());
    }

    if let Some(existing) = hints.conventional().into_iter().find(|d| d.is_dir()) {
        return Ok(existing);
    }

    let dir = hints.default_dir();
    ensure_dir(&dir)?;
    tracing::info!(path = %dir.display(), "created voices directory");
    Ok(dir)
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), AssetError> {
    std::fs::create_dir_all(dir).map_err(|source| AssetError::Directory {
        path: dir.to_path_buf(),
        source,
    })
}

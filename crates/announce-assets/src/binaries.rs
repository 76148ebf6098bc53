//! Piper engine binaries: locating the executable and installing releases.

use crate::directory::ensure_dir;
use crate::download::{DownloadEvent, DownloadTask, Downloader};
use crate::error::AssetError;
use announce_exec::{CommandRunner, Invocation};
use announce_types::{EngineBinary, Platform};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The platform this process runs on.
///
/// # Errors
///
/// `AssetError::UnsupportedPlatform` when no engine build exists for it.
pub fn current_platform() -> Result<Platform, AssetError> {
    Platform::current().ok_or_else(|| AssetError::UnsupportedPlatform {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    })
}

fn engine_binary_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "piper.exe"
    } else {
        "piper"
    }
}

/// Searches PATH for the piper executable.
fn find_engine_in_path() -> Option<PathBuf> {
    let name = engine_binary_name();
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let full = dir.join(name);
            if full.is_file() {
                Some(full)
            } else {
                None
            }
        })
    })
}

/// Picks the engine executable: explicit override, then the bundled build
/// for this platform under `binaries_dir`, then PATH, then the bare name.
pub fn locate_engine(override_path: Option<&Path>, binaries_dir: &Path) -> PathBuf {
    if let Some(path) = override_path {
        return path.to_path_buf();
    }

    if let Some(platform) = Platform::current() {
        let bundled = platform.engine_binary().executable_path(binaries_dir);
        if bundled.is_file() {
            return bundled;
        }
    }

    find_engine_in_path().unwrap_or_else(|| PathBuf::from(engine_binary_name()))
}

/// Outcome of a binary provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySummary {
    pub installed: Vec<Platform>,
    /// Platforms whose executable was already present.
    pub skipped: Vec<Platform>,
    pub failures: Vec<(Platform, String)>,
}

impl BinarySummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Downloads and unpacks engine release archives.
#[derive(Debug, Clone)]
pub struct BinaryProvisioner {
    downloader: Downloader,
    runner: Arc<dyn CommandRunner>,
    binaries_dir: PathBuf,
}

impl BinaryProvisioner {
    pub fn new(
        downloader: Downloader,
        runner: Arc<dyn CommandRunner>,
        binaries_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            runner,
            binaries_dir: binaries_dir.into(),
        }
    }

    /// Installs the engine for each platform. Per-platform failures are
    /// collected, never propagated.
    pub async fn provision(&self, platforms: &[Platform], force: bool) -> BinarySummary {
        let mut summary = BinarySummary::default();
        let total = platforms.len();

        for (i, platform) in platforms.iter().copied().enumerate() {
            let binary = platform.engine_binary();
            let executable = binary.executable_path(&self.binaries_dir);
            if !force && executable.is_file() {
                tracing::info!(%platform, path = %executable.display(), "engine already installed");
                summary.skipped.push(platform);
                continue;
            }

            self.downloader.emit(DownloadEvent::Started {
                index: i + 1,
                total_files: total,
                filename: binary.archive.clone(),
                size_label: binary.size_label.clone(),
            });

            match self.install(&binary).await {
                Ok(path) => {
                    tracing::info!(%platform, path = %path.display(), "engine installed");
                    summary.installed.push(platform);
                }
                Err(e) => {
                    tracing::error!(%platform, error = %e, "engine install failed");
                    summary.failures.push((platform, e.to_string()));
                }
            }
        }

        summary
    }

    /// Downloads, extracts and marks executable one release archive.
    pub async fn install(&self, binary: &EngineBinary) -> Result<PathBuf, AssetError> {
        let platform_dir = binary.platform_dir(&self.binaries_dir);
        ensure_dir(&platform_dir)?;

        let archive = platform_dir.join(&binary.archive);
        let task = DownloadTask {
            filename: binary.archive.clone(),
            url: binary.url.clone(),
            destination: archive.clone(),
            size_label: binary.size_label.clone(),
        };
        self.downloader.fetch(&task).await?;

        let extracted = self.extract(binary, &archive, &platform_dir).await;
        if let Err(e) = std::fs::remove_file(&archive) {
            tracing::warn!(path = %archive.display(), error = %e, "failed to remove archive");
        }
        extracted?;

        let executable = binary.executable_path(&self.binaries_dir);
        if !executable.is_file() {
            return Err(AssetError::MissingExecutable { path: executable });
        }
        make_executable(&executable)?;
        Ok(executable)
    }

    async fn extract(
        &self,
        binary: &EngineBinary,
        archive: &Path,
        into: &Path,
    ) -> Result<(), AssetError> {
        let invocation = extract_invocation(binary, archive, into);
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| AssetError::Extract {
                archive: archive.to_path_buf(),
                message: e.to_string(),
            })?;

        if !output.is_success() {
            return Err(AssetError::Extract {
                archive: archive.to_path_buf(),
                message: output.diagnostics().to_string(),
            });
        }
        Ok(())
    }
}

/// `tar xzf` for tarballs; `unzip` (or `Expand-Archive` on Windows) for zips.
fn extract_invocation(binary: &EngineBinary, archive: &Path, into: &Path) -> Invocation {
    if !binary.is_zip() {
        return Invocation::new("tar")
            .arg("xzf")
            .arg(archive)
            .arg("-C")
            .arg(into);
    }

    if cfg!(target_os = "windows") {
        Invocation::new("powershell").args([
            "-Command".to_string(),
            format!(
                "Expand-Archive -Path '{}' -DestinationPath '{}' -Force",
                archive.display(),
                into.display()
            ),
        ])
    } else {
        Invocation::new("unzip")
            .arg("-o")
            .arg(archive)
            .arg("-d")
            .arg(into)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), AssetError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        AssetError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), AssetError> {
    Ok(())
}

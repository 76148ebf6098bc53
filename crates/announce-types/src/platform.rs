//! Platforms with a prebuilt Piper release and where its executable lives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Piper release the engine archives are pinned to.
pub const PIPER_RELEASE: &str = "v1.2.0";

/// Operating system / architecture pairs with a published engine build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "linux-x64")]
    LinuxX64,
    #[serde(rename = "win32-x64")]
    WindowsX64,
    #[serde(rename = "darwin-x64")]
    MacosX64,
    #[serde(rename = "darwin-arm64")]
    MacosArm64,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::LinuxX64,
        Platform::WindowsX64,
        Platform::MacosX64,
        Platform::MacosArm64,
    ];

    /// Maps an `std::env::consts` style (os, arch) pair onto a platform.
    pub fn from_os_arch(os: &str, arch: &str) -> Option<Self> {
        match (os, arch) {
            ("linux", "x86_64") => Some(Self::LinuxX64),
            ("windows", "x86_64") => Some(Self::WindowsX64),
            ("macos", "x86_64") => Some(Self::MacosX64),
            ("macos", "aarch64") => Some(Self::MacosArm64),
            _ => None,
        }
    }

    /// The platform this process runs on, if an engine build exists for it.
    pub fn current() -> Option<Self> {
        Self::from_os_arch(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxX64 => "linux-x64",
            Self::WindowsX64 => "win32-x64",
            Self::MacosX64 => "darwin-x64",
            Self::MacosArm64 => "darwin-arm64",
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Self::WindowsX64)
    }

    /// The release archive for this platform.
    pub fn engine_binary(self) -> EngineBinary {
        let (archive, size_label) = match self {
            Self::LinuxX64 => ("piper_linux_x86_64.tar.gz", "45MB"),
            Self::WindowsX64 => ("piper_windows_amd64.zip", "42MB"),
            Self::MacosX64 => ("piper_macos_x86_64.tar.gz", "48MB"),
            Self::MacosArm64 => ("piper_macos_aarch64.tar.gz", "46MB"),
        };
        EngineBinary {
            platform: self,
            url: format!("https://github.com/rhasspy/piper/releases/download/{PIPER_RELEASE}/{archive}"),
            archive: archive.to_string(),
            executable: if self.is_windows() {
                "piper/piper.exe"
            } else {
                "piper/piper"
            }
            .to_string(),
            size_label: size_label.to_string(),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParsePlatformError(s.to_string()))
    }
}

/// Error returned when parsing an unknown platform key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct ParsePlatformError(pub String);

/// A downloadable engine archive and the executable it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineBinary {
    pub platform: Platform,
    pub url: String,
    /// Archive filename, `.tar.gz` or `.zip`.
    pub archive: String,
    /// Executable path relative to the extraction directory.
    pub executable: String,
    pub size_label: String,
}

impl EngineBinary {
    /// Directory the archive is extracted into: `<binaries_dir>/<platform>`.
    pub fn platform_dir(&self, binaries_dir: &Path) -> PathBuf {
        binaries_dir.join(self.platform.as_str())
    }

    pub fn executable_path(&self, binaries_dir: &Path) -> PathBuf {
        let mut path = self.platform_dir(binaries_dir);
        for part in self.executable.split('/') {
            path.push(part);
        }
        path
    }

    pub fn is_zip(&self) -> bool {
        self.archive.ends_with(".zip")
    }
}

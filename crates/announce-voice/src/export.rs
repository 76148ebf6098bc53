//! Transcoding the primary WAV into distribution formats.

use crate::error::VoiceError;
use crate::synth::{discard, run_stage};
use announce_exec::{CommandRunner, Invocation};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFormat {
    Mp3,
    Opus,
    M4a,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Opus, AudioFormat::M4a];

    /// Case-insensitive; `aac` is accepted for m4a.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "opus" => Some(Self::Opus),
            "m4a" | "aac" => Some(Self::M4a),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::M4a => "m4a",
        }
    }

    /// Codec and quality arguments for ffmpeg.
    pub fn codec_args(self) -> [&'static str; 4] {
        match self {
            Self::Mp3 => ["-c:a", "libmp3lame", "-q:a", "2"],
            Self::Opus => ["-c:a", "libopus", "-b:a", "96k"],
            Self::M4a => ["-c:a", "aac", "-b:a", "192k"],
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported audio format: {0}")]
pub struct ParseFormatError(pub String);

impl FromStr for AudioFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

/// One successfully written export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub format: AudioFormat,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExportStage {
    ffmpeg: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ExportStage {
    pub fn new(ffmpeg: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            runner,
        }
    }

    pub fn invocation(&self, source: &Path, format: AudioFormat, output: &Path) -> Invocation {
        Invocation::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(format.codec_args())
            .arg(output)
    }

    /// Transcodes `source` into each requested format, in request order.
    ///
    /// Unknown and repeated labels are skipped. The first failing format
    /// aborts the call; its partial file is removed, formats already written
    /// stay on disk.
    pub async fn export(
        &self,
        source: &Path,
        formats: &[String],
    ) -> Result<Vec<ExportedFile>, VoiceError> {
        let mut exported: Vec<ExportedFile> = Vec::new();

        for label in formats {
            let Some(format) = AudioFormat::parse(label) else {
                tracing::warn!(format = %label, "skipping unsupported export format");
                continue;
            };
            if exported.iter().any(|e| e.format == format) {
                continue;
            }

            let output = source.with_extension(format.extension());
            let invocation = self.invocation(source, format, &output);
            let stage = format!("export to {format}");
            let result = run_stage(self.runner.as_ref(), &invocation, &output, &stage).await?;
            if !result.is_success() || !output.is_file() {
                discard(&output);
                return Err(VoiceError::ExportFailed {
                    format,
                    command: invocation.to_string(),
                    output: result,
                });
            }

            tracing::info!(%format, path = %output.display(), "exported audio");
            exported.push(ExportedFile {
                format,
                path: output,
            });
        }

        Ok(exported)
    }
}

//! Text in, finished announcement out.

use crate::error::VoiceError;
use crate::export::{ExportStage, ExportedFile};
use crate::master::MasteringChain;
use crate::rewrite::{style_note, AnnouncementWriter};
use crate::style::Style;
use crate::synth::{discard, SynthesisInvoker, SynthesisRequest};
use crate::text::polish_text;
use announce_exec::CommandRunner;
use announce_types::{Catalog, Gender, VoiceKey};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the pipeline reads voices, which executables it runs and where it
/// writes audio.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub voices_dir: PathBuf,
    pub output_dir: PathBuf,
    pub engine: PathBuf,
    pub ffmpeg: PathBuf,
}

fn default_style() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// One announcement job. Deserializes from the JSON input file format.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementRequest {
    pub text: String,
    #[serde(rename = "lang")]
    pub language: String,
    pub gender: Gender,
    #[serde(default = "default_style")]
    pub style: String,
    /// Tone description used by the writer when `style` is `custom`.
    #[serde(default)]
    pub custom_style: Option<String>,
    #[serde(default = "default_true")]
    pub master: bool,
    #[serde(default, rename = "export_formats")]
    pub formats: Vec<String>,
    /// Keep the WAV next to the exports instead of replacing it.
    #[serde(default)]
    pub keep_intermediate: bool,
    #[serde(default)]
    pub speaker: Option<u32>,
}

impl AnnouncementRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>, gender: Gender) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            gender,
            style: default_style(),
            custom_style: None,
            master: true,
            formats: Vec::new(),
            keep_intermediate: false,
            speaker: None,
        }
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn master(mut self, master: bool) -> Self {
        self.master = master;
        self
    }

    pub fn keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }
}

/// The outcome of a run: the spoken text, the one primary file and any
/// exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub text: String,
    pub primary: PathBuf,
    pub exports: Vec<ExportedFile>,
}

/// File names for one run, sharing a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub raw: PathBuf,
    pub mastered: PathBuf,
}

impl OutputNames {
    pub fn new(
        dir: &Path,
        language: &str,
        style: &str,
        gender: Gender,
        at: DateTime<Local>,
    ) -> Self {
        let stem = format!(
            "{}_{}_{}_{}",
            file_safe(language),
            file_safe(style),
            gender.as_str(),
            at.format("%Y%m%d_%H%M%S_%3f")
        );
        Self {
            raw: dir.join(format!("raw_{stem}.wav")),
            mastered: dir.join(format!("announcement_{stem}.wav")),
        }
    }
}

fn file_safe(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// Synthesis, mastering and export with the retention rules applied:
/// mastering replaces the raw file; exports replace the WAV unless the
/// request keeps it.
#[derive(Debug, Clone)]
pub struct AnnouncementPipeline {
    output_dir: PathBuf,
    invoker: SynthesisInvoker,
    mastering: MasteringChain,
    export: ExportStage,
    writer: Option<Arc<dyn AnnouncementWriter>>,
}

impl AnnouncementPipeline {
    pub fn new(config: PipelineConfig, catalog: Catalog, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            invoker: SynthesisInvoker::new(
                config.engine,
                catalog,
                config.voices_dir,
                Arc::clone(&runner),
            ),
            mastering: MasteringChain::new(config.ffmpeg.clone(), Arc::clone(&runner)),
            export: ExportStage::new(config.ffmpeg, runner),
            output_dir: config.output_dir,
            writer: None,
        }
    }

    /// Routes every request's text through `writer` before synthesis.
    pub fn with_writer(mut self, writer: Arc<dyn AnnouncementWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub async fn run(&self, request: &AnnouncementRequest) -> Result<AudioArtifact, VoiceError> {
        let style = Style::from_label(&request.style);
        let voice = VoiceKey::new(&request.language, request.gender);

        let draft = match &self.writer {
            Some(writer) => {
                let note = style_note(&request.style, request.custom_style.as_deref());
                writer.rewrite(&request.text, &voice.language, note).await?
            }
            None => request.text.clone(),
        };
        let text = polish_text(&draft, style)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|source| VoiceError::Io {
            path: self.output_dir.clone(),
            source,
        })?;
        let names = OutputNames::new(
            &self.output_dir,
            &voice.language,
            &request.style,
            request.gender,
            Local::now(),
        );

        let mut parameters = style.parameters();
        if let Some(speaker) = request.speaker {
            parameters = parameters.with_speaker(speaker);
        }
        let synthesis = SynthesisRequest {
            text: text.clone(),
            voice: voice.clone(),
            parameters,
            extra_args: Vec::new(),
            output: names.raw.clone(),
        };
        let mut primary = self.invoker.synthesize(&synthesis).await?;

        if request.master {
            primary = self.mastering.master(&primary, &names.mastered).await?;
            discard(&names.raw);
        }

        let mut exports = Vec::new();
        if !request.formats.is_empty() {
            exports = self.export.export(&primary, &request.formats).await?;
            if !request.keep_intermediate {
                if let Some(first) = exports.first() {
                    discard(&primary);
                    primary = first.path.clone();
                }
            }
        }

        tracing::info!(
            voice = %voice,
            style = %style,
            primary = %primary.display(),
            exports = exports.len(),
            "announcement ready"
        );
        Ok(AudioArtifact {
            text,
            primary,
            exports,
        })
    }
}

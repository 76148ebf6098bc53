//! Voice catalog: which files each voice needs and where they come from.
//!
//! The catalog is an explicit value rather than a global table so that
//! provisioning runs and tests can be pointed at a different source (a local
//! mirror, a test server) without touching the built-in definitions.

use crate::{Gender, VoiceKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Base URL of the upstream Piper voice repository.
pub const PIPER_VOICES_BASE_URL: &str = "https://huggingface.co/rhasspy/piper-voices/resolve/main";

/// The two files every voice is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// ONNX model weights (`.onnx`).
    Model,
    /// Model configuration (`.onnx.json`).
    Config,
}

impl AssetKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Model => "Voice Model",
            Self::Config => "Config",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Config => "config",
        })
    }
}

/// A single downloadable file descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    pub filename: String,
    pub url: String,
    /// Human-readable size as advertised upstream, e.g. `"63MB"`.
    pub size_label: String,
}

impl AssetFile {
    pub fn new(
        filename: impl Into<String>,
        url: impl Into<String>,
        size_label: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            size_label: size_label.into(),
        }
    }
}

/// A catalog voice: one language/gender pair backed by a model and a config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSpec {
    /// Upstream voice identifier, e.g. `en_GB-alan-low`.
    pub id: String,
    pub key: VoiceKey,
    /// Display label for the language, e.g. `English (GB)`.
    pub language_label: String,
    pub quality: String,
    pub model: AssetFile,
    pub config: AssetFile,
}

impl VoiceSpec {
    pub fn file(&self, kind: AssetKind) -> &AssetFile {
        match kind {
            AssetKind::Model => &self.model,
            AssetKind::Config => &self.config,
        }
    }

    pub fn model_path(&self, voices_dir: &Path) -> PathBuf {
        voices_dir.join(&self.model.filename)
    }

    pub fn config_path(&self, voices_dir: &Path) -> PathBuf {
        voices_dir.join(&self.config.filename)
    }

    /// Both asset entries of this voice, model first.
    pub fn entries(&self) -> [AssetEntry; 2] {
        [self.entry(AssetKind::Model), self.entry(AssetKind::Config)]
    }

    pub fn entry(&self, kind: AssetKind) -> AssetEntry {
        let file = self.file(kind);
        AssetEntry {
            voice_id: self.id.clone(),
            key: self.key.clone(),
            kind,
            filename: file.filename.clone(),
            url: file.url.clone(),
            size_label: file.size_label.clone(),
        }
    }
}

/// One file of one voice, flattened for download queues and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Logical name of the owning voice.
    pub voice_id: String,
    pub key: VoiceKey,
    pub kind: AssetKind,
    pub filename: String,
    pub url: String,
    pub size_label: String,
}

impl AssetEntry {
    pub fn path_in(&self, voices_dir: &Path) -> PathBuf {
        voices_dir.join(&self.filename)
    }

    /// Approximate size in bytes parsed from the size label.
    pub fn approx_bytes(&self) -> Option<u64> {
        parse_size_label(&self.size_label)
    }
}

/// The set of voices a process knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    voices: Vec<VoiceSpec>,
}

impl Catalog {
    pub fn new(voices: Vec<VoiceSpec>) -> Self {
        Self { voices }
    }

    /// The voices shipped with the tool.
    pub fn builtin() -> Self {
        let voices = BUILTIN_VOICES.iter().map(builtin_voice).collect();
        Self { voices }
    }

    pub fn voices(&self) -> &[VoiceSpec] {
        &self.voices
    }

    pub fn find(&self, key: &VoiceKey) -> Option<&VoiceSpec> {
        self.voices.iter().find(|v| &v.key == key)
    }

    /// Every asset file in catalog order, each voice's model before its config.
    pub fn entries(&self) -> Vec<AssetEntry> {
        self.voices.iter().flat_map(VoiceSpec::entries).collect()
    }

    /// Distinct language codes in catalog order.
    pub fn languages(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for voice in &self.voices {
            if !out.contains(&voice.key.language.as_str()) {
                out.push(&voice.key.language);
            }
        }
        out
    }
}

struct BuiltinVoice {
    id: &'static str,
    language_label: &'static str,
    gender: Gender,
    quality: &'static str,
    model_size: &'static str,
    config_size: &'static str,
}

const BUILTIN_VOICES: &[BuiltinVoice] = &[
    BuiltinVoice {
        id: "en_GB-jenny_dioco-medium",
        language_label: "English (GB)",
        gender: Gender::Female,
        quality: "Medium",
        model_size: "63MB",
        config_size: "2KB",
    },
    BuiltinVoice {
        id: "en_GB-alan-low",
        language_label: "English (GB)",
        gender: Gender::Male,
        quality: "Low",
        model_size: "22MB",
        config_size: "2KB",
    },
    BuiltinVoice {
        id: "es_ES-mls_10246-low",
        language_label: "Spanish (ES)",
        gender: Gender::Female,
        quality: "Low",
        model_size: "22MB",
        config_size: "2KB",
    },
    BuiltinVoice {
        id: "es_ES-carlfm-x_low",
        language_label: "Spanish (ES)",
        gender: Gender::Male,
        quality: "Extra Low",
        model_size: "9MB",
        config_size: "1KB",
    },
    BuiltinVoice {
        id: "ca_ES-upc_ona-x_low",
        language_label: "Catalan (ES)",
        gender: Gender::Female,
        quality: "Extra Low",
        model_size: "9MB",
        config_size: "1KB",
    },
    BuiltinVoice {
        id: "ca_ES-upc_pau-x_low",
        language_label: "Catalan (ES)",
        gender: Gender::Male,
        quality: "Extra Low",
        model_size: "9MB",
        config_size: "1KB",
    },
];

/// Expands an upstream voice id (`<locale>-<name>-<quality>`) into its
/// repository layout: `<lang>/<locale>/<name>/<quality>/<id>.onnx`.
fn builtin_voice(voice: &BuiltinVoice) -> VoiceSpec {
    let id = voice.id;
    let mut parts = id.splitn(3, '-');
    let locale = parts.next().unwrap_or_default();
    let name = parts.next().unwrap_or_default();
    let quality_dir = parts.next().unwrap_or_default();
    let language = locale.split('_').next().unwrap_or(locale);

    let dir = format!("{PIPER_VOICES_BASE_URL}/{language}/{locale}/{name}/{quality_dir}");
    let model_name = format!("{id}.onnx");
    let config_name = format!("{id}.onnx.json");

    VoiceSpec {
        id: id.to_string(),
        key: VoiceKey::new(language, voice.gender),
        language_label: voice.language_label.to_string(),
        quality: voice.quality.to_string(),
        model: AssetFile::new(&model_name, format!("{dir}/{model_name}"), voice.model_size),
        config: AssetFile::new(
            &config_name,
            format!("{dir}/{config_name}"),
            voice.config_size,
        ),
    }
}

/// Parses labels like `"63MB"`, `"2KB"` or `"1.5 GB"` into bytes.
pub fn parse_size_label(label: &str) -> Option<u64> {
    let label = label.trim();
    let split = label
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(label.len());
    let (number, unit) = label.split_at(split);
    let value: f64 = number.parse().ok()?;
    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTES" => 1.0,
        "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * multiplier).round() as u64)
}

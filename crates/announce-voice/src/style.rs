//! Delivery styles and the fixed synthesis parameters each one maps to.

use std::fmt;

/// A delivery style. Any label outside the known set is [`Style::Neutral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    Urgent,
    Formal,
    Friendly,
    Neutral,
}

impl Style {
    /// Case-insensitive; unknown labels (including `custom`) are neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "urgent" => Self::Urgent,
            "formal" => Self::Formal,
            "friendly" => Self::Friendly,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Formal => "formal",
            Self::Friendly => "friendly",
            Self::Neutral => "default",
        }
    }

    pub fn parameters(self) -> SynthesisParameters {
        match self {
            Self::Urgent => SynthesisParameters::preset(0.94, 0.55, 0.60, 0.22),
            Self::Formal => SynthesisParameters::preset(1.08, 0.40, 0.50, 0.30),
            Self::Friendly => SynthesisParameters::preset(1.02, 0.45, 0.50, 0.32),
            Self::Neutral => SynthesisParameters::preset(1.00, 0.50, 0.50, 0.28),
        }
    }

    /// Tone guidance handed to the announcement writer.
    pub fn note(self) -> &'static str {
        match self {
            Self::Urgent => "Direct, time-sensitive, clear call-to-action.",
            Self::Formal => "Polite, concise, professional.",
            Self::Friendly => "Warm, welcoming, upbeat.",
            Self::Neutral => "Clear, neutral tone.",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a style label to its parameter set.
pub fn resolve_style(label: &str) -> SynthesisParameters {
    Style::from_label(label).parameters()
}

/// Piper prosody controls.
///
/// Only obtainable from a [`Style`], so every announcement in a given style
/// sounds the same. The speaker index is the single per-request knob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParameters {
    length_scale: f64,
    noise_scale: f64,
    noise_w: f64,
    sentence_silence: f64,
    speaker: Option<u32>,
}

impl SynthesisParameters {
    const fn preset(length_scale: f64, noise_scale: f64, noise_w: f64, sentence_silence: f64) -> Self {
        Self {
            length_scale,
            noise_scale,
            noise_w,
            sentence_silence,
            speaker: None,
        }
    }

    /// Selects a speaker of a multi-speaker model.
    pub fn with_speaker(mut self, speaker: u32) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// Speaking rate; above 1.0 is slower.
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn noise_scale(&self) -> f64 {
        self.noise_scale
    }

    pub fn noise_w(&self) -> f64 {
        self.noise_w
    }

    /// Pause between sentences, in seconds.
    pub fn sentence_silence(&self) -> f64 {
        self.sentence_silence
    }

    pub fn speaker(&self) -> Option<u32> {
        self.speaker
    }

    /// The four numeric controls, in engine argument order.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (
            self.length_scale,
            self.noise_scale,
            self.noise_w,
            self.sentence_silence,
        )
    }
}
